/*!
Artifact image uploads.

Uploads are validated by extension and declared MIME type against a
fixed raster-image set, then handed to the image host port. The one
persistence strategy is a hosted URL: the filesystem-backed host writes
bytes under the media directory, which the static file layer serves,
and the artifact record keeps the URL path.
*/
use std::fmt::Write;
use std::path::{Path, PathBuf};

use rand::Rng;

/// Raster formats accepted for artifact images, by file extension.
pub const ALLOWED_EXTENSIONS: &[&str] =
    &["jpeg", "jpg", "png", "gif", "bmp", "webp", "tiff"];

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg", "image/png", "image/gif",
    "image/bmp", "image/webp", "image/tiff",
];

pub const UPLOAD_REJECTION: &str =
    "Only JPG, PNG, GIF, BMP, WebP, and TIFF files are allowed.";

/// Validate an upload's file name and declared MIME type.
///
/// Both must agree that this is one of the allowed raster formats.
/// The declared type is taken at face value; the bytes are not
/// sniffed.
pub fn acceptable_upload(filename: &str, mime: &str) -> Result<(), String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let ext_ok = match ext {
        Some(ref e) => ALLOWED_EXTENSIONS.contains(&e.as_str()),
        None => false,
    };

    let mime_ok = ALLOWED_MIME_TYPES.contains(&mime.to_lowercase().as_str());

    if ext_ok && mime_ok {
        Ok(())
    } else {
        Err(UPLOAD_REJECTION.to_owned())
    }
}

/// The image host port: stores uploaded bytes and returns a URL
/// reference; deletes by that reference. Failures here are dependency
/// errors and never fail the catalog operation that triggered them.
pub trait ImageHost {
    fn store(&self, filename: &str, bytes: &[u8]) -> Result<String, String>;
    fn delete(&self, url: &str) -> Result<(), String>;
}

/// Hosts images in a local directory served under `url_base` by the
/// static file layer.
#[derive(Debug)]
pub struct FsImageHost {
    media_dir: PathBuf,
    url_base: String,
}

impl FsImageHost {
    pub fn new<P: AsRef<Path>>(media_dir: P, url_base: &str) -> Result<Self, String> {
        let media_dir = media_dir.as_ref().to_owned();
        std::fs::create_dir_all(&media_dir)
            .map_err(|e| format!(
                "Unable to create media directory {}: {}",
                media_dir.display(), &e
            ))?;

        Ok(Self {
            media_dir,
            url_base: url_base.trim_end_matches('/').to_owned(),
        })
    }

    /// Derive a unique, path-safe stored name from the upload's name.
    fn stored_name(&self, filename: &str) -> String {
        let path = Path::new(filename);
        let stem: String = path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_lowercase();

        let tag: u32 = rand::thread_rng().gen();
        let mut name = String::new();
        write!(&mut name, "{}-{:08x}.{}", stem, tag, ext).unwrap();
        name
    }
}

impl ImageHost for FsImageHost {
    fn store(&self, filename: &str, bytes: &[u8]) -> Result<String, String> {
        let name = self.stored_name(filename);
        let path = self.media_dir.join(&name);

        std::fs::write(&path, bytes)
            .map_err(|e| format!(
                "Error writing image {}: {}", path.display(), &e
            ))?;

        log::trace!("Stored {} byte image at {}.", bytes.len(), path.display());
        Ok(format!("{}/{}", &self.url_base, &name))
    }

    fn delete(&self, url: &str) -> Result<(), String> {
        // Only the final path segment is trusted; anything else in the
        // URL is discarded so a stored reference can't escape the
        // media directory.
        let name = match url.rsplit('/').next() {
            Some(n) if !n.is_empty() && !n.contains("..") => n,
            _ => { return Err(format!("{:?} is not a hosted image URL.", url)); },
        };

        let path = self.media_dir.join(name);
        std::fs::remove_file(&path)
            .map_err(|e| format!(
                "Error deleting image {}: {}", path.display(), &e
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_and_mime_must_agree() {
        assert!(acceptable_upload("jar.png", "image/png").is_ok());
        assert!(acceptable_upload("JAR.JPG", "image/jpeg").is_ok());
        assert!(acceptable_upload("scan.tiff", "image/tiff").is_ok());

        // bad extension, plausible type
        assert!(acceptable_upload("jar.pdf", "image/png").is_err());
        // good extension, non-image type
        assert!(acceptable_upload("jar.png", "application/octet-stream").is_err());
        // no extension at all
        assert!(acceptable_upload("jar", "image/png").is_err());
        // svg is not in the raster set
        assert!(acceptable_upload("jar.svg", "image/svg+xml").is_err());
    }

    fn scratch_host() -> (FsImageHost, PathBuf) {
        let dir = std::env::temp_dir()
            .join(format!("museo-img-test-{:08x}", rand::thread_rng().gen::<u32>()));
        let host = FsImageHost::new(&dir, "/media").unwrap();
        (host, dir)
    }

    #[test]
    fn store_then_delete() {
        let (host, dir) = scratch_host();

        let url = host.store("jar.png", b"not really a png").unwrap();
        assert!(url.starts_with("/media/"));
        assert!(url.ends_with(".png"));

        let name = url.rsplit('/').next().unwrap();
        assert_eq!(
            std::fs::read(dir.join(name)).unwrap(),
            b"not really a png"
        );

        host.delete(&url).unwrap();
        assert!(!dir.join(name).exists());

        // second delete is an error the caller logs and ignores
        assert!(host.delete(&url).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn stored_names_are_sanitized_and_unique() {
        let (host, dir) = scratch_host();

        let a = host.store("../../evil name.png", b"a").unwrap();
        let b = host.store("../../evil name.png", b"b").unwrap();
        assert_ne!(a, b);
        for url in [&a, &b] {
            let name = url.rsplit('/').next().unwrap();
            assert!(!name.contains('/'));
            assert!(!name.contains(".."));
            assert!(dir.join(name).exists());
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn delete_refuses_foreign_urls() {
        let (host, dir) = scratch_host();
        assert!(host.delete("/media/").is_err());
        assert!(host.delete("").is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
