/*!
Museum artifact records.
*/
use serde::Serialize;

/// A cataloged artifact. `image_url` is a hosted reference under the
/// static media tree; the image host owns the bytes.
#[derive(Clone, Debug, Serialize)]
pub struct Artifact {
    pub id: i64,
    pub title: String,
    /// Category, e.g. "pottery" or "textile". Free text.
    pub kind: String,
    /// Lifecycle status, e.g. "on display" or "in storage".
    pub status: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Optional link to an external 3D model of the piece.
    pub model_link: Option<String>,
}

impl Artifact {
    /// Case-insensitive title match, used by the catalog search box.
    pub fn title_matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(&needle.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_search_is_case_insensitive() {
        let a = Artifact {
            id: 1,
            title: "Manunggul Jar".to_owned(),
            kind: "pottery".to_owned(),
            status: "on display".to_owned(),
            description: "Burial jar.".to_owned(),
            image_url: None,
            model_link: None,
        };

        assert!(a.title_matches("manunggul"));
        assert!(a.title_matches("JAR"));
        assert!(!a.title_matches("textile"));
    }
}
