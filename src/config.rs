/*!
Structs to hold configuration data and global variables.
*/
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::{
    auth,
    img::{FsImageHost, ImageHost},
    mail::{Mailer, RelaySpec},
    session::{Sessions, IDLE_WINDOW},
    store::{users::UserInsert, Store},
    user::Role,
};

#[derive(Deserialize)]
struct ConfigFile {
    db_connect_string: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    public_url: Option<String>,
    from_email: Option<String>,
    operator_email: Option<String>,
    media_dir: Option<String>,
    admin_name: Option<String>,
    admin_email: Option<String>,
    admin_password: Option<String>,
    one_reservation_per_account: Option<bool>,
    relays: Option<Vec<RelaySpec>>,
}

#[derive(Debug)]
pub struct Cfg {
    pub db_connect_string: String,
    pub addr: SocketAddr,
    pub public_url: String,
    pub from_email: String,
    pub operator_email: String,
    pub media_dir: String,
    pub default_admin_name: String,
    pub default_admin_email: String,
    pub default_admin_password: String,
    pub one_reservation_per_account: bool,
    pub relays: Vec<RelaySpec>,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            db_connect_string: "host=localhost user=museo_test password='museo_test' dbname=museo_store_test".to_owned(),
            addr: SocketAddr::new(
                "0.0.0.0".parse().unwrap(),
                8001
            ),
            public_url: "http://localhost:8001".to_owned(),
            from_email: "museo <noreply@museo.example>".to_owned(),
            operator_email: "operator@museo.example".to_owned(),
            media_dir: "media".to_owned(),
            default_admin_name: "Administrator".to_owned(),
            default_admin_email: "admin@museo.example".to_owned(),
            default_admin_password: "toot".to_owned(),
            one_reservation_per_account: false,
            relays: Vec::new(),
        }
    }
}

impl Cfg {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        let cf: ConfigFile = toml::from_str(&file_contents)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.db_connect_string {
            c.db_connect_string = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.public_url {
            c.public_url = s;
        }
        if let Some(s) = cf.from_email {
            c.from_email = s;
        }
        if let Some(s) = cf.operator_email {
            c.operator_email = s;
        }
        if let Some(s) = cf.media_dir {
            c.media_dir = s;
        }
        if let Some(s) = cf.admin_name {
            c.default_admin_name = s;
        }
        if let Some(s) = cf.admin_email {
            c.default_admin_email = s;
        }
        if let Some(s) = cf.admin_password {
            c.default_admin_password = s;
        }
        if let Some(b) = cf.one_reservation_per_account {
            c.one_reservation_per_account = b;
        }
        if let Some(v) = cf.relays {
            c.relays = v;
        }

        Ok(c)
    }
}

/**
This guy hauls around the global state and gets passed in an
`axum::Extension` to the handlers who need him.
*/
pub struct Glob {
    pub store: Store,
    pub sessions: Arc<Sessions>,
    pub mailer: Arc<Mailer>,
    pub image_host: Box<dyn ImageHost + Send + Sync>,
    pub addr: SocketAddr,
    /// Where the image host keeps its files; served under `/media`.
    pub media_dir: String,
    /// Policy toggle: at most one active reservation per account.
    pub one_reservation_per_account: bool,
}

/// Loads system configuration, ensures all appropriate database tables
/// exist, and assures the existence of a verified default admin.
pub async fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Glob, String> {
    let cfg = Cfg::from_file(path.as_ref())?;
    log::info!("Configuration file read:\n{:#?}", &cfg);

    log::trace!("Checking state of store DB...");
    let store = Store::new(cfg.db_connect_string.clone());
    if let Err(e) = store.ensure_db_schema().await {
        let estr = format!("Unable to ensure state of store DB: {}", e.display());
        return Err(estr);
    }
    log::trace!("...store DB okay.");

    log::trace!("Checking existence of default Admin...");
    match store.get_user_by_email(&cfg.default_admin_email).await {
        Err(e) => {
            let estr = format!(
                "Error attempting to check existence of default Admin ({}): {}",
                &cfg.default_admin_email, e.display()
            );
            return Err(estr);
        },
        Ok(Some(_)) => {
            log::trace!("Default Admin OK.");
        },
        Ok(None) => {
            log::info!(
                "Default Admin ({}) doesn't exist; inserting.",
                &cfg.default_admin_email
            );
            let hash = auth::hash_password(cfg.default_admin_password.clone())
                .await
                .map_err(|e| format!("Error hashing default Admin password: {}", &e))?;
            let code = auth::generate_verification_code();
            match store.insert_user(
                &cfg.default_admin_name,
                &cfg.default_admin_email,
                &hash,
                Role::Admin,
                &code,
            ).await {
                Err(e) => {
                    let estr = format!(
                        "Error inserting default Admin: {}", e.display()
                    );
                    return Err(estr);
                },
                Ok(UserInsert::DuplicateEmail) => {
                    let estr = "Default Admin appeared mid-insert, which just doesn't make sense.".to_owned();
                    return Err(estr);
                },
                Ok(UserInsert::Created(_)) => { },
            }
            // the seeded admin never clicks a verification link
            store.redeem_verification_code(&code).await
                .map_err(|e| format!(
                    "Error verifying default Admin: {}", e.display()
                ))?;
            log::trace!("Default Admin inserted and verified.");
        },
    }

    let mailer = Mailer::new(
        &cfg.from_email,
        &cfg.operator_email,
        &cfg.public_url,
        &cfg.relays,
    )?;

    let image_host = FsImageHost::new(&cfg.media_dir, "/media")?;

    let glob = Glob {
        store,
        sessions: Arc::new(Sessions::new(IDLE_WINDOW)),
        mailer: Arc::new(mailer),
        image_host: Box::new(image_host),
        addr: cfg.addr,
        media_dir: cfg.media_dir,
        one_reservation_per_account: cfg.one_reservation_per_account,
    };

    Ok(glob)
}
