// ⚙️ Settings
// Defaults -> birth-chart.toml -> BIRTH_CHART__* environment variables

use crate::error::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "birth-chart.toml";
pub const ENV_PREFIX: &str = "BIRTH_CHART";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminSettings {
    pub username: String,
    /// `<salt>$<hex>` or bare hex SHA-256 of the admin password. Admin login is disabled while unset.
    #[serde(default)]
    pub password_sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub log_filter: String,
    /// Where the "consult" button and footer point
    pub contact_url: String,
    pub session_ttl_minutes: i64,
    pub admin: AdminSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: PathBuf::from("user_data.db"),
            bind_address: "0.0.0.0:3000".to_string(),
            log_filter: "birth_chart=info,tower_http=info".to_string(),
            contact_url: "https://wa.me/917205467646".to_string(),
            session_ttl_minutes: 30,
            admin: AdminSettings {
                username: "admin".to_string(),
                password_sha256: None,
            },
        }
    }
}

impl Settings {
    /// Load settings; `path` overrides the default config file location.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let defaults = Settings::default();
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let settings = Config::builder()
            .set_default("database_path", defaults.database_path.to_string_lossy().to_string())?
            .set_default("bind_address", defaults.bind_address)?
            .set_default("log_filter", defaults.log_filter)?
            .set_default("contact_url", defaults.contact_url)?
            .set_default("session_ttl_minutes", defaults.session_ttl_minutes)?
            .set_default("admin.username", defaults.admin.username)?
            .add_source(File::from(file).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn admin_enabled(&self) -> bool {
        self.admin
            .password_sha256
            .as_deref()
            .map(|h| !h.trim().is_empty())
            .unwrap_or(false)
    }
}
