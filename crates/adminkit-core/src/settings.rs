//! Toolkit settings.
//!
//! [`Settings`] holds the configuration shared by adminkit components: the
//! database location, where module images are stored and served from, the
//! table prefix of the host schema, and logging. Every field has a default so
//! partial configuration files merge cleanly (see
//! [`settings_loader`](crate::settings_loader)).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The database engine (currently only `sqlite`).
    pub engine: String,
    /// The database file path, or `:memory:`.
    pub name: String,
    /// Prefix prepended to every table name (e.g. `ps_`).
    pub table_prefix: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "sqlite".to_string(),
            name: "adminkit.sqlite3".to_string(),
            table_prefix: String::new(),
        }
    }
}

/// Where module images live on disk and how they are addressed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSettings {
    /// Root image directory; module images go to `<img_dir>/modules/<module>/`.
    pub img_dir: PathBuf,
    /// Root image URI; module images are served from `<img_uri>modules/<module>/`.
    pub img_uri: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            img_dir: PathBuf::from("img"),
            img_uri: "/img/".to_string(),
        }
    }
}

/// The complete set of toolkit settings.
///
/// # Examples
///
/// ```
/// use adminkit_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.log_level, "info");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log level filter (e.g. "info", "adminkit_admin=debug").
    pub log_level: String,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Image storage configuration.
    pub images: ImageSettings,
    /// Language used by forms when the request does not carry one.
    pub default_language_id: i64,
    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
            images: ImageSettings::default(),
            default_language_id: 1,
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns `name` with the configured table prefix applied.
    pub fn table(&self, name: &str) -> String {
        format!("{}{name}", self.database.table_prefix)
    }
}
