//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `ADMINKIT_DEBUG` | `debug` |
//! | `ADMINKIT_LOG_LEVEL` | `log_level` |
//! | `ADMINKIT_DATABASE_NAME` | `database.name` |
//! | `ADMINKIT_TABLE_PREFIX` | `database.table_prefix` |
//! | `ADMINKIT_IMG_DIR` | `images.img_dir` |
//! | `ADMINKIT_IMG_URI` | `images.img_uri` |
//! | `ADMINKIT_DEFAULT_LANGUAGE_ID` | `default_language_id` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use adminkit_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/adminkit.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::AdminKitError;
use crate::settings::Settings;

/// Loads settings from a TOML string. Keys not present keep their defaults.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, AdminKitError> {
    // TOML -> JSON, then merge over the serialized defaults so partial files work.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| AdminKitError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_onto_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, AdminKitError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, AdminKitError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, AdminKitError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| AdminKitError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_onto_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, AdminKitError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from environment variables only (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `ADMINKIT_*` environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

/// Applies overrides from an arbitrary key lookup.
fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("ADMINKIT_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("ADMINKIT_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("ADMINKIT_DATABASE_NAME") {
        settings.database.name = val;
    }

    if let Some(val) = lookup("ADMINKIT_TABLE_PREFIX") {
        settings.database.table_prefix = val;
    }

    if let Some(val) = lookup("ADMINKIT_IMG_DIR") {
        settings.images.img_dir = PathBuf::from(val);
    }

    if let Some(val) = lookup("ADMINKIT_IMG_URI") {
        settings.images.img_uri = val;
    }

    if let Some(val) = lookup("ADMINKIT_DEFAULT_LANGUAGE_ID") {
        if let Ok(id) = val.parse::<i64>() {
            settings.default_language_id = id;
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, AdminKitError> {
    std::fs::read_to_string(path).map_err(|e| {
        AdminKitError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_onto_defaults(
    value: serde_json::Value,
    format: &str,
) -> Result<Settings, AdminKitError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        AdminKitError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    serde_json::from_value(merge_json(default_json, value)).map_err(|e| {
        AdminKitError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_v) => merge_json(base_v, override_v),
                    None => override_v,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
