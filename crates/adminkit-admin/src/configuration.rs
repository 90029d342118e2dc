//! Key/value configuration storage for settings pages.
//!
//! Values are addressed by key, with an optional language and an optional
//! shop. A shop lookup falls back to the installation-wide value when the
//! shop has none of its own. Unless `html` is requested on update, markup
//! is stripped from stored values.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use adminkit_core::{AdminKitError, AdminKitResult};
use adminkit_db::{atomic, DatabaseBackendType, DbExecutor, Value};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Removes HTML tags from `s`.
pub fn strip_tags(s: &str) -> String {
    TAG_RE.replace_all(s, "").into_owned()
}

/// A value to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// One value for every language.
    Single(String),
    /// One value per language id.
    PerLanguage(BTreeMap<i64, String>),
}

impl ConfigValue {
    fn sanitized(self, html: bool) -> Self {
        if html {
            return self;
        }
        match self {
            Self::Single(v) => Self::Single(strip_tags(&v)),
            Self::PerLanguage(map) => {
                Self::PerLanguage(map.into_iter().map(|(l, v)| (l, strip_tags(&v))).collect())
            }
        }
    }

    fn for_language(&self, lang: Option<i64>) -> Option<String> {
        match (self, lang) {
            (Self::Single(v), _) => Some(v.clone()),
            (Self::PerLanguage(map), Some(lang)) => map.get(&lang).cloned(),
            (Self::PerLanguage(_), None) => None,
        }
    }
}

/// Configuration storage.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Reads `key` for a language and shop.
    ///
    /// With a language, a per-language value is returned for that language;
    /// a single value is returned whatever the language. A shop without its
    /// own value falls back to the installation-wide one.
    async fn get(&self, key: &str, lang: Option<i64>, shop: Option<i64>)
        -> AdminKitResult<Option<String>>;

    /// Stores `key` for a shop (`None`: installation-wide).
    async fn update(
        &self,
        key: &str,
        value: ConfigValue,
        html: bool,
        shop: Option<i64>,
    ) -> AdminKitResult<()>;
}

/// An in-memory configuration store, suitable for testing.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigurationStore {
    values: Arc<RwLock<HashMap<(String, Option<i64>), ConfigValue>>>,
}

impl InMemoryConfigurationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    /// Returns `true` when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl ConfigurationStore for InMemoryConfigurationStore {
    async fn get(
        &self,
        key: &str,
        lang: Option<i64>,
        shop: Option<i64>,
    ) -> AdminKitResult<Option<String>> {
        let values = self.values.read().await;
        let entry = shop
            .and_then(|s| values.get(&(key.to_string(), Some(s))))
            .or_else(|| values.get(&(key.to_string(), None)));
        Ok(entry.and_then(|v| v.for_language(lang)))
    }

    async fn update(
        &self,
        key: &str,
        value: ConfigValue,
        html: bool,
        shop: Option<i64>,
    ) -> AdminKitResult<()> {
        self.values
            .write()
            .await
            .insert((key.to_string(), shop), value.sanitized(html));
        Ok(())
    }
}

/// A configuration store on the `configuration` and `configuration_lang`
/// tables.
pub struct SqlConfigurationStore {
    db: Arc<dyn DbExecutor>,
    table: String,
    lang_table: String,
}

impl std::fmt::Debug for SqlConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlConfigurationStore")
            .field("table", &self.table)
            .field("lang_table", &self.lang_table)
            .finish_non_exhaustive()
    }
}

impl SqlConfigurationStore {
    /// Creates a store on `<prefix>configuration`.
    pub fn new(db: Arc<dyn DbExecutor>, table_prefix: &str) -> Self {
        Self {
            db,
            table: format!("{table_prefix}configuration"),
            lang_table: format!("{table_prefix}configuration_lang"),
        }
    }

    /// Creates both tables if they do not exist.
    pub async fn install(&self) -> AdminKitResult<()> {
        let id_column = match self.db.backend_type() {
            DatabaseBackendType::SQLite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            DatabaseBackendType::MySQL => "INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY",
        };
        self.db
            .execute_sql(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (\
                     id_configuration {id_column}, \
                     id_shop INTEGER NULL, \
                     name VARCHAR(254) NOT NULL, \
                     value TEXT NULL, \
                     date_add DATETIME NOT NULL, \
                     date_upd DATETIME NOT NULL)",
                    self.table
                ),
                &[],
            )
            .await?;
        self.db
            .execute_sql(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (\
                     id_configuration INTEGER NOT NULL, \
                     id_lang INTEGER NOT NULL, \
                     value TEXT NULL, \
                     date_upd DATETIME NULL, \
                     PRIMARY KEY (id_configuration, id_lang))",
                    self.lang_table
                ),
                &[],
            )
            .await?;
        tracing::debug!(table = %self.table, "configuration tables installed");
        Ok(())
    }

    /// Finds the row of `key` for exactly `shop`.
    async fn find(
        &self,
        conn: &dyn DbExecutor,
        key: &str,
        shop: Option<i64>,
    ) -> AdminKitResult<Option<(i64, Option<String>)>> {
        let (shop_sql, mut params) = match shop {
            Some(id) => (" AND id_shop = ?", vec![Value::Int(id)]),
            None => (" AND id_shop IS NULL", vec![]),
        };
        params.insert(0, Value::from(key));
        let rows = conn
            .query(
                &format!(
                    "SELECT id_configuration, value FROM {} WHERE name = ?{shop_sql} \
                     ORDER BY id_configuration DESC",
                    self.table
                ),
                &params,
            )
            .await?;
        rows.first()
            .map(|row| {
                Ok((
                    row.get::<i64>("id_configuration")?,
                    row.get::<Option<String>>("value")?,
                ))
            })
            .transpose()
    }
}

#[async_trait]
impl ConfigurationStore for SqlConfigurationStore {
    async fn get(
        &self,
        key: &str,
        lang: Option<i64>,
        shop: Option<i64>,
    ) -> AdminKitResult<Option<String>> {
        let conn = self.db.as_ref();
        let mut found = match shop {
            Some(_) => self.find(conn, key, shop).await?,
            None => None,
        };
        if found.is_none() {
            found = self.find(conn, key, None).await?;
        }
        let Some((id, value)) = found else {
            return Ok(None);
        };

        if let Some(lang) = lang {
            let rows = conn
                .query(
                    &format!(
                        "SELECT value FROM {} WHERE id_configuration = ? AND id_lang = ?",
                        self.lang_table
                    ),
                    &[Value::Int(id), Value::Int(lang)],
                )
                .await?;
            if let Some(row) = rows.first() {
                return row.get::<Option<String>>("value");
            }
        }
        Ok(value)
    }

    async fn update(
        &self,
        key: &str,
        value: ConfigValue,
        html: bool,
        shop: Option<i64>,
    ) -> AdminKitResult<()> {
        if key.is_empty() {
            return Err(AdminKitError::ConfigurationError(
                "Configuration key must not be empty".to_string(),
            ));
        }
        let value = value.sanitized(html);
        let now = Value::DateTime(chrono::Utc::now().naive_utc());

        atomic(self.db.as_ref(), |txn| async move {
            let conn: &dyn DbExecutor = &*txn;
            let single = match &value {
                ConfigValue::Single(v) => Value::from(v.as_str()),
                ConfigValue::PerLanguage(_) => Value::Null,
            };

            let id = if let Some((id, _)) = self.find(conn, key, shop).await? {
                conn.execute_sql(
                    &format!(
                        "UPDATE {} SET value = ?, date_upd = ? WHERE id_configuration = ?",
                        self.table
                    ),
                    &[single, now.clone(), Value::Int(id)],
                )
                .await?;
                id
            } else {
                conn.insert_returning_id(
                    &format!(
                        "INSERT INTO {} (id_shop, name, value, date_add, date_upd) \
                         VALUES (?, ?, ?, ?, ?)",
                        self.table
                    ),
                    &[
                        shop.map_or(Value::Null, Value::Int),
                        Value::from(key),
                        single,
                        now.clone(),
                        now.clone(),
                    ],
                )
                .await?
            };

            if let ConfigValue::PerLanguage(map) = &value {
                for (lang, v) in map {
                    conn.execute_sql(
                        &format!(
                            "DELETE FROM {} WHERE id_configuration = ? AND id_lang = ?",
                            self.lang_table
                        ),
                        &[Value::Int(id), Value::Int(*lang)],
                    )
                    .await?;
                    conn.execute_sql(
                        &format!(
                            "INSERT INTO {} (id_configuration, id_lang, value, date_upd) \
                             VALUES (?, ?, ?, ?)",
                            self.lang_table
                        ),
                        &[Value::Int(id), Value::Int(*lang), Value::from(v.as_str()), now.clone()],
                    )
                    .await?;
                }
            }
            Ok(())
        })
        .await?;

        tracing::debug!(key, ?shop, "configuration updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_tags("1 < 2"), "1 < 2");
    }

    #[tokio::test]
    async fn test_in_memory_single_value() {
        let store = InMemoryConfigurationStore::new();
        assert_eq!(store.get("TITLE", None, None).await.unwrap(), None);

        store
            .update("TITLE", ConfigValue::Single("<i>Hi</i>".into()), false, None)
            .await
            .unwrap();
        assert_eq!(store.get("TITLE", None, None).await.unwrap().as_deref(), Some("Hi"));
        assert_eq!(store.get("TITLE", Some(2), None).await.unwrap().as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_in_memory_keeps_html_when_allowed() {
        let store = InMemoryConfigurationStore::new();
        store
            .update("BODY", ConfigValue::Single("<p>x</p>".into()), true, None)
            .await
            .unwrap();
        assert_eq!(store.get("BODY", None, None).await.unwrap().as_deref(), Some("<p>x</p>"));
    }

    #[tokio::test]
    async fn test_in_memory_per_language() {
        let store = InMemoryConfigurationStore::new();
        let map = BTreeMap::from([(1, "Hello".to_string()), (2, "Bonjour".to_string())]);
        store
            .update("GREETING", ConfigValue::PerLanguage(map), false, None)
            .await
            .unwrap();
        assert_eq!(store.get("GREETING", Some(2), None).await.unwrap().as_deref(), Some("Bonjour"));
        assert_eq!(store.get("GREETING", Some(3), None).await.unwrap(), None);
        assert_eq!(store.get("GREETING", None, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_memory_shop_fallback() {
        let store = InMemoryConfigurationStore::new();
        store
            .update("COLOR", ConfigValue::Single("red".into()), false, None)
            .await
            .unwrap();
        store
            .update("COLOR", ConfigValue::Single("blue".into()), false, Some(2))
            .await
            .unwrap();
        assert_eq!(store.get("COLOR", None, Some(1)).await.unwrap().as_deref(), Some("red"));
        assert_eq!(store.get("COLOR", None, Some(2)).await.unwrap().as_deref(), Some("blue"));
        assert_eq!(store.len().await, 2);
    }
}
