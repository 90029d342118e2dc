//! Explicit table metadata for admin-managed entities.
//!
//! An [`EntityDefinition`] names the table, identifier column and ordering
//! column of an entity type. Admin operations build their SQL from it, so
//! every identifier is checked by [`EntityDefinition::validate`] before use.

use adminkit_core::{AdminKitError, AdminKitResult};
use serde::{Deserialize, Serialize};

/// Table metadata for one ordered entity type.
///
/// # Examples
///
/// ```
/// use adminkit_db::entity::EntityDefinition;
///
/// let def = EntityDefinition::new("HomeSlide", "homeslider_slides", "id_homeslider_slides")
///     .with_scope_column("id_shop")
///     .with_multishop();
///
/// assert_eq!(def.payload_key(), "home_slide");
/// assert_eq!(def.shop_table.as_deref(), Some("homeslider_slides_shop"));
/// assert!(def.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// PascalCase entity name.
    pub class_name: String,
    /// Table name.
    pub table: String,
    /// Identifier column.
    pub primary: String,
    /// Ordering column.
    pub position_column: String,
    /// Whether the entity has a `<table>_lang` companion table.
    pub multilang: bool,
    /// Column limiting one position sequence (parent id, shop id...).
    pub scope_column: Option<String>,
    /// Shop association table used by the multishop join.
    pub shop_table: Option<String>,
}

impl EntityDefinition {
    /// Creates a definition with the `position` ordering column and no scope.
    pub fn new(
        class_name: impl Into<String>,
        table: impl Into<String>,
        primary: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            table: table.into(),
            primary: primary.into(),
            position_column: "position".to_string(),
            multilang: false,
            scope_column: None,
            shop_table: None,
        }
    }

    /// Overrides the ordering column.
    #[must_use]
    pub fn with_position_column(mut self, column: impl Into<String>) -> Self {
        self.position_column = column.into();
        self
    }

    /// Marks the entity as multilingual.
    #[must_use]
    pub const fn with_multilang(mut self, multilang: bool) -> Self {
        self.multilang = multilang;
        self
    }

    /// Limits each position sequence to rows sharing `column`.
    #[must_use]
    pub fn with_scope_column(mut self, column: impl Into<String>) -> Self {
        self.scope_column = Some(column.into());
        self
    }

    /// Associates the entity with shops through `<table>_shop`.
    #[must_use]
    pub fn with_multishop(mut self) -> Self {
        self.shop_table = Some(format!("{}_shop", self.table));
        self
    }

    /// Returns a copy whose table names carry `prefix`.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        let mut def = self.clone();
        def.table = format!("{prefix}{}", self.table);
        def.shop_table = self.shop_table.as_ref().map(|t| format!("{prefix}{t}"));
        def
    }

    /// The request key carrying the position payload: the class name in
    /// snake_case.
    pub fn payload_key(&self) -> String {
        to_snake_case(&self.class_name)
    }

    /// The `<table>_lang` table name.
    pub fn lang_table(&self) -> String {
        format!("{}_lang", self.table)
    }

    /// Checks that every identifier is a plain SQL name.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` naming the first bad identifier.
    pub fn validate(&self) -> AdminKitResult<()> {
        let mut names = vec![
            ("table", self.table.as_str()),
            ("primary", self.primary.as_str()),
            ("position_column", self.position_column.as_str()),
        ];
        if let Some(scope) = &self.scope_column {
            names.push(("scope_column", scope));
        }
        if let Some(shop) = &self.shop_table {
            names.push(("shop_table", shop));
        }
        for (what, name) in names {
            if !is_identifier(name) {
                return Err(AdminKitError::ImproperlyConfigured(format!(
                    "Invalid {what} identifier '{name}' for entity {}",
                    self.class_name
                )));
            }
        }
        Ok(())
    }
}

/// Returns `true` for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Converts `PascalCase` to `snake_case`: every uppercase letter after the
/// first character starts a new word (`HomeSlide` -> `home_slide`,
/// `HTMLBlock` -> `h_t_m_l_block`).
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}
