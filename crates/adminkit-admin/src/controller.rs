//! Object-model admin controllers.
//!
//! An admin page for one entity type is an [`ObjectModelController`] built
//! from an [`EntityAdmin`]: the entity's table metadata plus its list and
//! form capabilities. The controller wires in shop-context handling and the
//! [`PositionManager`] that serves drag-and-drop reordering.
//!
//! ```ignore
//! struct Slides;
//!
//! impl Listable for Slides {
//!     fn list_columns(&self) -> Vec<ListColumn> {
//!         vec![ListColumn::new("title", "Title"), ListColumn::new("position", "Position").position()]
//!     }
//! }
//! impl Formable for Slides {
//!     fn form_fields(&self) -> FormSchema { FormSchema::new() }
//! }
//! impl ShopScoped for Slides {}
//! impl EntityAdmin for Slides {
//!     fn definition(&self) -> EntityDefinition {
//!         EntityDefinition::new("Slide", "slide", "id_slide")
//!     }
//! }
//!
//! let controller = ObjectModelController::new("AdminSlides", Arc::new(Slides), db)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use adminkit_core::{AdminKitError, AdminKitResult, RequestContext, RequestValue, Settings};
use adminkit_db::entity::is_identifier;
use adminkit_db::{atomic, DbExecutor, EntityDefinition, Row, Value};
use serde::{Deserialize, Serialize};

use crate::form::FormSchema;
use crate::positions::{Direction, PositionManager};
use crate::shop::{shop_context_notice, shop_join, ShopLink, ShopNotice};

/// One column of an admin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListColumn {
    /// Column key in the row.
    pub key: String,
    /// Header title.
    pub title: String,
    /// Text alignment (`left`, `center`...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    /// Whether the list can be filtered on this column.
    #[serde(default = "default_true")]
    pub search: bool,
    /// Whether this column carries the drag-and-drop handle.
    #[serde(default)]
    pub position: bool,
}

const fn default_true() -> bool {
    true
}

impl ListColumn {
    /// Creates a searchable column.
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            align: None,
            search: true,
            position: false,
        }
    }

    /// Sets the alignment.
    #[must_use]
    pub fn align(mut self, align: impl Into<String>) -> Self {
        self.align = Some(align.into());
        self
    }

    /// Disables filtering on the column.
    #[must_use]
    pub const fn no_search(mut self) -> Self {
        self.search = false;
        self
    }

    /// Marks the column as the position handle.
    #[must_use]
    pub const fn position(mut self) -> Self {
        self.position = true;
        self
    }
}

/// Everything the admin UI needs to render an entity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    /// List identifier; `position` enables drag-and-drop.
    pub list_id: String,
    /// Column used as the drag-and-drop identifier.
    pub position_identifier: String,
    /// Default sort column.
    pub default_order_by: String,
    /// Default sort direction.
    pub default_order_way: String,
    /// Columns in display order.
    pub columns: Vec<ListColumn>,
    /// Per-row actions.
    pub row_actions: Vec<String>,
    /// Shop association join, when multishop applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
}

/// Entities that have an admin list.
pub trait Listable {
    /// Columns shown in the list.
    fn list_columns(&self) -> Vec<ListColumn>;

    /// Per-row actions.
    fn row_actions(&self) -> Vec<String> {
        vec!["edit".to_string(), "delete".to_string()]
    }
}

/// Entities that have an edit form.
pub trait Formable {
    /// The edit form.
    fn form_fields(&self) -> FormSchema;
}

/// Entities whose admin page may require a single selected shop.
pub trait ShopScoped {
    /// Whether the page only works with exactly one shop selected.
    fn is_shop_context_required(&self) -> bool {
        false
    }
}

/// Components exposing a position manager.
pub trait Positionable {
    /// The position manager.
    fn positions(&self) -> &PositionManager;
}

/// An entity type with an admin page.
pub trait EntityAdmin: Listable + Formable + ShopScoped + Send + Sync {
    /// Table metadata, without the installation's table prefix.
    fn definition(&self) -> EntityDefinition;
}

/// What the controller shows for a page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentOutcome {
    /// A single shop must be selected first; nothing else is rendered.
    ShopContextWarning {
        /// Warning text with shop links as HTML.
        message: String,
        /// One link per active shop.
        links: Vec<ShopLink>,
    },
    /// The list and the form are rendered.
    Rendered {
        /// Informational message naming the current shop.
        info: Option<String>,
        /// List description.
        list: ListConfig,
        /// Form description.
        form: FormSchema,
    },
}

/// Result of the drag-and-drop reorder endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePositionsResponse {
    /// The row moved.
    Moved {
        /// New position.
        position: i64,
        /// Row id embedded in the payload token.
        row_id: i64,
    },
    /// The row could not be loaded or moved.
    Failed {
        /// Error message.
        message: String,
    },
    /// No payload entry named the requested id.
    NoMatch,
}

impl UpdatePositionsResponse {
    /// The response body: plain text on success, a JSON error object on
    /// failure, empty when nothing matched.
    pub fn body(&self) -> String {
        match self {
            Self::Moved { position, row_id } => {
                format!("ok position {position} for item {row_id}\r\n")
            }
            Self::Failed { message } => serde_json::json!({
                "hasError": true,
                "errors": message,
            })
            .to_string(),
            Self::NoMatch => String::new(),
        }
    }

    /// The response content type.
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "application/json",
            Self::Moved { .. } | Self::NoMatch => "text/plain; charset=utf-8",
        }
    }

    /// Returns `true` for [`Failed`](Self::Failed).
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Splits a `prefix_rowId_objectId` payload token into `(row_id, object_id)`.
pub fn parse_position_token(token: &str) -> Option<(i64, i64)> {
    let mut parts = token.split('_').skip(1);
    let row_id = parts.next()?.trim().parse().ok()?;
    let object_id = parts.next()?.trim().parse().ok()?;
    Some((row_id, object_id))
}

/// Admin controller for one entity type.
pub struct ObjectModelController {
    name: String,
    admin: Arc<dyn EntityAdmin>,
    definition: EntityDefinition,
    positions: PositionManager,
}

impl std::fmt::Debug for ObjectModelController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectModelController")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

impl ObjectModelController {
    /// Creates a controller on unprefixed tables.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` for an invalid entity definition.
    pub fn new(
        name: impl Into<String>,
        admin: Arc<dyn EntityAdmin>,
        db: Arc<dyn DbExecutor>,
    ) -> AdminKitResult<Self> {
        Self::with_table_prefix(name, admin, db, "")
    }

    /// Creates a controller using the table prefix of the settings.
    pub fn from_settings(
        name: impl Into<String>,
        admin: Arc<dyn EntityAdmin>,
        db: Arc<dyn DbExecutor>,
        settings: &Settings,
    ) -> AdminKitResult<Self> {
        Self::with_table_prefix(name, admin, db, &settings.database.table_prefix)
    }

    fn with_table_prefix(
        name: impl Into<String>,
        admin: Arc<dyn EntityAdmin>,
        db: Arc<dyn DbExecutor>,
        prefix: &str,
    ) -> AdminKitResult<Self> {
        let definition = admin.definition();
        let positions = PositionManager::new(definition.prefixed(prefix), db)?;
        Ok(Self {
            name: name.into(),
            admin,
            definition,
            positions,
        })
    }

    /// The controller name used in admin links (e.g. `AdminSlides`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entity definition, without table prefix.
    pub const fn definition(&self) -> &EntityDefinition {
        &self.definition
    }

    /// The entity definition as stored (with table prefix).
    pub const fn storage(&self) -> &EntityDefinition {
        self.positions.definition()
    }

    /// List description, ordered by position.
    pub fn prepare_list(&self, ctx: &RequestContext) -> ListConfig {
        let position = self.definition.position_column.clone();
        ListConfig {
            list_id: "position".to_string(),
            position_identifier: position.clone(),
            default_order_by: position,
            default_order_way: "ASC".to_string(),
            columns: self.admin.list_columns(),
            row_actions: self.admin.row_actions(),
            join: self.shop_join(ctx),
        }
    }

    /// Form description.
    pub fn prepare_form(&self) -> FormSchema {
        self.admin.form_fields()
    }

    /// The shop association join for the list query.
    pub fn shop_join(&self, ctx: &RequestContext) -> Option<String> {
        shop_join(self.storage(), ctx)
    }

    /// Decides what a page load shows.
    pub fn init_content(&self, ctx: &RequestContext) -> ContentOutcome {
        let notice = if self.admin.is_shop_context_required() {
            shop_context_notice(ctx, &self.name, &self.action_name(ctx))
        } else {
            None
        };

        match notice {
            Some(ShopNotice::Warning { message, links }) => {
                tracing::debug!(controller = %self.name, "shop context required");
                ContentOutcome::ShopContextWarning { message, links }
            }
            Some(ShopNotice::Info { message }) => ContentOutcome::Rendered {
                info: Some(message),
                list: self.prepare_list(ctx),
                form: self.prepare_form(),
            },
            None => ContentOutcome::Rendered {
                info: None,
                list: self.prepare_list(ctx),
                form: self.prepare_form(),
            },
        }
    }

    /// The pending action: the first request key (in sorted order) that
    /// contains the table name, with the table name removed
    /// (`submitAddslide` -> `submitAdd`). Empty when there is none.
    pub fn action_name(&self, ctx: &RequestContext) -> String {
        let table = &self.definition.table;
        let mut keys: Vec<&String> = ctx.values.keys().collect();
        keys.sort();
        keys.into_iter()
            .find(|key| key.contains(table.as_str()))
            .map(|key| key.replace(table.as_str(), ""))
            .unwrap_or_default()
    }

    /// The identifier submitted under the primary column name, `0` when
    /// absent.
    pub fn current_identifier(&self, ctx: &RequestContext) -> i64 {
        ctx.int_value(&self.definition.primary).unwrap_or(0)
    }

    /// Handles the drag-and-drop reorder request.
    ///
    /// Reads `way`, `id` and the position payload under the entity's
    /// snake_case key: a list whose indexes are the new positions, or a map
    /// keyed by position. Each entry is a `prefix_rowId_objectId` token; only
    /// the entry for `id` is applied, and the response carries the position
    /// the row actually got.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when `way` is missing or not `0`/`1`. Row and
    /// update failures are reported in the response instead.
    pub async fn update_positions(
        &self,
        ctx: &RequestContext,
    ) -> AdminKitResult<UpdatePositionsResponse> {
        let way = ctx
            .int_value("way")
            .ok_or_else(|| AdminKitError::BadRequest("Missing or invalid 'way'".to_string()))?;
        let direction = Direction::try_from(way)?;
        let item_id = ctx.int_value("id").unwrap_or(0);

        let Some(entries) = ctx
            .value(&self.definition.payload_key())
            .and_then(RequestValue::indexed)
        else {
            return Ok(UpdatePositionsResponse::NoMatch);
        };

        for (position, entry) in entries {
            let Some((row_id, object_id)) = entry.as_str().and_then(parse_position_token) else {
                continue;
            };
            if object_id != item_id {
                continue;
            }

            return Ok(
                match self.positions.reorder(direction, position, object_id).await {
                    Ok(applied) => UpdatePositionsResponse::Moved {
                        position: applied,
                        row_id,
                    },
                    Err(AdminKitError::NotFound(_)) => UpdatePositionsResponse::Failed {
                        message: format!("This item ({object_id}) can t be loaded"),
                    },
                    Err(e) => {
                        tracing::warn!(controller = %self.name, object_id, position, error = %e, "reorder failed");
                        UpdatePositionsResponse::Failed {
                            message: format!(
                                "Can not update item {object_id} to position {position} "
                            ),
                        }
                    }
                },
            );
        }

        Ok(UpdatePositionsResponse::NoMatch)
    }

    /// Inserts a record and returns its identifier.
    ///
    /// Without a position value the row is appended at the end of its
    /// scope, the position being computed inside the `INSERT`. An explicit
    /// position is clamped to the scope's `0..=N` and the rows from it on
    /// move down by one, in the same transaction as the insert. Entities with
    /// a shop association table are linked to the selected shop, or to every
    /// active shop when none is selected.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a field name that is not a plain column name.
    pub async fn add_record(
        &self,
        data: &BTreeMap<String, serde_json::Value>,
        ctx: &RequestContext,
    ) -> AdminKitResult<i64> {
        let def = self.storage();
        let mut columns = Vec::with_capacity(data.len());
        for (key, value) in data {
            if *key == def.primary {
                continue;
            }
            if !is_identifier(key) {
                return Err(AdminKitError::BadRequest(format!(
                    "Invalid field name '{key}'"
                )));
            }
            columns.push((key.clone(), Value::from_json(value)));
        }

        let explicit_position = columns
            .iter()
            .position(|(c, v)| *c == def.position_column && !v.is_null());
        if explicit_position.is_none() {
            columns.retain(|(c, _)| *c != def.position_column);
        }

        let scope = def.scope_column.as_ref().map(|col| {
            columns
                .iter()
                .find(|(c, _)| c == col)
                .map_or(Value::Null, |(_, v)| v.clone())
        });
        let shops = target_shops(def, ctx);

        let _guard = self.positions.guard().await;
        let id = atomic(self.positions.executor(), |txn| async move {
            let conn: &dyn DbExecutor = &*txn;
            let (sql, params) = match explicit_position {
                Some(index) => {
                    let requested = match &columns[index].1 {
                        Value::Int(n) => *n,
                        other => other.to_string().trim().parse::<i64>().map_err(|_| {
                            AdminKitError::BadRequest(format!("Invalid position '{other}'"))
                        })?,
                    };
                    let slot = self
                        .positions
                        .open_slot(conn, requested, scope.as_ref())
                        .await?;
                    columns[index].1 = Value::Int(slot);
                    let names: Vec<&str> = columns.iter().map(|(c, _)| c.as_str()).collect();
                    (
                        format!(
                            "INSERT INTO {} ({}) VALUES ({})",
                            def.table,
                            names.join(", "),
                            vec!["?"; names.len()].join(", ")
                        ),
                        columns.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>(),
                    )
                }
                None => self.positions.append_insert_sql(&columns, scope.as_ref()),
            };

            let id = conn.insert_returning_id(&sql, &params).await?;
            if let Some(shop_table) = &def.shop_table {
                let link = format!(
                    "INSERT INTO {shop_table} ({}, id_shop) VALUES (?, ?)",
                    def.primary
                );
                for shop in shops {
                    conn.execute_sql(&link, &[Value::Int(id), Value::Int(shop)])
                        .await?;
                }
            }
            Ok(id)
        })
        .await?;

        tracing::info!(controller = %self.name, id, "record added");
        Ok(id)
    }

    /// Deletes a record, then renormalizes the positions of its scope.
    ///
    /// Returns `false` when the record does not exist.
    pub async fn delete_record(&self, id: i64) -> AdminKitResult<bool> {
        let def = self.storage();
        let _guard = self.positions.guard().await;

        let deleted_scope = atomic(self.positions.executor(), |txn| async move {
            let select = def.scope_column.as_ref().map_or_else(
                || format!("SELECT {pk} AS id FROM {t} WHERE {pk} = ?", pk = def.primary, t = def.table),
                |col| format!("SELECT {col} AS scope FROM {t} WHERE {pk} = ?", pk = def.primary, t = def.table),
            );
            let Some(row) = txn.query(&select, &[Value::Int(id)]).await?.into_iter().next() else {
                return Ok(None);
            };
            let scope = match def.scope_column {
                Some(_) => Some(row.get::<Value>("scope")?),
                None => None,
            };

            txn.execute_sql(
                &format!("DELETE FROM {} WHERE {} = ?", def.table, def.primary),
                &[Value::Int(id)],
            )
            .await?;
            if let Some(shop_table) = &def.shop_table {
                txn.execute_sql(
                    &format!("DELETE FROM {shop_table} WHERE {} = ?", def.primary),
                    &[Value::Int(id)],
                )
                .await?;
            }
            if def.multilang {
                txn.execute_sql(
                    &format!("DELETE FROM {} WHERE {} = ?", def.lang_table(), def.primary),
                    &[Value::Int(id)],
                )
                .await?;
            }
            Ok(Some(scope))
        })
        .await?;

        let Some(scope) = deleted_scope else {
            tracing::warn!(controller = %self.name, id, "delete of missing record");
            return Ok(false);
        };

        tracing::info!(controller = %self.name, id, "record deleted");
        self.positions.renormalize_locked(scope.as_ref()).await?;
        Ok(true)
    }

    /// Lists the records of `scope` (every scope for `None`), ordered by
    /// position, through the shop join when it applies.
    pub async fn list_records(
        &self,
        ctx: &RequestContext,
        scope: Option<&Value>,
    ) -> AdminKitResult<Vec<Row>> {
        let def = self.storage();
        let join = self.shop_join(ctx).map_or_else(String::new, |j| format!(" {j}"));
        let (scope_sql, params) = self.positions.scope_clause(scope, "a.");
        let sql = format!(
            "SELECT a.* FROM {t} a{join} WHERE 1 = 1{scope_sql} ORDER BY a.{p} ASC, a.{pk} ASC",
            t = def.table,
            p = def.position_column,
            pk = def.primary,
        );
        self.positions.executor().query(&sql, &params).await
    }
}

impl Positionable for ObjectModelController {
    fn positions(&self) -> &PositionManager {
        &self.positions
    }
}

/// Shops a new record is linked to.
fn target_shops(def: &EntityDefinition, ctx: &RequestContext) -> Vec<i64> {
    if def.shop_table.is_none() {
        return Vec::new();
    }
    if !ctx.multishop_active {
        return vec![ctx.shop.id];
    }
    ctx.selected_shop_id()
        .map_or_else(|| ctx.active_shops().map(|s| s.id).collect(), |id| vec![id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormInput, FormSection};
    use adminkit_core::{Language, Shop, ShopContext};
    use adminkit_db::DatabaseBackendType;

    struct NullExecutor;

    #[async_trait::async_trait]
    impl DbExecutor for NullExecutor {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::SQLite
        }

        async fn execute_sql(&self, _sql: &str, _params: &[Value]) -> AdminKitResult<u64> {
            Ok(0)
        }

        async fn query(&self, _sql: &str, _params: &[Value]) -> AdminKitResult<Vec<Row>> {
            Ok(vec![])
        }
    }

    struct HomeSlides {
        shop_required: bool,
    }

    impl Listable for HomeSlides {
        fn list_columns(&self) -> Vec<ListColumn> {
            vec![
                ListColumn::new("id_slide", "ID").align("center"),
                ListColumn::new("title", "Title"),
                ListColumn::new("position", "Position").position().no_search(),
            ]
        }
    }

    impl Formable for HomeSlides {
        fn form_fields(&self) -> FormSchema {
            FormSchema::new().section(FormSection::new("Slide").input(FormInput::text("title").lang()))
        }
    }

    impl ShopScoped for HomeSlides {
        fn is_shop_context_required(&self) -> bool {
            self.shop_required
        }
    }

    impl EntityAdmin for HomeSlides {
        fn definition(&self) -> EntityDefinition {
            EntityDefinition::new("HomeSlide", "slide", "id_slide").with_multishop()
        }
    }

    fn controller(shop_required: bool) -> ObjectModelController {
        ObjectModelController::new(
            "AdminSlides",
            Arc::new(HomeSlides { shop_required }),
            Arc::new(NullExecutor),
        )
        .unwrap()
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Shop::new(1, "Main"), Language::new(1, "en"))
            .with_shops(vec![Shop::new(1, "Main"), Shop::new(2, "Outlet")])
    }

    #[test]
    fn test_prepare_list() {
        let list = controller(false).prepare_list(&ctx());
        assert_eq!(list.list_id, "position");
        assert_eq!(list.position_identifier, "position");
        assert_eq!(list.default_order_by, "position");
        assert_eq!(list.default_order_way, "ASC");
        assert_eq!(list.row_actions, vec!["edit", "delete"]);
        assert_eq!(list.columns.len(), 3);
        assert!(list.join.is_none());
    }

    #[test]
    fn test_prefixed_storage() {
        let settings = Settings {
            database: adminkit_core::settings::DatabaseSettings {
                table_prefix: "ps_".to_string(),
                ..Default::default()
            },
            ..Settings::default()
        };
        let c = ObjectModelController::from_settings(
            "AdminSlides",
            Arc::new(HomeSlides { shop_required: false }),
            Arc::new(NullExecutor),
            &settings,
        )
        .unwrap();
        assert_eq!(c.definition().table, "slide");
        assert_eq!(c.storage().table, "ps_slide");
        let join = c.shop_join(&ctx().with_multishop(true)).unwrap();
        assert!(join.contains("ps_slide_shop"));
    }

    #[test]
    fn test_action_name() {
        let c = controller(false);
        assert_eq!(c.action_name(&ctx()), "");
        assert_eq!(
            c.action_name(&ctx().with_value("submitAddslide", "1")),
            "submitAdd"
        );
        assert_eq!(
            c.action_name(&ctx().with_value("deleteslide", "").with_value("updateslide", "")),
            "delete"
        );
    }

    #[test]
    fn test_current_identifier() {
        let c = controller(false);
        assert_eq!(c.current_identifier(&ctx()), 0);
        assert_eq!(c.current_identifier(&ctx().with_value("id_slide", "7")), 7);
        assert_eq!(c.current_identifier(&ctx().with_value("id_slide", "x")), 0);
    }

    #[test]
    fn test_init_content_not_shop_scoped() {
        let outcome = controller(false).init_content(&ctx().with_multishop(true).with_shop_context(ShopContext::All));
        assert!(matches!(outcome, ContentOutcome::Rendered { info: None, .. }));
    }

    #[test]
    fn test_init_content_warns_without_single_shop() {
        let ctx = ctx().with_multishop(true).with_shop_context(ShopContext::Group(1));
        let outcome = controller(true).init_content(&ctx);
        let ContentOutcome::ShopContextWarning { links, .. } = outcome else {
            panic!("expected a warning");
        };
        assert_eq!(links.len(), 2);
        assert!(links[0].url.ends_with("setShopContext=s-1"));
    }

    #[test]
    fn test_init_content_info_for_shop() {
        let outcome = controller(true).init_content(&ctx().with_multishop(true));
        let ContentOutcome::Rendered { info, list, .. } = outcome else {
            panic!("expected rendered content");
        };
        assert_eq!(info.as_deref(), Some("You are editing shop: <b>Main</b>"));
        assert!(list.join.unwrap().starts_with("INNER JOIN slide_shop"));

        let outcome = controller(true).init_content(&ctx().with_value("submitAddslide", "1"));
        assert!(matches!(outcome, ContentOutcome::Rendered { info: None, .. }));
    }

    #[test]
    fn test_parse_position_token() {
        assert_eq!(parse_position_token("tr_3_12"), Some((3, 12)));
        assert_eq!(parse_position_token("tr_3"), None);
        assert_eq!(parse_position_token("tr_x_12"), None);
        assert_eq!(parse_position_token(""), None);
    }

    #[test]
    fn test_response_bodies() {
        let ok = UpdatePositionsResponse::Moved { position: 2, row_id: 5 };
        assert_eq!(ok.body(), "ok position 2 for item 5\r\n");
        assert!(!ok.is_error());

        let failed = UpdatePositionsResponse::Failed {
            message: "This item (5) can t be loaded".to_string(),
        };
        let json: serde_json::Value = serde_json::from_str(&failed.body()).unwrap();
        assert_eq!(json["hasError"], true);
        assert_eq!(json["errors"], "This item (5) can t be loaded");
        assert_eq!(failed.content_type(), "application/json");

        assert_eq!(UpdatePositionsResponse::NoMatch.body(), "");
    }

    #[tokio::test]
    async fn test_update_positions_requires_way() {
        let c = controller(false);
        let err = c.update_positions(&ctx()).await.unwrap_err();
        assert!(matches!(err, AdminKitError::BadRequest(_)));

        let err = c
            .update_positions(&ctx().with_value("way", "3"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminKitError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_positions_no_match() {
        let c = controller(false);
        let ctx = ctx()
            .with_value("way", "1")
            .with_value("id", "9")
            .with_value("home_slide", vec!["tr_1_1", "tr_1_2"]);
        assert_eq!(
            c.update_positions(&ctx).await.unwrap(),
            UpdatePositionsResponse::NoMatch
        );
    }

    #[tokio::test]
    async fn test_update_positions_missing_row() {
        let c = controller(false);
        let ctx = ctx()
            .with_value("way", "0")
            .with_value("id", "2")
            .with_value("home_slide", vec!["tr_1_2", "tr_1_1"]);
        assert_eq!(
            c.update_positions(&ctx).await.unwrap(),
            UpdatePositionsResponse::Failed {
                message: "This item (2) can t be loaded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_add_record_rejects_bad_field_names() {
        let c = controller(false);
        let mut data = BTreeMap::new();
        data.insert("title; --".to_string(), serde_json::json!("x"));
        let err = c.add_record(&data, &ctx()).await.unwrap_err();
        assert!(matches!(err, AdminKitError::BadRequest(_)));
    }

    #[test]
    fn test_target_shops() {
        let def = EntityDefinition::new("Slide", "slide", "id_slide").with_multishop();
        assert_eq!(target_shops(&def, &ctx()), vec![1]);
        assert_eq!(
            target_shops(&def, &ctx().with_multishop(true).with_shop_context(ShopContext::All)),
            vec![1, 2]
        );
        let plain = EntityDefinition::new("Slide", "slide", "id_slide");
        assert!(target_shops(&plain, &ctx()).is_empty());
    }
}
