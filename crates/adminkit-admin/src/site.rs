//! Admin endpoint registry and router generation.
//!
//! The [`AdminSite`] holds the registered object-model controllers and
//! settings pages and produces an axum router serving them as JSON
//! endpoints, including the drag-and-drop reorder endpoint.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use adminkit_core::logging::request_span;
use adminkit_core::{AdminKitError, RequestContext, RequestValue};
use adminkit_db::Value;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use tracing::Instrument;

use crate::controller::ObjectModelController;
use crate::settings_form::{SettingsController, SUBMIT_ACTION};

/// The admin site: controllers by name and the request context template
/// every request starts from.
///
/// # Examples
///
/// ```ignore
/// let mut site = AdminSite::new(base_context);
/// site.register(controller);
/// let router = site.into_axum_router();
/// ```
pub struct AdminSite {
    controllers: HashMap<String, Arc<ObjectModelController>>,
    settings_pages: HashMap<String, Arc<SettingsController>>,
    context: RequestContext,
}

impl AdminSite {
    /// Creates an empty site.
    pub fn new(context: RequestContext) -> Self {
        Self {
            controllers: HashMap::new(),
            settings_pages: HashMap::new(),
            context,
        }
    }

    /// Registers a controller under its name, replacing any previous one.
    pub fn register(&mut self, controller: ObjectModelController) {
        self.controllers
            .insert(controller.name().to_string(), Arc::new(controller));
    }

    /// Registers a settings page under its name.
    pub fn register_settings(&mut self, page: SettingsController) {
        self.settings_pages
            .insert(page.name().to_string(), Arc::new(page));
    }

    /// Looks up a controller.
    pub fn controller(&self, name: &str) -> Option<&ObjectModelController> {
        self.controllers.get(name).map(AsRef::as_ref)
    }

    /// Names of the registered controllers, sorted.
    pub fn controller_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Generates the router.
    ///
    /// - `GET /` - registered controllers and settings pages
    /// - `GET /settings/{page}/` - settings form with current values
    /// - `POST /settings/{page}/` - save a settings form
    /// - `GET /{controller}/content` - page outcome (list + form, or shop warning)
    /// - `GET /{controller}/` - records ordered by position
    /// - `POST /{controller}/` - add a record
    /// - `POST /{controller}/positions` - drag-and-drop reorder
    /// - `DELETE /{controller}/{id}/` - delete a record
    pub fn into_axum_router(self) -> Router {
        let shared = Arc::new(AdminSiteState {
            controllers: self.controllers,
            settings_pages: self.settings_pages,
            context: self.context,
        });

        Router::new()
            .route("/", get(handle_index))
            .route(
                "/settings/{page}/",
                get(handle_settings_form).post(handle_settings_save),
            )
            .route("/{controller}/content", get(handle_content))
            .route("/{controller}/positions", post(handle_positions))
            .route("/{controller}/", get(handle_list).post(handle_create))
            .route("/{controller}/{id}/", delete(handle_delete))
            .with_state(shared)
    }
}

impl std::fmt::Debug for AdminSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSite")
            .field("controllers", &self.controller_names().join(", "))
            .field("settings_pages", &self.settings_pages.len())
            .finish_non_exhaustive()
    }
}

struct AdminSiteState {
    controllers: HashMap<String, Arc<ObjectModelController>>,
    settings_pages: HashMap<String, Arc<SettingsController>>,
    context: RequestContext,
}

impl AdminSiteState {
    /// A fresh request context carrying `values`.
    fn context_with<I>(&self, values: I) -> RequestContext
    where
        I: IntoIterator<Item = (String, RequestValue)>,
    {
        let mut ctx = self.context.clone();
        ctx.values.extend(values);
        ctx
    }
}

fn error_response(err: &AdminKitError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

fn not_registered(kind: &str, name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({
            "error": format!("{kind} '{name}' not found")
        })),
    )
        .into_response()
}

fn scalars(query: HashMap<String, String>) -> impl Iterator<Item = (String, RequestValue)> {
    query.into_iter().map(|(k, v)| (k, RequestValue::Scalar(v)))
}

/// Handler for `GET /`.
async fn handle_index(State(state): State<Arc<AdminSiteState>>) -> impl IntoResponse {
    let mut controllers: Vec<&String> = state.controllers.keys().collect();
    controllers.sort_unstable();
    let mut settings: Vec<&String> = state.settings_pages.keys().collect();
    settings.sort_unstable();
    axum::Json(serde_json::json!({
        "controllers": controllers,
        "settings": settings,
    }))
}

/// Handler for `GET /{controller}/content`.
async fn handle_content(
    State(state): State<Arc<AdminSiteState>>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(controller) = state.controllers.get(&name) else {
        return not_registered("Controller", &name);
    };
    let ctx = state.context_with(scalars(query));
    let _span = request_span(&name, &controller.action_name(&ctx)).entered();
    axum::Json(controller.init_content(&ctx)).into_response()
}

/// Handler for `GET /{controller}/`; an optional `scope` query parameter
/// restricts the list to one position sequence.
async fn handle_list(
    State(state): State<Arc<AdminSiteState>>,
    Path(name): Path<String>,
    Query(mut query): Query<HashMap<String, String>>,
) -> Response {
    let Some(controller) = state.controllers.get(&name) else {
        return not_registered("Controller", &name);
    };
    let scope = query
        .remove("scope")
        .map(|s| s.parse::<i64>().map_or_else(|_| Value::String(s), Value::Int));
    let ctx = state.context_with(scalars(query));

    match controller
        .list_records(&ctx, scope.as_ref())
        .instrument(request_span(&name, "list"))
        .await
    {
        Ok(rows) => {
            let rows: Vec<serde_json::Value> = rows.iter().map(adminkit_db::Row::to_json).collect();
            axum::Json(serde_json::json!({ "results": rows, "count": rows.len() })).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// Handler for `POST /{controller}/`.
async fn handle_create(
    State(state): State<Arc<AdminSiteState>>,
    Path(name): Path<String>,
    axum::Json(body): axum::Json<BTreeMap<String, serde_json::Value>>,
) -> Response {
    let Some(controller) = state.controllers.get(&name) else {
        return not_registered("Controller", &name);
    };
    let ctx = state.context_with(std::iter::empty());

    match controller
        .add_record(&body, &ctx)
        .instrument(request_span(&name, "add"))
        .await
    {
        Ok(id) => (StatusCode::CREATED, axum::Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handler for `DELETE /{controller}/{id}/`.
async fn handle_delete(
    State(state): State<Arc<AdminSiteState>>,
    Path((name, id)): Path<(String, i64)>,
) -> Response {
    let Some(controller) = state.controllers.get(&name) else {
        return not_registered("Controller", &name);
    };

    match controller
        .delete_record(id)
        .instrument(request_span(&name, "delete"))
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({"error": "Object not found"})),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handler for `POST /{controller}/positions`.
///
/// The JSON body carries `way`, `id` and the position list under the
/// entity key, e.g. `{"action": "updatePositions", "way": 1, "id": 3,
/// "home_slide": ["tr_1_3", "tr_1_1"]}`. The list may also be sent as an
/// object keyed by position.
async fn handle_positions(
    State(state): State<Arc<AdminSiteState>>,
    Path(name): Path<String>,
    axum::Json(body): axum::Json<HashMap<String, RequestValue>>,
) -> Response {
    let Some(controller) = state.controllers.get(&name) else {
        return not_registered("Controller", &name);
    };
    let ctx = state.context_with(body).with_ajax(true);

    match controller
        .update_positions(&ctx)
        .instrument(request_span(&name, "updatePositions"))
        .await
    {
        Ok(response) => (
            [(header::CONTENT_TYPE, response.content_type())],
            response.body(),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handler for `GET /settings/{page}/`.
async fn handle_settings_form(
    State(state): State<Arc<AdminSiteState>>,
    Path(page): Path<String>,
) -> Response {
    let Some(settings) = state.settings_pages.get(&page) else {
        return not_registered("Settings page", &page);
    };
    let ctx = state.context_with(std::iter::empty());

    match settings
        .render_form(&ctx)
        .instrument(request_span(&page, "render"))
        .await
    {
        Ok(form) => axum::Json(form).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Handler for `POST /settings/{page}/`: saves the submitted values and
/// returns the reloaded form.
async fn handle_settings_save(
    State(state): State<Arc<AdminSiteState>>,
    Path(page): Path<String>,
    axum::Json(body): axum::Json<HashMap<String, RequestValue>>,
) -> Response {
    let Some(settings) = state.settings_pages.get(&page) else {
        return not_registered("Settings page", &page);
    };
    let ctx = state
        .context_with(body)
        .with_value(SUBMIT_ACTION, "1");

    let result = async {
        settings.dispatch_action(&ctx).await?;
        settings.render_form(&ctx).await
    }
    .instrument(request_span(&page, SUBMIT_ACTION))
    .await;

    match result {
        Ok(form) => axum::Json(form).into_response(),
        Err(e) => error_response(&e),
    }
}
