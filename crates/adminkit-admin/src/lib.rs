//! # adminkit-admin
//!
//! Admin-panel building blocks for shop modules.
//!
//! ## Modules
//!
//! - [`positions`] - Dense, gap-free ordering of entity rows
//! - [`controller`] - Object-model controllers composed from capability traits
//! - [`shop`] - Multishop joins and shop-context notices
//! - [`form`] - Declarative form schemas
//! - [`configuration`] - Key/value configuration stores
//! - [`settings_form`] - Settings pages backed by a configuration store
//! - [`module`] - Module descriptors and upgrade checks
//! - [`images`] - Per-object image files
//! - [`site`] - Axum router exposing the controllers

pub mod configuration;
pub mod controller;
pub mod form;
pub mod images;
pub mod module;
pub mod positions;
pub mod settings_form;
pub mod shop;
pub mod site;

pub use configuration::{
    ConfigValue, ConfigurationStore, InMemoryConfigurationStore, SqlConfigurationStore,
};
pub use controller::{
    ContentOutcome, EntityAdmin, Formable, ListColumn, ListConfig, Listable,
    ObjectModelController, Positionable, ShopScoped, UpdatePositionsResponse,
};
pub use form::{FormInput, FormSchema, FormSection};
pub use images::{ImageManager, UploadStatus, UploadedFile};
pub use module::{Module, ModuleCategory};
pub use positions::{Direction, PositionManager};
pub use settings_form::{FieldValue, RenderedForm, SettingsController};
pub use site::AdminSite;
