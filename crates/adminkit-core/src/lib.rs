//! # adminkit-core
//!
//! Core types shared by every adminkit crate. This crate has no database or
//! HTTP dependencies and provides the foundation for the others.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Toolkit settings with defaults
//! - [`settings_loader`] - Loading settings from TOML/JSON and the environment
//! - [`logging`] - Tracing-based logging integration
//! - [`context`] - The explicit per-request context (shop, language, request values)
//! - [`version`] - Module version comparison

pub mod context;
pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod version;

// Re-export the most commonly used types at the crate root.
pub use context::{Language, RequestContext, RequestValue, Shop, ShopContext};
pub use error::{AdminKitError, AdminKitResult};
pub use settings::Settings;
pub use version::version_compare;
