//! Configuration models, setup entry point and layered config loading.
//!
//! This crate owns the rendering service's configuration surface: API
//! endpoint registrations, proxying, SSL verification, CORS and listener
//! options. Everything here is handed to an external runtime as-is; only the
//! endpoint registration invariants are checked when configuring.

mod error;
mod loader;
mod model;
mod setup;
pub mod wikis;

/// Public error types returned by registration, loading and lookups.
pub use error::{ConfigError, ValidationError};
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
/// Setup entry point.
pub use setup::{ConfigSetup, configure};
