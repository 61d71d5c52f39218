//! # depot-core
//!
//! Core types, contracts, and configuration for the depot file plane.
//!
//! This crate provides the domain entities and trait definitions the other
//! depot crates depend on: the content-addressed data model, the error
//! taxonomy, MIME/file-safety helpers, and the immutable startup config.

pub mod config;
pub mod defaults;
pub mod error;
pub mod file_type;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{normalize_email, DepotConfig};
pub use error::{Error, Result};
pub use file_type::{resolve_mime, sanitize_filename, screen_upload, ResolvedMime};
pub use models::*;
pub use traits::*;
