//! # Kiosk Common Library
//!
//! Shared code for the kiosk device services:
//! - Bootstrap configuration loading (TOML + environment)
//! - Content model types exchanged with the control plane
//! - Common error type

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{ContentItem, IngestionRequest};
