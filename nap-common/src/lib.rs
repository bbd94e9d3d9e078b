//! # NAP Common Library
//!
//! Shared code for the NAP audit service including:
//! - Configuration model and loading (TOML, environment, defaults)
//! - Common error type
//! - Logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
