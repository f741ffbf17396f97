//! # Calculator Catalog Common Library
//!
//! Shared code for the calculator catalog services:
//! - Error types
//! - Layered configuration (environment over TOML over defaults)
//! - Tracing setup

pub mod config;
pub mod error;
pub mod logging;

pub use config::ConfigSource;
pub use error::{Error, Result};
