//! # odx common library
//!
//! Shared code for the odx crates:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Database initialization and row models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
