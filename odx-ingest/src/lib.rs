//! odx-ingest library interface
//!
//! Plate and experiment ETL, feature reconstruction, cached external
//! lookups and generated-table recovery. The `odx-ingest` binary is a thin
//! command-line layer over these modules.

pub mod db;
pub mod error;
pub mod parsers;
pub mod services;
pub mod wells;

pub use crate::error::{IngestError, IngestResult};
