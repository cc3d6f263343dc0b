//! Test Helper Utilities
//!
//! Shared utilities for odx-ingest integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;

pub use db_utils::{count_rows, create_file_db, create_test_pool, seed_catalog};
pub use fixtures::{write_fixture, PLATE_7, SHEET_EXP_1};
