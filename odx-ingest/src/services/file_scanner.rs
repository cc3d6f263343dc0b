//! Input file discovery
//!
//! Batch ingestion takes either a single file or a directory. Directories
//! are scanned one level deep and filtered by a simple `*` wildcard over
//! the file name; matches are returned in sorted order so batch runs are
//! reproducible.

use crate::error::{IngestError, IngestResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name filter built from a `*` wildcard pattern
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    /// Compile a wildcard such as `plate_*_abs.csv`.
    ///
    /// `*` matches any run of characters; everything else is literal.
    pub fn new(pattern: &str) -> IngestResult<Self> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| odx_common::Error::InvalidInput(format!("pattern {:?}: {}", pattern, e)))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Resolve `path` to the list of files to process.
///
/// A file is returned as is, whatever its name. A directory yields its
/// direct children matching `pattern`, sorted by name.
pub fn collect_input_files(path: &Path, pattern: &NamePattern) -> IngestResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(IngestError::InvalidPath(path.to_path_buf()));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                let matched = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| pattern.matches(name));
                if matched {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing entry: {}", e);
            }
        }
    }

    files.sort();

    tracing::debug!(
        dir = %path.display(),
        pattern = pattern.as_str(),
        "{} matching files",
        files.len()
    );

    Ok(files)
}

/// File name used for identifier recovery and log fields
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
