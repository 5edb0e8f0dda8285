use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::report::Reporter;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to parse JSON file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error reading file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Short tag used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NotFound { .. } => "not_found",
            LoadError::Parse { .. } => "parse",
            LoadError::Io { .. } => "io",
        }
    }
}

/// Reads a search-result payload from disk. One attempt, no retries.
pub struct Loader<'r> {
    reporter: &'r dyn Reporter,
}

impl<'r> Loader<'r> {
    pub fn new(reporter: &'r dyn Reporter) -> Self {
        Loader { reporter }
    }

    pub fn load(&self, path: &Path) -> Result<Value, LoadError> {
        let result = read_payload(path);
        match &result {
            Ok(_) => self.reporter.payload_loaded(path),
            Err(e) => self.reporter.load_failed(e),
        }
        result
    }
}

fn read_payload(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => LoadError::NotFound {
            path: path.to_path_buf(),
        },
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    load_str(path, &text)
}

/// Parses already-read text, mapping syntax errors the same way `load` does.
pub fn load_str(path: &Path, text: &str) -> Result<Value, LoadError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    serde_json::from_str(text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
