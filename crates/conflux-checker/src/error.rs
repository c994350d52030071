//! Diagnostics and import failures

use std::fmt;
use std::path::PathBuf;

use conflux_core::{CoreError, Position};
use thiserror::Error;

/// A semantic diagnostic produced while checking one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    /// `None` when the offending node carries no position
    pub position: Option<Position>,
    pub message: String,
}

impl TypeError {
    pub fn new(position: Option<Position>, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(position) => write!(f, "{}: {}", position, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for TypeError {}

/// Why an import could not be satisfied
///
/// Cloneable so that a failed resolution can be replayed to every later
/// importer of the same path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("import cycle detected at {0}")]
    Cycle(String),

    #[error("can't find import: {path}: {reason}")]
    Binary { path: String, reason: String },

    #[error("cannot load {path} from source: {reason}")]
    Source { path: String, reason: String },

    #[error("load aborted before importing {0}")]
    Aborted(String),
}

/// Failure reading or decoding a symbol file
#[derive(Error, Debug)]
pub enum SymbolError {
    #[error(transparent)]
    InvalidImportPath(CoreError),

    #[error("no symbol data at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed symbol data in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("symbol data describes package {found}, expected {expected}")]
    PathMismatch { expected: String, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_display() {
        let err = TypeError::new(
            Some(Position {
                filename: "a.cfx".to_string(),
                line: 3,
                column: 7,
            }),
            "undeclared name: x",
        );
        assert_eq!(err.to_string(), "a.cfx:3:7: undeclared name: x");
        assert_eq!(
            TypeError::new(None, "boom").to_string(),
            "boom"
        );
    }

    #[test]
    fn test_cycle_message() {
        assert_eq!(
            ImportError::Cycle("a".to_string()).to_string(),
            "import cycle detected at a"
        );
    }
}
