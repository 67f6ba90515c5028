//! FILENAME: core/report-engine/src/error.rs
//! PURPOSE: Error types for configuration loading, data fetching and generation.
//! CONTEXT: `ReportError` is what `Generator` returns. Sheet and block failures
//! are wrapped once with the name of the sheet or block being processed;
//! `root_cause()` unwraps them again for callers that match on the cause.

use persistence::PersistenceError;
use sheet::RangeParseError;
use std::path::PathBuf;
use thiserror::Error;

/// A configuration rule violation. Nested failures carry their path in the
/// message (`sheet 0 error: block 1 error: block name is required`).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError(message.into())
    }

    /// Prefixes the message with the location it was found at.
    pub fn within(self, location: impl std::fmt::Display) -> Self {
        ValidationError(format!("{} error: {}", location, self.0))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse JSON {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("workbook configuration missing in {}", .0.display())]
    MissingWorkbook(PathBuf),

    #[error("{kind} config missing name")]
    MissingName { kind: &'static str },

    #[error("duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("invalid {kind} config '{name}': {source}")]
    Invalid {
        kind: &'static str,
        name: String,
        #[source]
        source: ValidationError,
    },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("data view not found: {0}")]
    ViewNotFound(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("unknown data view '{0}'")]
    UnknownView(String),

    #[error("label '{label}' not found in data view '{view}'")]
    UnknownLabel { view: String, label: String },

    #[error("param label '{label}' not found in data view '{view}'")]
    UnknownParamLabel { view: String, label: String },

    #[error("matrix block '{0}' must have both vertical and horizontal axes")]
    MissingAxis(String),

    #[error("cannot determine parameter key for axis '{0}'")]
    MissingAxisKey(String),

    #[error(transparent)]
    InvalidRange(#[from] RangeParseError),

    #[error("unsupported block type '{kind}' in block '{block}'")]
    UnsupportedBlockType { block: String, kind: String },

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("document error: {0}")]
    Document(#[from] PersistenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("processing sheet {sheet}")]
    Sheet {
        sheet: String,
        #[source]
        source: Box<ReportError>,
    },

    #[error("processing block {block}")]
    Block {
        block: String,
        #[source]
        source: Box<ReportError>,
    },
}

impl ReportError {
    pub fn in_sheet(self, sheet: &str) -> Self {
        ReportError::Sheet {
            sheet: sheet.to_string(),
            source: Box::new(self),
        }
    }

    pub fn in_block(self, block: &str) -> Self {
        ReportError::Block {
            block: block.to_string(),
            source: Box::new(self),
        }
    }

    /// The underlying error with sheet/block context removed.
    pub fn root_cause(&self) -> &ReportError {
        match self {
            ReportError::Sheet { source, .. } | ReportError::Block { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_root_cause_strips_context() {
        let err = ReportError::MissingAxis("Cross".into())
            .in_block("Cross")
            .in_sheet("Summary");

        assert_eq!(err.to_string(), "processing sheet Summary");
        assert!(matches!(err.root_cause(), ReportError::MissingAxis(name) if name == "Cross"));

        let block = err.source().unwrap();
        assert_eq!(block.to_string(), "processing block Cross");
    }

    #[test]
    fn test_validation_error_path() {
        let err = ValidationError::new("block name is required")
            .within("block 1")
            .within("sheet 0");
        assert_eq!(err.to_string(), "sheet 0 error: block 1 error: block name is required");
    }
}
