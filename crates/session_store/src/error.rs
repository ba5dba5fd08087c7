use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot JSON in {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot in {path} must be a JSON array of messages")]
    NotAnArray { path: PathBuf },

    #[error("record {index} in {path} is malformed: {source}")]
    InvalidRecord {
        path: PathBuf,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {index} in {path} has unknown role '{role}'")]
    UnknownRole {
        path: PathBuf,
        index: usize,
        role: String,
    },

    #[error("record {index} in {path} has invalid RFC3339 timestamp: {value}")]
    InvalidTimestamp {
        path: PathBuf,
        index: usize,
        value: String,
    },

    #[error("failed to serialize snapshot for {path}: {source}")]
    JsonSerialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to format current UTC timestamp as RFC3339: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl SessionStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn json_serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::JsonSerialize {
            path: path.into(),
            source,
        }
    }

    /// Index of the offending record, when the failure is tied to one.
    #[must_use]
    pub fn record_index(&self) -> Option<usize> {
        match self {
            Self::InvalidRecord { index, .. }
            | Self::UnknownRole { index, .. }
            | Self::InvalidTimestamp { index, .. } => Some(*index),
            _ => None,
        }
    }
}
