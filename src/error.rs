//! Tool failure taxonomy.
//!
//! Every tool call ends in a [`ToolResult`]. Failures carry enough structure to
//! be rendered for the user and serialized back to the model: an error
//! message, an optional hint, and auxiliary diagnostic fields.

use std::path::PathBuf;

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Outcome of one tool call. `Ok` holds the tool-specific success payload.
pub type ToolResult = Result<Value, ToolError>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("path '{path}' resolves outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("'{path}' does not exist")]
    NotFound { path: String, hint: &'static str },

    #[error("'{path}' is a directory")]
    IsDirectory { path: String },

    #[error("'{path}' is not a directory")]
    NotADirectory { path: String },

    #[error("old_str and new_str are identical; nothing to change")]
    IdenticalStrings,

    #[error("'{path}' already exists")]
    AlreadyExists { path: String },

    #[error("'{path}' does not exist")]
    DoesNotExist { path: String },

    #[error("old_str was not found in '{path}'")]
    StringNotFound { path: String, searched: String },

    #[error("old_str occurs {occurrences} times in '{path}'")]
    NotUnique { path: String, occurrences: usize },

    #[error("user declined to run `{command}`")]
    UserDeclined { command: String },

    #[error("git operation '{operation}' is not allowed")]
    NotAllowed {
        operation: String,
        allowed: Vec<&'static str>,
    },

    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String, hint: String },

    #[error("unknown tool '{name}'")]
    UnknownTool { name: String, available: Vec<String> },

    #[error("'{path}' is {size} bytes, above the {limit} byte read limit")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("'{path}' is not valid UTF-8 text")]
    NotUtf8 { path: String },

    #[error("io failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Internal { message: String },
}

impl ToolError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Guidance for the next call. `None` means the failure is not something
    /// the caller can fix by changing arguments.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        let hint = match self {
            Self::OutsideWorkspace { .. } | Self::Io { .. } | Self::Internal { .. } => {
                return None;
            }
            Self::NotFound { hint, .. } => (*hint).to_string(),
            Self::IsDirectory { .. } => "use list_files on this path".to_string(),
            Self::NotADirectory { .. } => "use read_file on this path".to_string(),
            Self::IdenticalStrings => "provide a new_str that differs from old_str".to_string(),
            Self::AlreadyExists { .. } => "use non-empty old_str to edit".to_string(),
            Self::DoesNotExist { .. } => "create it with empty old_str".to_string(),
            Self::StringNotFound { .. } => {
                "match exactly including whitespace; use read_file to see the current content"
                    .to_string()
            }
            Self::NotUnique { .. } => "add surrounding context".to_string(),
            Self::UserDeclined { .. } => {
                "ask the user how to proceed instead of retrying the command".to_string()
            }
            Self::NotAllowed { allowed, .. } => {
                format!("use one of: {}", allowed.join(", "))
            }
            Self::InvalidArguments { hint, .. } => hint.clone(),
            Self::UnknownTool { available, .. } => {
                format!("available tools: {}", available.join(", "))
            }
            Self::FileTooLarge { .. } => "use search_files to find the relevant lines".to_string(),
            Self::NotUtf8 { .. } => "binary files cannot be read as text".to_string(),
        };
        Some(hint)
    }

    /// Auxiliary diagnostic fields merged into the model-facing payload.
    #[must_use]
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        match self {
            Self::OutsideWorkspace { path }
            | Self::NotFound { path, .. }
            | Self::IsDirectory { path }
            | Self::NotADirectory { path }
            | Self::AlreadyExists { path }
            | Self::DoesNotExist { path }
            | Self::NotUtf8 { path } => {
                details.insert("path".to_string(), json!(path));
            }
            Self::StringNotFound { path, searched } => {
                details.insert("path".to_string(), json!(path));
                details.insert("searched".to_string(), json!(searched));
            }
            Self::NotUnique { path, occurrences } => {
                details.insert("path".to_string(), json!(path));
                details.insert("occurrences".to_string(), json!(occurrences));
            }
            Self::NotAllowed { allowed, .. } => {
                details.insert("allowed".to_string(), json!(allowed));
            }
            Self::FileTooLarge { path, size, limit } => {
                details.insert("path".to_string(), json!(path));
                details.insert("size".to_string(), json!(size));
                details.insert("limit".to_string(), json!(limit));
            }
            Self::IdenticalStrings
            | Self::UserDeclined { .. }
            | Self::InvalidArguments { .. }
            | Self::UnknownTool { .. }
            | Self::Io { .. }
            | Self::Internal { .. } => {}
        }
        details
    }

    /// JSON shape returned to the model: `error`, optional `hint`, details.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("error".to_string(), json!(self.to_string()));
        if let Some(hint) = self.hint() {
            payload.insert("hint".to_string(), json!(hint));
        }
        payload.extend(self.details());
        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_failures_carry_hints() {
        let recoverable = [
            ToolError::NotFound {
                path: "a.rs".to_string(),
                hint: "use list_files",
            },
            ToolError::IsDirectory {
                path: "src".to_string(),
            },
            ToolError::IdenticalStrings,
            ToolError::NotUnique {
                path: "a.rs".to_string(),
                occurrences: 2,
            },
            ToolError::UserDeclined {
                command: "rm -rf build".to_string(),
            },
        ];
        for error in recoverable {
            assert!(error.hint().is_some(), "{error} should carry a hint");
        }
    }

    #[test]
    fn fatal_failures_have_no_hint() {
        assert_eq!(
            ToolError::OutsideWorkspace {
                path: "../etc".to_string()
            }
            .hint(),
            None
        );
        assert_eq!(ToolError::internal("boom").hint(), None);
        assert_eq!(
            ToolError::io(
                "x",
                std::io::Error::new(std::io::ErrorKind::Other, "disk gone")
            )
            .hint(),
            None
        );
    }

    #[test]
    fn payload_includes_error_hint_and_details() {
        let payload = ToolError::NotUnique {
            path: "lib.rs".to_string(),
            occurrences: 3,
        }
        .to_payload();

        assert_eq!(payload["error"], "old_str occurs 3 times in 'lib.rs'");
        assert_eq!(payload["hint"], "add surrounding context");
        assert_eq!(payload["occurrences"], 3);
        assert_eq!(payload["path"], "lib.rs");
    }

    #[test]
    fn not_allowed_lists_the_allowed_set() {
        let error = ToolError::NotAllowed {
            operation: "push".to_string(),
            allowed: vec!["status", "diff"],
        };
        assert_eq!(error.hint().as_deref(), Some("use one of: status, diff"));
        assert_eq!(error.to_payload()["allowed"], json!(["status", "diff"]));
    }

    #[test]
    fn payload_omits_hint_for_internal_failures() {
        let payload = ToolError::internal("tool panicked").to_payload();
        assert_eq!(payload, json!({"error": "tool panicked"}));
    }
}
