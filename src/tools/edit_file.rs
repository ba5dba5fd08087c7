use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{decode_args, ParameterSpec, Tool, ToolContext};
use crate::error::{ToolError, ToolResult};

/// Longest `old_str` prefix echoed back in a `StringNotFound` failure.
const SEARCHED_PREVIEW_CHARS: usize = 100;

/// Creates a file when `old_str` is empty, otherwise replaces the single
/// occurrence of `old_str`. Ambiguous edits are rejected, never guessed.
pub struct EditFileTool {
    ctx: ToolContext,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EditFileArgs {
    path: String,
    old_str: String,
    new_str: String,
}

impl EditFileTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    fn create(&self, path: &Path, relative: String, content: &str) -> ToolResult {
        if path.symlink_metadata().is_ok() {
            return Err(ToolError::AlreadyExists { path: relative });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| ToolError::io(parent, error))?;
        }
        fs::write(path, content).map_err(|error| ToolError::io(path, error))?;

        tracing::debug!(path = %relative, bytes = content.len(), "file created");
        Ok(json!({
            "action": "created",
            "path": relative,
            "lines": content.lines().count(),
            "bytes": content.len(),
        }))
    }

    fn replace(&self, path: &Path, relative: String, old_str: &str, new_str: &str) -> ToolResult {
        if !path.exists() {
            return Err(ToolError::DoesNotExist { path: relative });
        }
        if path.is_dir() {
            return Err(ToolError::IsDirectory { path: relative });
        }

        let current = match fs::read(path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map_err(|_| ToolError::NotUtf8 { path: relative.clone() })?,
            Err(error) => return Err(ToolError::io(path, error)),
        };

        let occurrences = current.matches(old_str).count();
        match occurrences {
            0 => {
                return Err(ToolError::StringNotFound {
                    path: relative,
                    searched: old_str.chars().take(SEARCHED_PREVIEW_CHARS).collect(),
                });
            }
            1 => {}
            occurrences => {
                return Err(ToolError::NotUnique {
                    path: relative,
                    occurrences,
                });
            }
        }

        let updated = current.replacen(old_str, new_str, 1);
        fs::write(path, &updated).map_err(|error| ToolError::io(path, error))?;

        let before = current.lines().count();
        let after = updated.lines().count();
        let line_delta = i64::try_from(after).unwrap_or(i64::MAX)
            - i64::try_from(before).unwrap_or(i64::MAX);

        tracing::debug!(path = %relative, line_delta, "file edited");
        Ok(json!({
            "action": "edited",
            "path": relative,
            "line_delta": line_delta,
            "lines": after,
        }))
    }
}

pub(super) fn build(ctx: ToolContext) -> Box<dyn Tool> {
    Box::new(EditFileTool::new(ctx))
}

impl Tool for EditFileTool {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Create or edit a workspace file. With an empty old_str, creates the file (and missing \
         parent directories) containing new_str; the file must not exist yet. With a non-empty \
         old_str, replaces its single exact occurrence with new_str. Call read_file first and \
         copy old_str exactly, including whitespace, with enough context to be unique."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("path", "File path relative to the workspace root."),
            ParameterSpec::required(
                "old_str",
                "Exact text to replace. Empty to create a new file.",
            ),
            ParameterSpec::required(
                "new_str",
                "Replacement text, or the full content of a new file.",
            ),
        ]
    }

    fn call(&self, arguments: &Map<String, Value>) -> ToolResult {
        let args: EditFileArgs = decode_args(self, arguments)?;
        if !args.old_str.is_empty() && args.old_str == args.new_str {
            return Err(ToolError::IdenticalStrings);
        }

        let resolved = self.ctx.sandbox.resolve(&args.path)?;
        let relative = self.ctx.sandbox.relative(&resolved);

        if args.old_str.is_empty() {
            self.ctx.emit(&format!("edit_file {relative} (create)"));
            self.create(&resolved, relative, &args.new_str)
        } else {
            self.ctx.emit(&format!("edit_file {relative}"));
            self.replace(&resolved, relative, &args.old_str, &args.new_str)
        }
    }
}
