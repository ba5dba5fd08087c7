use std::fs;
use std::io::ErrorKind;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{decode_args, ParameterSpec, Tool, ToolContext};
use crate::error::{ToolError, ToolResult};

pub struct ListFilesTool {
    ctx: ToolContext,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListFilesArgs {
    #[serde(default)]
    path: Option<String>,
}

impl ListFilesTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

pub(super) fn build(ctx: ToolContext) -> Box<dyn Tool> {
    Box::new(ListFilesTool::new(ctx))
}

impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "list_files"
    }

    fn description(&self) -> &'static str {
        "List the immediate entries of a workspace directory, sorted by name. Directories end \
         with '/'. Call this before read_file or edit_file to discover paths."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::optional(
            "path",
            "Directory relative to the workspace root. Defaults to the root.",
        )]
    }

    fn call(&self, arguments: &Map<String, Value>) -> ToolResult {
        let args: ListFilesArgs = decode_args(self, arguments)?;
        let resolved = self
            .ctx
            .sandbox
            .resolve(args.path.as_deref().unwrap_or("."))?;
        let relative = self.ctx.sandbox.relative(&resolved);
        self.ctx.emit(&format!("list_files {relative}"));

        let read_dir = match fs::read_dir(&resolved) {
            Ok(read_dir) => read_dir,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(ToolError::NotFound {
                    path: relative,
                    hint: "use list_files on a parent directory",
                });
            }
            Err(_) if resolved.is_file() => {
                return Err(ToolError::NotADirectory { path: relative });
            }
            Err(error) => return Err(ToolError::io(resolved, error)),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|error| ToolError::io(&resolved, error))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            // file_type does not follow symlinks; a link to a directory lists as a file.
            let is_dir = entry
                .file_type()
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if is_dir {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        Ok(json!({
            "path": relative,
            "count": entries.len(),
            "entries": entries,
        }))
    }
}
