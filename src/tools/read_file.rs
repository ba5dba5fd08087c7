use std::fs;
use std::io::ErrorKind;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{decode_args, ParameterSpec, Tool, ToolContext};
use crate::error::{ToolError, ToolResult};

pub struct ReadFileTool {
    ctx: ToolContext,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadFileArgs {
    path: String,
}

impl ReadFileTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

pub(super) fn build(ctx: ToolContext) -> Box<dyn Tool> {
    Box::new(ReadFileTool::new(ctx))
}

impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the full text of one file in the workspace. Call list_files first when you are \
         not sure the path exists, and always read a file before editing it."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required(
            "path",
            "File path relative to the workspace root.",
        )]
    }

    fn call(&self, arguments: &Map<String, Value>) -> ToolResult {
        let args: ReadFileArgs = decode_args(self, arguments)?;
        let resolved = self.ctx.sandbox.resolve(&args.path)?;
        let relative = self.ctx.sandbox.relative(&resolved);
        self.ctx.emit(&format!("read_file {relative}"));

        let metadata = match fs::metadata(&resolved) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(ToolError::NotFound {
                    path: relative,
                    hint: "use list_files to find the correct path",
                });
            }
            Err(error) => return Err(ToolError::io(resolved, error)),
        };
        if metadata.is_dir() {
            return Err(ToolError::IsDirectory { path: relative });
        }

        let limit = self.ctx.config.read.max_bytes;
        if metadata.len() > limit {
            return Err(ToolError::FileTooLarge {
                path: relative,
                size: metadata.len(),
                limit,
            });
        }

        let bytes = fs::read(&resolved).map_err(|error| ToolError::io(&resolved, error))?;
        let size = bytes.len();
        let content =
            String::from_utf8(bytes).map_err(|_| ToolError::NotUtf8 { path: relative.clone() })?;

        Ok(json!({
            "path": relative,
            "content": content,
            "lines": content.lines().count(),
            "size": size,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AgentConfig;
    use crate::tools::test_support::{context, context_with, CapturingUi};
    use crate::ui::MessageKind;

    fn call(tool: &ReadFileTool, path: &str) -> ToolResult {
        let mut arguments = Map::new();
        arguments.insert("path".to_string(), json!(path));
        tool.call(&arguments)
    }

    #[test]
    fn reads_content_lines_and_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("hello.txt"), "one\ntwo\n").expect("write");
        let (ctx, ui) = context(dir.path());
        let tool = ReadFileTool::new(ctx);

        let payload = call(&tool, "hello.txt").expect("read should succeed");
        assert_eq!(payload["path"], "hello.txt");
        assert_eq!(payload["content"], "one\ntwo\n");
        assert_eq!(payload["lines"], 2);
        assert_eq!(payload["size"], 8);

        let rendered = crate::lock_unpoisoned(&ui.rendered).clone();
        assert_eq!(
            rendered,
            vec![(MessageKind::Tool, "read_file hello.txt".to_string())]
        );
    }

    #[test]
    fn missing_file_points_at_list_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (ctx, _ui) = context(dir.path());
        let error = call(&ReadFileTool::new(ctx), "nope.rs").expect_err("missing");
        assert!(matches!(error, ToolError::NotFound { .. }));
        assert!(error.hint().expect("hint").contains("list_files"));
    }

    #[test]
    fn directories_are_rejected_with_a_hint() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("src")).expect("mkdir");
        let (ctx, _ui) = context(dir.path());
        let error = call(&ReadFileTool::new(ctx), "src").expect_err("directory");
        assert!(matches!(error, ToolError::IsDirectory { .. }));
        assert_eq!(error.hint().as_deref(), Some("use list_files on this path"));
    }

    #[test]
    fn oversized_files_are_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("big.log"), "x".repeat(64)).expect("write");
        let mut config = AgentConfig::default();
        config.read.max_bytes = 16;
        let ctx = context_with(dir.path(), config, Arc::new(CapturingUi::default()));

        let error = call(&ReadFileTool::new(ctx), "big.log").expect_err("too large");
        assert!(matches!(
            error,
            ToolError::FileTooLarge {
                size: 64,
                limit: 16,
                ..
            }
        ));
    }

    #[test]
    fn binary_content_is_reported_as_not_utf8() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).expect("write");
        let (ctx, _ui) = context(dir.path());
        let error = call(&ReadFileTool::new(ctx), "blob.bin").expect_err("binary");
        assert!(matches!(error, ToolError::NotUtf8 { .. }));
    }

    #[test]
    fn missing_path_argument_is_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (ctx, _ui) = context(dir.path());
        let error = ReadFileTool::new(ctx)
            .call(&Map::new())
            .expect_err("missing argument");
        assert!(matches!(error, ToolError::InvalidArguments { .. }));
        assert_eq!(
            error.hint().as_deref(),
            Some("expected parameters: path (string, required)")
        );
    }
}
