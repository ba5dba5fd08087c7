use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::process;
use super::{decode_args, ParameterSpec, Tool, ToolContext};
use crate::error::{ToolError, ToolResult};

pub const ALLOWED_GIT_OPERATIONS: &[&str] = &["status", "diff", "log", "add", "commit", "branch"];

/// Flags that make git read or write files outside the repository.
const UNSANDBOXED_FLAGS: &[&str] = &["--output", "--no-index", "-o", "-O"];

pub struct GitOperationTool {
    ctx: ToolContext,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GitOperationArgs {
    operation: String,
    #[serde(default)]
    args: Option<String>,
}

impl GitOperationTool {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    /// Expands `operation` and its raw argument string into a git argv.
    fn command_line(&self, operation: &str, raw_args: &str) -> Result<Vec<String>, ToolError> {
        let raw_args = raw_args.trim();
        if operation == "commit" && !raw_args.is_empty() && !raw_args.starts_with('-') {
            return Ok(vec![
                operation.to_string(),
                "-m".to_string(),
                raw_args.to_string(),
            ]);
        }

        let words = shell_words::split(raw_args).map_err(|error| ToolError::InvalidArguments {
            message: format!("could not split args: {error}"),
            hint: "balance quotes in args".to_string(),
        })?;

        let mut argv = vec![operation.to_string()];
        match operation {
            "status" if words.is_empty() => argv.extend(["--short".into(), "--branch".into()]),
            "log" if words.is_empty() => argv.extend(["--oneline".into(), "-10".into()]),
            "add" if words.is_empty() => {
                return Err(ToolError::InvalidArguments {
                    message: "add needs at least one path".to_string(),
                    hint: "pass the paths to stage in args, e.g. \".\"".to_string(),
                });
            }
            "add" | "diff" | "log" | "status" => {
                self.check_paths(operation, &words)?;
                argv.extend(words);
            }
            "commit" if raw_args.is_empty() => {
                return Err(ToolError::InvalidArguments {
                    message: "commit needs a message".to_string(),
                    hint: "pass the commit message in args".to_string(),
                });
            }
            _ => argv.extend(words),
        }
        Ok(argv)
    }

    /// Resolves every non-flag argument, and everything after `--`, through
    /// the sandbox. Revisions such as `HEAD~1` or `main..topic` resolve to
    /// harmless names inside the workspace.
    fn check_paths(&self, operation: &str, words: &[String]) -> Result<(), ToolError> {
        let mut after_separator = false;
        for word in words {
            if after_separator {
                self.ctx.sandbox.resolve(word)?;
            } else if word == "--" {
                after_separator = true;
            } else if let Some(flag) = unsandboxed_flag(word) {
                return Err(ToolError::InvalidArguments {
                    message: format!("{operation} does not accept {flag}"),
                    hint: "read files with read_file and write them with edit_file".to_string(),
                });
            } else if !word.starts_with('-') {
                self.ctx.sandbox.resolve(word)?;
            }
        }
        Ok(())
    }

    /// Commits and branch mutations change repository state.
    fn needs_confirmation(argv: &[String]) -> bool {
        match argv.first().map(String::as_str) {
            Some("commit") => true,
            Some("branch") => argv.len() > 1,
            _ => false,
        }
    }
}

fn unsandboxed_flag(word: &str) -> Option<&'static str> {
    UNSANDBOXED_FLAGS.iter().copied().find(|flag| {
        let Some(rest) = word.strip_prefix(flag) else {
            return false;
        };
        // Short flags take their value attached (`-ofile`); long ones after `=`.
        rest.is_empty() || rest.starts_with('=') || !flag.starts_with("--")
    })
}

pub(super) fn build(ctx: ToolContext) -> Box<dyn Tool> {
    Box::new(GitOperationTool::new(ctx))
}

impl Tool for GitOperationTool {
    fn name(&self) -> &'static str {
        "git_operation"
    }

    fn description(&self) -> &'static str {
        "Run an allow-listed git operation in the workspace: status, diff, log, add, commit or \
         branch. status defaults to short form with branch, log defaults to the last 10 commits \
         in one-line form, and commit treats plain args as the message. Check status before add \
         and commit. Commits ask the user for approval."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required(
                "operation",
                "One of: status, diff, log, add, commit, branch.",
            ),
            ParameterSpec::optional("args", "Extra arguments, split with shell quoting rules."),
        ]
    }

    fn call(&self, arguments: &Map<String, Value>) -> ToolResult {
        let args: GitOperationArgs = decode_args(self, arguments)?;
        let operation = args.operation.trim().to_ascii_lowercase();
        if !ALLOWED_GIT_OPERATIONS.contains(&operation.as_str()) {
            return Err(ToolError::NotAllowed {
                operation,
                allowed: ALLOWED_GIT_OPERATIONS.to_vec(),
            });
        }

        let argv = self.command_line(&operation, args.args.as_deref().unwrap_or(""))?;
        let display = format!("git {}", shell_words::join(&argv));
        self.ctx.emit(&format!("git_operation {display}"));

        if Self::needs_confirmation(&argv) && !self.ctx.ui.confirm(&format!("Run `{display}`?")) {
            return Err(ToolError::UserDeclined { command: display });
        }

        let mut git = Command::new("git");
        git.args(&argv);
        let shell_config = &self.ctx.config.shell;
        let output = process::run(
            git,
            self.ctx.sandbox.root(),
            shell_config.timeout_secs.map(Duration::from_secs),
            shell_config.max_output_bytes,
        )
        .map_err(|error| ToolError::internal(format!("failed to launch `{display}`: {error}")))?;

        let combined = match (output.stdout.is_empty(), output.stderr.is_empty()) {
            (_, true) => output.stdout.clone(),
            (true, false) => output.stderr.clone(),
            (false, false) => format!("{}\n{}", output.stdout.trim_end(), output.stderr),
        };

        Ok(json!({
            "success": output.success(),
            "exit_code": output.exit_code,
            "output": combined,
            "command": display,
        }))
    }
}
