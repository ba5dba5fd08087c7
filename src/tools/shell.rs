use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::process;
use super::{decode_args, ParameterSpec, Tool, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::gate::{Approval, ShellCommandGate};

/// Confirmation state of one shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    PendingApproval,
    Approved,
    Declined,
}

impl ApprovalState {
    /// Moves a pending command to `Approved` or `Declined`. Settled states
    /// are final.
    fn settle(self, gate: &ShellCommandGate, command: &str, confirm: impl FnOnce() -> bool) -> Self {
        if self != Self::PendingApproval {
            return self;
        }
        match gate.evaluate(command) {
            Approval::Auto => Self::Approved,
            Approval::NeedsConfirmation if confirm() => Self::Approved,
            Approval::NeedsConfirmation => Self::Declined,
        }
    }
}

pub struct RunShellCommandTool {
    ctx: ToolContext,
    gate: ShellCommandGate,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RunShellCommandArgs {
    command: String,
}

impl RunShellCommandTool {
    pub fn new(ctx: ToolContext) -> Self {
        let gate = ShellCommandGate::from_config(&ctx.config);
        Self { ctx, gate }
    }

    pub fn approve(&self, command: &str) -> ApprovalState {
        ApprovalState::PendingApproval.settle(&self.gate, command, || {
            self.ctx
                .ui
                .confirm(&format!("Run shell command `{command}`?"))
        })
    }
}

pub(super) fn build(ctx: ToolContext) -> Box<dyn Tool> {
    Box::new(RunShellCommandTool::new(ctx))
}

impl Tool for RunShellCommandTool {
    fn name(&self) -> &'static str {
        "run_shell_command"
    }

    fn description(&self) -> &'static str {
        "Run a bash command with the workspace root as the working directory and return its exit \
         code, stdout and stderr. The user may be asked to approve the command and may decline; \
         prefer read_file, list_files and search_files for inspecting files."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required(
            "command",
            "Command line passed to `bash -c`.",
        )]
    }

    fn call(&self, arguments: &Map<String, Value>) -> ToolResult {
        let args: RunShellCommandArgs = decode_args(self, arguments)?;
        let command = args.command.trim().to_string();
        if command.is_empty() {
            return Err(ToolError::InvalidArguments {
                message: "command must not be empty".to_string(),
                hint: "pass the full command line in `command`".to_string(),
            });
        }

        self.ctx.emit(&format!("run_shell_command {command}"));
        let state = self.approve(&command);
        tracing::debug!(command = %command, ?state, "shell command approval settled");
        if state != ApprovalState::Approved {
            return Err(ToolError::UserDeclined { command });
        }

        let mut shell = Command::new("bash");
        shell.arg("-c").arg(&command);
        let shell_config = &self.ctx.config.shell;
        let output = process::run(
            shell,
            self.ctx.sandbox.root(),
            shell_config.timeout_secs.map(Duration::from_secs),
            shell_config.max_output_bytes,
        )
        .map_err(|error| ToolError::internal(format!("failed to launch `{command}`: {error}")))?;

        let mut payload = json!({
            "success": output.success(),
            "exit_code": output.exit_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
            "command": command,
        });
        if output.timed_out {
            payload["timed_out"] = json!(true);
        }
        Ok(payload)
    }
}
