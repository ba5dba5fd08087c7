//! Built-in tools.
//!
//! Each tool validates its arguments, resolves every path through the shared
//! [`PathSandbox`], announces itself on the output sink and returns a
//! [`ToolResult`]. Tools keep no state between calls.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::AgentConfig;
use crate::error::{ToolError, ToolResult};
use crate::sandbox::PathSandbox;
use crate::ui::{MessageKind, Ui};

mod edit_file;
mod git;
mod list_files;
mod process;
mod read_file;
mod search_files;
mod shell;

pub use edit_file::EditFileTool;
pub use git::{GitOperationTool, ALLOWED_GIT_OPERATIONS};
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use search_files::SearchFilesTool;
pub use shell::{ApprovalState, RunShellCommandTool};

/// JSON type of every tool parameter.
pub const PARAMETER_TYPE: &str = "string";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

impl ParameterSpec {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: false,
            description,
        }
    }
}

/// A named, schema-described capability the model may invoke.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Shown to the model; states when to call the tool and what to call first.
    fn description(&self) -> &'static str;

    fn parameters(&self) -> Vec<ParameterSpec>;

    fn call(&self, arguments: &Map<String, Value>) -> ToolResult;
}

/// Capabilities every tool holds by composition.
#[derive(Clone)]
pub struct ToolContext {
    pub sandbox: Arc<PathSandbox>,
    pub ui: Arc<dyn Ui>,
    pub config: Arc<AgentConfig>,
}

impl ToolContext {
    pub fn new(sandbox: Arc<PathSandbox>, ui: Arc<dyn Ui>, config: Arc<AgentConfig>) -> Self {
        Self {
            sandbox,
            ui,
            config,
        }
    }

    pub fn emit(&self, activity: &str) {
        self.ui.render(activity, MessageKind::Tool);
    }
}

/// Registration list consumed by `ToolRegistry::builtin`. A constructor added
/// here is exposed to the model automatically.
pub const BUILTIN_TOOLS: &[fn(ToolContext) -> Box<dyn Tool>] = &[
    read_file::build,
    list_files::build,
    edit_file::build,
    search_files::build,
    shell::build,
    git::build,
];

/// Decodes call arguments into a tool's typed argument struct.
pub(crate) fn decode_args<T>(tool: &dyn Tool, arguments: &Map<String, Value>) -> Result<T, ToolError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(Value::Object(arguments.clone())).map_err(|error| {
        ToolError::InvalidArguments {
            message: error.to_string(),
            hint: expected_parameters_hint(&tool.parameters()),
        }
    })
}

fn expected_parameters_hint(parameters: &[ParameterSpec]) -> String {
    let listed: Vec<String> = parameters
        .iter()
        .map(|parameter| {
            let requirement = if parameter.required { "required" } else { "optional" };
            format!("{} ({}, {requirement})", parameter.name, PARAMETER_TYPE)
        })
        .collect();
    format!("expected parameters: {}", listed.join(", "))
}

/// Cuts `content` to at most `max_bytes` on a char boundary and marks the cut.
pub(crate) fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes;
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = content[..cutoff].to_string();
    truncated.push_str("\n[truncated]");
    truncated
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use super::ToolContext;
    use crate::config::AgentConfig;
    use crate::sandbox::PathSandbox;
    use crate::ui::{MessageKind, Ui};

    #[derive(Default)]
    pub struct CapturingUi {
        pub rendered: Mutex<Vec<(MessageKind, String)>>,
        pub confirmations: Mutex<Vec<String>>,
        pub approve: bool,
    }

    impl Ui for CapturingUi {
        fn render(&self, message: &str, kind: MessageKind) {
            crate::lock_unpoisoned(&self.rendered).push((kind, message.to_string()));
        }

        fn stream_delta(&self, _delta: &str) {}

        fn confirm(&self, prompt: &str) -> bool {
            crate::lock_unpoisoned(&self.confirmations).push(prompt.to_string());
            self.approve
        }
    }

    pub fn context_with(root: &Path, config: AgentConfig, ui: Arc<CapturingUi>) -> ToolContext {
        let sandbox = PathSandbox::new(root).expect("sandbox");
        ToolContext::new(Arc::new(sandbox), ui, Arc::new(config))
    }

    pub fn context(root: &Path) -> (ToolContext, Arc<CapturingUi>) {
        let ui = Arc::new(CapturingUi::default());
        (context_with(root, AgentConfig::default(), ui.clone()), ui)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "aé".repeat(10);
        let truncated = truncate_to_byte_limit(text, 5);
        assert_eq!(truncated, "aéa\n[truncated]");
    }

    #[test]
    fn short_content_is_untouched() {
        assert_eq!(truncate_to_byte_limit("ok".to_string(), 10), "ok");
    }

    #[test]
    fn builtin_tools_have_unique_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (ctx, _ui) = test_support::context(dir.path());
        let mut names: Vec<_> = BUILTIN_TOOLS
            .iter()
            .map(|build| build(ctx.clone()).name())
            .collect();
        assert_eq!(
            names,
            vec![
                "read_file",
                "list_files",
                "edit_file",
                "search_files",
                "run_shell_command",
                "git_operation"
            ]
        );
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BUILTIN_TOOLS.len());
    }
}
