#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use agent_provider::ToolCallRequest;
use deckhand::{lock_unpoisoned, AgentConfig, InputSource, MessageKind, PathSandbox, ToolContext, Ui};
use serde_json::Value;

/// Records everything the core sends to the terminal.
#[derive(Default)]
pub struct RecordingUi {
    pub rendered: Mutex<Vec<(MessageKind, String)>>,
    pub streamed: Mutex<String>,
    pub stream_ends: Mutex<usize>,
    pub confirmations: Mutex<Vec<String>>,
    approve: bool,
}

impl RecordingUi {
    pub fn approving() -> Self {
        Self {
            approve: true,
            ..Self::default()
        }
    }

    pub fn declining() -> Self {
        Self::default()
    }

    pub fn messages(&self, kind: MessageKind) -> Vec<String> {
        lock_unpoisoned(&self.rendered)
            .iter()
            .filter(|(rendered_kind, _)| *rendered_kind == kind)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn streamed(&self) -> String {
        lock_unpoisoned(&self.streamed).clone()
    }

    pub fn confirmations(&self) -> Vec<String> {
        lock_unpoisoned(&self.confirmations).clone()
    }
}

impl Ui for RecordingUi {
    fn render(&self, message: &str, kind: MessageKind) {
        lock_unpoisoned(&self.rendered).push((kind, message.to_string()));
    }

    fn stream_delta(&self, delta: &str) {
        lock_unpoisoned(&self.streamed).push_str(delta);
    }

    fn end_stream(&self) {
        *lock_unpoisoned(&self.stream_ends) += 1;
    }

    fn confirm(&self, prompt: &str) -> bool {
        lock_unpoisoned(&self.confirmations).push(prompt.to_string());
        self.approve
    }
}

/// Feeds prepared lines to `AgentLoop::run`, then reports end of input.
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(ToString::to_string).collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        self.lines.pop_front()
    }
}

pub fn config_for(workspace: &Path) -> AgentConfig {
    AgentConfig {
        workspace: workspace.to_path_buf(),
        provider: "mock".to_string(),
        ..AgentConfig::default()
    }
}

pub fn tool_context(workspace: &Path, config: AgentConfig, ui: Arc<RecordingUi>) -> ToolContext {
    let sandbox = PathSandbox::new(workspace).expect("workspace should be valid");
    ToolContext::new(Arc::new(sandbox), ui, Arc::new(config))
}

pub fn call(tool_name: &str, arguments: Value) -> ToolCallRequest {
    let Value::Object(arguments) = arguments else {
        panic!("tool arguments must be a JSON object");
    };
    ToolCallRequest::new("call-1", tool_name, arguments)
}
