//! Turn-taking between the user, the model collaborator and the tools.
//!
//! State machine per turn:
//!
//! ```text
//! AwaitingInput -> Dispatching -> StreamingResponse -> AwaitingInput
//!                      ^                 |
//!                      |                 v
//!                      +------ ToolCallPending
//! ```
//!
//! Tool calls are dispatched one at a time, in the order the model requested
//! them. Failures from the provider end the turn but never the session.

use std::io;
use std::sync::Arc;

use agent_provider::{
    ModelProvider, ModelRequest, ProviderError, ProviderProfile, ResponseChunk, ToolCallAssembler,
    ToolCallRequest,
};
use session_store::{SessionStore, SessionStoreError};
use thiserror::Error;

use crate::commands::{parse_slash_command, SlashCommand, SLASH_COMMAND_HELP};
use crate::config::AgentConfig;
use crate::conversation::{ConversationState, Message};
use crate::prompt::system_prompt;
use crate::registry::ToolRegistry;
use crate::sandbox::PathSandbox;
use crate::tools::ToolContext;
use crate::ui::{InputSource, MessageKind, Ui};

pub const INPUT_PROMPT: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    /// A model request is in flight.
    Dispatching,
    /// Consuming the model's response stream.
    StreamingResponse,
    /// The model asked for tools; they run before the next dispatch.
    ToolCallPending,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("stopped after {0} tool rounds without a final answer")]
    ToolRoundLimit(usize),
    #[error("workspace is unusable: {0}")]
    Workspace(#[source] io::Error),
}

/// One session: owns the conversation and drives every turn.
pub struct AgentLoop {
    config: Arc<AgentConfig>,
    provider: Arc<dyn ModelProvider>,
    registry: ToolRegistry,
    conversation: ConversationState,
    ui: Arc<dyn Ui>,
    store: Option<SessionStore>,
    state: LoopState,
    /// Ids issued to tool calls that arrived without one.
    generated_call_ids: usize,
}

/// Text and tool calls collected from one response stream.
struct ModelResponse {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
}

impl AgentLoop {
    /// Builds the registry over `config.workspace` and seeds the conversation
    /// with the system prompt.
    pub fn new(
        config: Arc<AgentConfig>,
        provider: Arc<dyn ModelProvider>,
        ui: Arc<dyn Ui>,
    ) -> Result<Self, AgentError> {
        let sandbox = Arc::new(PathSandbox::new(&config.workspace).map_err(AgentError::Workspace)?);
        let registry = ToolRegistry::builtin(ToolContext::new(
            Arc::clone(&sandbox),
            Arc::clone(&ui),
            Arc::clone(&config),
        ));

        let mut conversation = ConversationState::new(config.max_history);
        conversation.append(Message::system(system_prompt(
            config.system_prompt.as_deref(),
            sandbox.root(),
            &registry,
        )));

        let store = config
            .save_history
            .then(|| SessionStore::new(config.resolved_history_path()));

        let profile = provider.profile();
        tracing::info!(
            provider = %profile.provider_id,
            model = %profile.model_id,
            workspace = %sandbox.root().display(),
            persist = store.is_some(),
            "session started"
        );

        Ok(Self {
            config,
            provider,
            registry,
            conversation,
            ui,
            store,
            state: LoopState::AwaitingInput,
            generated_call_ids: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn provider_profile(&self) -> ProviderProfile {
        self.provider.profile()
    }

    /// Loads the persisted snapshot, if persistence is on, keeping the freshly
    /// built system prompt in front. Returns how many messages were restored.
    pub fn restore_history(&mut self) -> Result<usize, SessionStoreError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let restored: Vec<Message> = store
            .load()?
            .iter()
            .filter_map(Message::from_record)
            .filter(|message| message.role != agent_provider::Role::System)
            .collect();
        if restored.is_empty() {
            return Ok(0);
        }

        let count = restored.len();
        self.generated_call_ids = restored
            .iter()
            .flat_map(|message| &message.tool_calls)
            .filter_map(|call| call.call_id.strip_prefix("call_")?.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        let mut messages = Vec::with_capacity(count + 1);
        messages.extend(self.conversation.messages().first().cloned());
        messages.extend(restored);
        self.conversation.restore(messages);
        tracing::info!(count, "conversation restored");
        Ok(count)
    }

    /// Runs one turn for `input` and returns the model's final text.
    ///
    /// Errors are rendered through the UI before being returned; the loop is
    /// back in [`LoopState::AwaitingInput`] either way.
    pub fn ask(&mut self, input: &str) -> Result<String, AgentError> {
        let outcome = self.run_turn(input);
        self.transition(LoopState::AwaitingInput);
        if let Err(error) = &outcome {
            tracing::warn!(%error, "turn failed");
            self.ui.render(&format!("Error: {error}"), MessageKind::Error);
        }
        outcome
    }

    /// Interactive loop: reads lines until end of input or `/quit`.
    pub fn run(&mut self, input: &mut dyn InputSource) {
        while let Some(line) = input.read_line(INPUT_PROMPT) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_slash_command(line) {
                Some(SlashCommand::Quit) => break,
                Some(command) => self.handle_command(command),
                None => {
                    let _ = self.ask(line);
                }
            }
        }
        tracing::info!(messages = self.conversation.len(), "session ended");
    }

    fn handle_command(&mut self, command: SlashCommand) {
        match command {
            SlashCommand::Help => {
                for (name, summary) in SLASH_COMMAND_HELP {
                    self.ui.render(&format!("{name:<10} {summary}"), MessageKind::Info);
                }
            }
            SlashCommand::Clear => {
                self.conversation.clear();
                self.persist();
                self.ui.render("Conversation cleared.", MessageKind::Info);
            }
            SlashCommand::Tokens => {
                let usage = self.conversation.usage();
                self.ui.render(
                    &format!(
                        "Tokens used: {} input, {} output, {} total. Estimated context: {} tokens.",
                        usage.input,
                        usage.output,
                        usage.total(),
                        self.conversation.estimate_tokens()
                    ),
                    MessageKind::Info,
                );
            }
            SlashCommand::History => {
                self.ui.render(
                    &format!(
                        "{} messages in the conversation (limit {}).",
                        self.conversation.len(),
                        self.conversation.max_messages()
                    ),
                    MessageKind::Info,
                );
            }
            SlashCommand::Unknown(name) => {
                self.ui.render(
                    &format!("Unknown command {name}. Type /help for the list."),
                    MessageKind::Warning,
                );
            }
            SlashCommand::Quit => {}
        }
    }

    fn run_turn(&mut self, input: &str) -> Result<String, AgentError> {
        self.append(Message::user(input));
        let tools = self.registry.definitions();

        for round in 0..self.config.max_tool_rounds {
            self.transition(LoopState::Dispatching);
            let request = ModelRequest {
                messages: self.conversation.to_run_messages(),
                tools: tools.clone(),
            };
            tracing::debug!(round, messages = request.messages.len(), "invoking model");
            let stream = self.provider.stream(request)?;

            self.transition(LoopState::StreamingResponse);
            let response = self.consume(stream)?;
            self.append(Message::assistant(
                response.text.clone(),
                response.tool_calls.clone(),
            ));

            if response.tool_calls.is_empty() {
                return Ok(response.text);
            }

            self.transition(LoopState::ToolCallPending);
            for call in &response.tool_calls {
                let content = self.dispatch(call);
                self.append(Message::tool_result(
                    call.call_id.clone(),
                    call.tool_name.clone(),
                    content,
                ));
            }
        }

        Err(AgentError::ToolRoundLimit(self.config.max_tool_rounds))
    }

    /// Surfaces text deltas as they arrive and collects tool-call fragments.
    fn consume(&mut self, stream: agent_provider::ResponseStream) -> Result<ModelResponse, AgentError> {
        let mut text = String::new();
        let mut assembler = ToolCallAssembler::continuing_from(self.generated_call_ids);

        for chunk in stream {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    if !text.is_empty() {
                        self.ui.end_stream();
                    }
                    return Err(error.into());
                }
            };
            match chunk {
                ResponseChunk::TextDelta(delta) => {
                    self.ui.stream_delta(&delta);
                    text.push_str(&delta);
                }
                ResponseChunk::ToolCallFragment {
                    index,
                    call_id,
                    tool_name,
                    arguments_fragment,
                } => assembler.push_fragment(index, call_id, tool_name, &arguments_fragment),
                ResponseChunk::Usage(usage) => self.conversation.record_usage(usage),
            }
        }

        if !text.is_empty() {
            self.ui.end_stream();
        }
        let tool_calls = assembler.finish();
        self.generated_call_ids = assembler.generated_ids();
        Ok(ModelResponse { text, tool_calls })
    }

    /// Runs one tool call and returns the JSON text recorded for the model.
    fn dispatch(&self, call: &ToolCallRequest) -> String {
        match self.registry.dispatch(call) {
            Ok(payload) => payload.to_string(),
            Err(error) => {
                tracing::debug!(tool = %call.tool_name, %error, "tool call failed");
                self.ui.render(&error.to_string(), MessageKind::Error);
                if let Some(hint) = error.hint() {
                    self.ui.render(&hint, MessageKind::Hint);
                }
                error.to_payload().to_string()
            }
        }
    }

    fn append(&mut self, message: Message) {
        self.conversation.append(message);
        self.persist();
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let saved = self
            .conversation
            .to_records()
            .and_then(|records| store.save(&records));
        if let Err(error) = saved {
            tracing::warn!(%error, path = %store.path().display(), "failed to persist conversation");
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "loop state");
            self.state = next;
        }
    }
}
