//! Minimal provider-agnostic contract between the agent loop and a language model.
//!
//! This crate defines the model-facing history items, tool schemas, tool-call
//! envelopes and the streamed response shape. It excludes transport details,
//! protocol payloads and tool execution; the host owns tool dispatch and
//! re-invokes the provider with the augmented history.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

mod assembler;

pub use assembler::ToolCallAssembler;

/// Author of one history item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            _ => return None,
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-neutral model-facing message history item.
#[derive(Debug, Clone, PartialEq)]
pub enum RunMessage {
    System {
        text: String,
    },
    User {
        text: String,
    },
    Assistant {
        text: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        content: String,
    },
}

impl RunMessage {
    #[must_use]
    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::ToolResult { .. } => Role::Tool,
        }
    }
}

/// Host-owned tool schema exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema object describing the call arguments.
    pub parameters: Value,
}

/// Model request envelope for one host tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    #[must_use]
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Token counts reported by a provider for one response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.input.saturating_add(self.output)
    }

    /// Adds `other` into `self`. Counts never decrease.
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.input = self.input.saturating_add(other.input);
        self.output = self.output.saturating_add(other.output);
    }
}

/// One element of a streamed model response, in provider order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseChunk {
    TextDelta(String),
    /// Partial tool call. Fragments sharing `index` belong to the same call;
    /// `arguments_fragment` pieces concatenate into a JSON object.
    ToolCallFragment {
        index: usize,
        call_id: Option<String>,
        tool_name: Option<String>,
        arguments_fragment: String,
    },
    Usage(TokenUsage),
}

/// Error surfaced by a provider while starting or consuming a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider initialization failed: {0}")]
    Init(String),
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model stream failed: {0}")]
    Stream(String),
    #[error("model request was cancelled")]
    Cancelled,
}

/// Ordered, finite, non-restartable sequence of response chunks.
pub type ResponseStream = Box<dyn Iterator<Item = Result<ResponseChunk, ProviderError>> + Send>;

/// Input for one model invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub messages: Vec<RunMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// Immutable metadata describing a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Model collaborator used by the agent loop.
pub trait ModelProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Starts one model invocation and returns its response stream.
    ///
    /// Chunks must be yielded in the order the provider produced them. The
    /// stream ends when the response is complete; an `Err` item terminates it.
    fn stream(&self, request: ModelRequest) -> Result<ResponseStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct EchoProvider;

    impl ModelProvider for EchoProvider {
        fn profile(&self) -> ProviderProfile {
            ProviderProfile {
                provider_id: "echo".to_string(),
                model_id: "echo-model".to_string(),
            }
        }

        fn stream(&self, request: ModelRequest) -> Result<ResponseStream, ProviderError> {
            let text = match request.messages.last() {
                Some(RunMessage::User { text }) => text.clone(),
                _ => String::new(),
            };
            Ok(Box::new(
                vec![
                    Ok(ResponseChunk::TextDelta(text)),
                    Ok(ResponseChunk::Usage(TokenUsage::new(3, 1))),
                ]
                .into_iter(),
            ))
        }
    }

    #[test]
    fn role_round_trips_through_its_wire_name() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Tool] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("moderator"), None);
    }

    #[test]
    fn run_message_reports_its_role() {
        let message = RunMessage::ToolResult {
            call_id: "call-1".to_string(),
            tool_name: "read_file".to_string(),
            content: "{}".to_string(),
        };
        assert_eq!(message.role(), Role::Tool);
        assert_eq!(
            RunMessage::Assistant {
                text: String::new(),
                tool_calls: Vec::new(),
            }
            .role(),
            Role::Assistant
        );
    }

    #[test]
    fn token_usage_accumulates_monotonically() {
        let mut usage = TokenUsage::default();
        usage.accumulate(TokenUsage::new(10, 4));
        usage.accumulate(TokenUsage::new(5, 0));
        assert_eq!(usage, TokenUsage::new(15, 4));
        assert_eq!(usage.total(), 19);

        usage.accumulate(TokenUsage::new(u64::MAX, 0));
        assert_eq!(usage.input, u64::MAX);
    }

    #[test]
    fn provider_stream_preserves_chunk_order() {
        let provider = EchoProvider;
        let chunks: Vec<_> = provider
            .stream(ModelRequest {
                messages: vec![RunMessage::User {
                    text: "hello".to_string(),
                }],
                tools: Vec::new(),
            })
            .expect("echo stream should start")
            .collect::<Result<_, _>>()
            .expect("echo stream should not fail");

        assert_eq!(
            chunks,
            vec![
                ResponseChunk::TextDelta("hello".to_string()),
                ResponseChunk::Usage(TokenUsage::new(3, 1)),
            ]
        );
        assert_eq!(provider.profile().provider_id, "echo");
    }

    #[test]
    fn tool_call_request_deserializes_missing_arguments_as_empty_object() {
        let call: ToolCallRequest =
            serde_json::from_value(json!({"call_id": "c1", "tool_name": "list_files"}))
                .expect("tool call should deserialize");
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn provider_error_messages_are_descriptive() {
        assert_eq!(
            ProviderError::Request("HTTP 401".to_string()).to_string(),
            "model request failed: HTTP 401"
        );
        assert_eq!(
            ProviderError::Cancelled.to_string(),
            "model request was cancelled"
        );
    }
}
