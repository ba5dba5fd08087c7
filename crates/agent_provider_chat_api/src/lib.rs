//! Chat-completions-backed implementation of the shared `agent_provider` contract.
//!
//! The adapter runs the async `chat_api` transport on a dedicated thread with
//! a current-thread tokio runtime and forwards normalized events through a
//! channel, so the agent loop consumes a plain blocking iterator. Dropping the
//! returned stream cancels the in-flight request.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use agent_provider::{
    ModelProvider, ModelRequest, ProviderError, ProviderProfile, ResponseChunk, ResponseStream,
    RunMessage, TokenUsage, ToolDefinition,
};
use chat_api::{
    CancellationSignal, ChatApiClient, ChatApiConfig, ChatApiError, ChatFinishReason, ChatMessage,
    ChatRequest, ChatStreamEvent, ChatTool, ChatToolCall,
};
use serde_json::Value;

/// Stable provider identifier used for explicit startup selection.
pub const CHAT_API_PROVIDER_ID: &str = "chat-api";

const DEFAULT_MODEL_ID: &str = "gpt-4o-mini";

/// Runtime configuration for the chat-completions provider.
#[derive(Clone)]
pub struct ChatApiProviderConfig {
    pub api_key: String,
    pub model_id: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ChatApiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatApiProviderConfig")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ChatApiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: model_id.into(),
            base_url: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_chat_api_config(self) -> ChatApiConfig {
        let mut config = ChatApiConfig::new(self.api_key);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

trait StreamClient: Send + Sync {
    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationSignal,
        on_event: &mut dyn FnMut(ChatStreamEvent),
    ) -> Result<Option<ChatFinishReason>, ChatApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: ChatApiClient,
}

impl StreamClient for DefaultStreamClient {
    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancellationSignal,
        on_event: &mut dyn FnMut(ChatStreamEvent),
    ) -> Result<Option<ChatFinishReason>, ChatApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| ChatApiError::StreamFailed {
                code: None,
                message: format!("failed to initialize tokio runtime: {error}"),
            })?;

        runtime.block_on(
            self.client
                .stream_with_handler(request, Some(cancel), |event| on_event(event)),
        )
    }
}

/// `ModelProvider` adapter backed by `chat_api` transport primitives.
pub struct ChatApiProvider {
    model_id: String,
    stream_client: Arc<dyn StreamClient>,
}

impl ChatApiProvider {
    /// Creates a provider using the real HTTP transport.
    pub fn new(config: ChatApiProviderConfig) -> Result<Self, ProviderError> {
        let model_id = sanitize_model_id(&config.model_id);
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Init(
                "an API key is required for the chat-api provider".to_string(),
            ));
        }
        let client = ChatApiClient::new(config.into_chat_api_config()).map_err(map_init_error)?;

        Ok(Self {
            model_id,
            stream_client: Arc::new(DefaultStreamClient { client }),
        })
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(model_id: &str, stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            model_id: sanitize_model_id(model_id),
            stream_client,
        }
    }
}

impl ModelProvider for ChatApiProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: CHAT_API_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn stream(&self, request: ModelRequest) -> Result<ResponseStream, ProviderError> {
        let chat_request = ChatRequest::new(self.model_id.clone(), to_chat_messages(&request.messages))
            .with_tools(request.tools.iter().map(to_chat_tool).collect());

        let (sender, receiver) = mpsc::channel();
        let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));
        let stream_client = Arc::clone(&self.stream_client);
        let worker_cancel = Arc::clone(&cancel);

        thread::Builder::new()
            .name("chat-api-stream".to_string())
            .spawn(move || run_stream(stream_client.as_ref(), &chat_request, &worker_cancel, &sender))
            .map_err(|error| ProviderError::Init(format!("failed to spawn stream thread: {error}")))?;

        Ok(Box::new(ChannelStream { receiver, cancel }))
    }
}

struct ChannelStream {
    receiver: Receiver<Result<ResponseChunk, ProviderError>>,
    cancel: CancellationSignal,
}

impl Iterator for ChannelStream {
    type Item = Result<ResponseChunk, ProviderError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl Drop for ChannelStream {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}

fn run_stream(
    stream_client: &dyn StreamClient,
    request: &ChatRequest,
    cancel: &CancellationSignal,
    sender: &Sender<Result<ResponseChunk, ProviderError>>,
) {
    let mut forward = |event: ChatStreamEvent| {
        if let Some(chunk) = map_event(event) {
            // A closed receiver means the consumer dropped the stream.
            if sender.send(Ok(chunk)).is_err() {
                cancel.store(true, Ordering::Release);
            }
        }
    };

    let outcome = stream_client.stream(request, cancel, &mut forward);
    let terminal = match outcome {
        Ok(Some(ChatFinishReason::ContentFilter)) => Some(ProviderError::Stream(
            "response was blocked by the provider's content filter".to_string(),
        )),
        Ok(Some(ChatFinishReason::Length)) => {
            tracing::warn!("model response was truncated at the output token limit");
            None
        }
        Ok(Some(_)) => None,
        Ok(None) => Some(ProviderError::Stream(
            "stream ended before the model finished its response".to_string(),
        )),
        Err(error) => Some(map_stream_error(error)),
    };

    if let Some(error) = terminal {
        let _ = sender.send(Err(error));
    }
}

fn map_event(event: ChatStreamEvent) -> Option<ResponseChunk> {
    match event {
        ChatStreamEvent::ContentDelta { delta } if !delta.is_empty() => {
            Some(ResponseChunk::TextDelta(delta))
        }
        ChatStreamEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments,
        } => Some(ResponseChunk::ToolCallFragment {
            index,
            call_id: id,
            tool_name: name,
            arguments_fragment: arguments,
        }),
        ChatStreamEvent::Usage {
            prompt_tokens,
            completion_tokens,
        } => Some(ResponseChunk::Usage(TokenUsage::new(
            prompt_tokens,
            completion_tokens,
        ))),
        _ => None,
    }
}

/// Converts provider-neutral history into chat wire messages.
///
/// Tool results whose requesting assistant message is no longer in the
/// history are sent as user text, and assistant tool calls without a
/// recorded result are dropped, so every tool id on the wire is paired.
fn to_chat_messages(messages: &[RunMessage]) -> Vec<ChatMessage> {
    let answered: HashSet<&str> = messages
        .iter()
        .filter_map(|message| match message {
            RunMessage::ToolResult { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
        .collect();

    let mut requested: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        match message {
            RunMessage::System { text } => out.push(ChatMessage::system(text.clone())),
            RunMessage::User { text } => out.push(ChatMessage::user(text.clone())),
            RunMessage::Assistant { text, tool_calls } => {
                let calls: Vec<ChatToolCall> = tool_calls
                    .iter()
                    .filter(|call| answered.contains(call.call_id.as_str()))
                    .map(|call| {
                        requested.insert(call.call_id.clone());
                        ChatToolCall::function(
                            call.call_id.clone(),
                            call.tool_name.clone(),
                            encode_arguments(&call.arguments),
                        )
                    })
                    .collect();
                out.push(ChatMessage::assistant(text.clone(), calls));
            }
            RunMessage::ToolResult {
                call_id,
                tool_name,
                content,
            } => {
                if requested.contains(call_id) {
                    out.push(ChatMessage::tool(call_id.clone(), content.clone()));
                } else {
                    out.push(ChatMessage::user(format!(
                        "Result of an earlier {tool_name} call:\n{content}"
                    )));
                }
            }
        }
    }

    out
}

fn encode_arguments(arguments: &serde_json::Map<String, Value>) -> String {
    if let (1, Some(Value::String(raw))) = (arguments.len(), arguments.get("_raw")) {
        return raw.clone();
    }
    Value::Object(arguments.clone()).to_string()
}

fn to_chat_tool(definition: &ToolDefinition) -> ChatTool {
    ChatTool::function(
        definition.name.clone(),
        definition.description.clone(),
        definition.parameters.clone(),
    )
}

fn sanitize_model_id(model_id: &str) -> String {
    let trimmed = model_id.trim();
    if trimmed.is_empty() {
        DEFAULT_MODEL_ID.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_init_error(error: ChatApiError) -> ProviderError {
    ProviderError::Init(format!("failed to initialize chat-api provider: {error}"))
}

fn map_stream_error(error: ChatApiError) -> ProviderError {
    match error {
        ChatApiError::Cancelled => ProviderError::Cancelled,
        ChatApiError::StreamFailed { .. } => ProviderError::Stream(error.to_string()),
        other => ProviderError::Request(other.to_string()),
    }
}
