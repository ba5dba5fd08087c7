//! Deterministic implementations of the shared `agent_provider` contract.
//!
//! This crate contains no transport/protocol logic. [`MockProvider`] streams a
//! canned reply for offline runs; [`ScriptedProvider`] replays scripted
//! responses (text, tool calls, usage, failures) for contract-level tests and
//! records every request it receives.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use agent_provider::{
    ModelProvider, ModelRequest, ProviderError, ProviderProfile, ResponseChunk, ResponseStream,
    RunMessage, TokenUsage,
};
use serde_json::{Map, Value};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// Offline provider that streams a fixed reply word by word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockProvider {
    chunks: Vec<String>,
    model_id: String,
}

impl MockProvider {
    #[must_use]
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            model_id: "mock".to_string(),
        }
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        if !model_id.trim().is_empty() {
            self.model_id = model_id.trim().to_string();
        }
        self
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(vec![
            "This is the offline mock provider.\n".to_string(),
            "It does not call a model or request tools, ".to_string(),
            "so use it to check the terminal flow and configuration.\n".to_string(),
            "Set DECKHAND_PROVIDER=chat-api and an API key for real runs.\n".to_string(),
        ])
    }
}

impl ModelProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn stream(&self, request: ModelRequest) -> Result<ResponseStream, ProviderError> {
        let mut chunks: Vec<Result<ResponseChunk, ProviderError>> = self
            .chunks
            .iter()
            .flat_map(|chunk| split_text_deltas(chunk))
            .map(Ok)
            .collect();

        let input_chars: usize = request.messages.iter().map(message_chars).sum();
        let output_chars: usize = self.chunks.iter().map(String::len).sum();
        chunks.push(Ok(ResponseChunk::Usage(TokenUsage::new(
            (input_chars / 4) as u64,
            (output_chars / 4) as u64,
        ))));

        Ok(Box::new(chunks.into_iter()))
    }
}

/// One scripted model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// Chunks streamed in order.
    Chunks(Vec<ResponseChunk>),
    /// The request itself fails before any chunk is produced.
    RequestFailure(String),
    /// The stream yields `chunks` and then fails mid-stream.
    StreamFailure {
        chunks: Vec<ResponseChunk>,
        error: String,
    },
}

impl ScriptedResponse {
    /// A plain text answer streamed as whitespace-delimited deltas.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::Chunks(split_text_deltas(text))
    }

    /// A response that requests a single tool call.
    #[must_use]
    pub fn tool_call(tool_name: &str, arguments: Value) -> Self {
        Self::tool_calls(vec![(tool_name, arguments)])
    }

    /// A response that requests several tool calls, in order.
    #[must_use]
    pub fn tool_calls(calls: Vec<(&str, Value)>) -> Self {
        let chunks = calls
            .into_iter()
            .enumerate()
            .map(|(index, (tool_name, arguments))| ResponseChunk::ToolCallFragment {
                index,
                call_id: Some(format!("scripted-call-{}", index + 1)),
                tool_name: Some(tool_name.to_string()),
                arguments_fragment: arguments.to_string(),
            })
            .collect();
        Self::Chunks(chunks)
    }

    /// Appends a usage report to a chunk response.
    #[must_use]
    pub fn with_usage(self, input: u64, output: u64) -> Self {
        match self {
            Self::Chunks(mut chunks) => {
                chunks.push(ResponseChunk::Usage(TokenUsage::new(input, output)));
                Self::Chunks(chunks)
            }
            other => other,
        }
    }
}

/// Provider that replays queued responses and records the requests it sees.
///
/// When the queue runs dry it answers with `fallback` text.
#[derive(Debug)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
    fallback: String,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            fallback: "Done.".to_string(),
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Queues another response behind the existing ones.
    pub fn push(&self, response: ScriptedResponse) {
        lock_unpoisoned(&self.responses).push_back(response);
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        lock_unpoisoned(&self.requests).len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        lock_unpoisoned(&self.responses).len()
    }
}

impl ModelProvider for ScriptedProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: "scripted".to_string(),
            model_id: "scripted-model".to_string(),
        }
    }

    fn stream(&self, request: ModelRequest) -> Result<ResponseStream, ProviderError> {
        lock_unpoisoned(&self.requests).push(request);

        let next = lock_unpoisoned(&self.responses).pop_front();
        let items: Vec<Result<ResponseChunk, ProviderError>> = match next {
            Some(ScriptedResponse::Chunks(chunks)) => chunks.into_iter().map(Ok).collect(),
            Some(ScriptedResponse::RequestFailure(error)) => {
                return Err(ProviderError::Request(error));
            }
            Some(ScriptedResponse::StreamFailure { chunks, error }) => chunks
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(ProviderError::Stream(error))))
                .collect(),
            None => split_text_deltas(&self.fallback)
                .into_iter()
                .map(Ok)
                .collect(),
        };

        Ok(Box::new(items.into_iter()))
    }
}

/// Builds a tool-call argument object from key/value pairs.
#[must_use]
pub fn arguments(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

fn split_text_deltas(text: &str) -> Vec<ResponseChunk> {
    let mut chunks = Vec::new();
    let mut pending_token = String::new();
    for ch in text.chars() {
        pending_token.push(ch);
        if matches!(ch, ' ' | '\n') {
            chunks.push(ResponseChunk::TextDelta(std::mem::take(&mut pending_token)));
        }
    }
    if !pending_token.is_empty() {
        chunks.push(ResponseChunk::TextDelta(pending_token));
    }
    chunks
}

fn message_chars(message: &RunMessage) -> usize {
    match message {
        RunMessage::System { text } | RunMessage::User { text } => text.len(),
        RunMessage::Assistant { text, .. } => text.len(),
        RunMessage::ToolResult { content, .. } => content.len(),
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
