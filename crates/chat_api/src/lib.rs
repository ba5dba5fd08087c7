//! Transport-only client for OpenAI-compatible `/chat/completions` endpoints.
//!
//! This crate owns request building, streaming SSE parsing, retry/backoff and
//! error mapping. It knows nothing about tools, sandboxes or terminals; the
//! `agent_provider_chat_api` crate adapts it to the provider contract.
//!
//! Streamed tool calls arrive as [`ChatStreamEvent::ToolCallDelta`] fragments
//! keyed by index. Callers are expected to assemble them.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::{CancellationSignal, ChatApiClient, StreamResult};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::{ChatFinishReason, ChatStreamEvent};
pub use payload::{ChatMessage, ChatRequest, ChatTool, ChatToolCall};
pub use sse::SseStreamParser;
pub use url::normalize_chat_url;
