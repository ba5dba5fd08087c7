use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};

use crate::config::ChatApiConfig;
use crate::error::{is_quota_message, parse_error_message, ChatApiError};
use crate::events::{ChatFinishReason, ChatStreamEvent};
use crate::headers::build_headers;
use crate::payload::{ChatRequest, StreamOptions};
use crate::retry::{is_retryable_http_error, retry_delay_ms, MAX_RETRIES};
use crate::sse::SseStreamParser;
use crate::url::normalize_chat_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub events: Vec<ChatStreamEvent>,
    pub finish_reason: Option<ChatFinishReason>,
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_chat_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ChatApiError> {
        let headers = build_headers(&self.config, None)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ChatApiError::InvalidHeader(format!("invalid key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| ChatApiError::InvalidHeader(format!("invalid value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        let headers = self.build_headers()?;
        let payload = request_with_transport_defaults(request);
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(&payload))
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        match self.config.retry_base_delay {
            Some(base) => base.saturating_mul(2u32.saturating_pow(attempt.min(30))),
            None => retry_delay_ms(attempt),
        }
    }

    pub async fn send_with_retry(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ChatApiError> {
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }

            let response = self.build_request(request)?.send();
            let response = await_or_cancel(response, cancellation)
                .await?
                .map_err(ChatApiError::from);

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    last_status = Some(status);
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_default();
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if is_quota_message(&message) {
                        return Err(ChatApiError::QuotaExhausted { message });
                    }

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        tracing::debug!(
                            status = status.as_u16(),
                            attempt,
                            "retrying chat completion request"
                        );
                        await_or_cancel(tokio::time::sleep(self.retry_delay(attempt)), cancellation)
                            .await?;
                        continue;
                    }

                    return Err(ChatApiError::Status(status, message));
                }
                Err(error) => {
                    let message = error.to_string();
                    last_error = Some(message);
                    if attempt < MAX_RETRIES {
                        tracing::debug!(attempt, "retrying chat completion after transport error");
                        await_or_cancel(tokio::time::sleep(self.retry_delay(attempt)), cancellation)
                            .await?;
                        continue;
                    }
                    return Err(ChatApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(ChatApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    /// Streams one completion, handing each normalized event to `on_event`.
    ///
    /// Returns the last finish reason seen. An in-stream error event aborts
    /// the stream with [`ChatApiError::StreamFailed`].
    pub async fn stream_with_handler<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<Option<ChatFinishReason>, ChatApiError>
    where
        F: FnMut(ChatStreamEvent),
    {
        let response = self.send_with_retry(request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = SseStreamParser::default();
        let mut finish_reason = None;

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            let chunk = chunk.map_err(ChatApiError::from)?;
            for event in parser.feed(&chunk) {
                process_stream_event(event, &mut finish_reason, &mut on_event)?;
            }
            if parser.is_done() {
                break;
            }
        }

        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        Ok(finish_reason)
    }

    pub async fn stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, ChatApiError> {
        let mut events = Vec::new();
        let finish_reason = self
            .stream_with_handler(request, cancellation, |event| {
                events.push(event);
            })
            .await?;

        Ok(StreamResult {
            events,
            finish_reason,
        })
    }
}

fn request_with_transport_defaults(request: &ChatRequest) -> ChatRequest {
    let mut payload = request.clone();
    payload.stream = true;
    payload.stream_options = Some(StreamOptions {
        include_usage: true,
    });
    if payload.tools.is_empty() {
        payload.tool_choice = None;
    } else if payload.tool_choice.is_none() {
        payload.tool_choice = Some("auto".to_owned());
    }
    payload
}

fn process_stream_event<F>(
    event: ChatStreamEvent,
    finish_reason: &mut Option<ChatFinishReason>,
    on_event: &mut F,
) -> Result<(), ChatApiError>
where
    F: FnMut(ChatStreamEvent),
{
    if let ChatStreamEvent::Error { code, message } = &event {
        return Err(ChatApiError::StreamFailed {
            code: code.clone(),
            message: message
                .clone()
                .or_else(|| code.clone())
                .unwrap_or_else(|| "unknown stream error".to_owned()),
        });
    }

    if let ChatStreamEvent::Finished {
        reason: Some(reason),
    } = &event
    {
        *finish_reason = Some(*reason);
    }

    on_event(event);
    Ok(())
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
