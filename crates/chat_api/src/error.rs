use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum ChatApiError {
    MissingApiKey,
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    MalformedSse(String),
    Serde(JsonError),
    QuotaExhausted {
        message: String,
    },
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    StreamFailed {
        code: Option<String>,
        message: String,
    },
    Cancelled,
}

impl ChatApiError {
    /// Whether the failure is worth a later retry by the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::RetryExhausted { .. } => true,
            Self::Status(status, _) => status.is_server_error(),
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

impl ErrorPayloadFields {
    pub fn quota_message(&self) -> Option<String> {
        let code = self
            .code
            .as_deref()
            .and_then(non_empty_string)
            .or_else(|| self.type_.as_deref().and_then(non_empty_string))
            .unwrap_or("");
        if !code.eq_ignore_ascii_case("insufficient_quota") {
            return None;
        }

        Some(format!("{QUOTA_MESSAGE_PREFIX}. Check the plan and billing details of the API key."))
    }

    pub fn message_or_fallback(&self) -> Option<String> {
        let explicit = self.message.as_deref().and_then(non_empty_string)?;
        Some(explicit.to_owned())
    }
}

pub(crate) const QUOTA_MESSAGE_PREFIX: &str = "You have exceeded your API quota";

impl fmt::Display for ChatApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::MalformedSse(message) => write!(f, "malformed SSE event: {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::QuotaExhausted { message } => write!(f, "{message}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                let last_error = last_error.as_deref().unwrap_or("none");
                write!(
                    f,
                    "retry exhausted after max attempts (status: {status}, last_error: {last_error})"
                )
            }
            Self::StreamFailed { code, message } => match code {
                Some(code) if !code.trim().is_empty() => {
                    write!(f, "stream failed ({code}): {message}")
                }
                _ => write!(f, "stream failed: {message}"),
            },
            Self::Cancelled => write!(f, "request was cancelled"),
        }
    }
}

impl std::error::Error for ChatApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::Serde(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for ChatApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extract a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(error) = parsed.value {
            if let Some(message) = error.quota_message() {
                return message;
            }
            if let Some(message) = error.message_or_fallback() {
                return message;
            }
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

pub(crate) fn is_quota_message(message: &str) -> bool {
    message.starts_with(QUOTA_MESSAGE_PREFIX)
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
