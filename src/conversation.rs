use agent_provider::{Role, RunMessage, TokenUsage, ToolCallRequest};
use session_store::{SessionStoreError, SnapshotRecord};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::config::MIN_MAX_HISTORY;

/// Leading messages that survive trimming: the system prompt and the
/// earliest grounding context.
const PINNED_MESSAGES: usize = 2;
const CHARS_PER_TOKEN: u64 = 4;

/// One conversation entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: OffsetDateTime,
    /// Calls requested by an assistant message.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Set on tool-result messages.
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn to_run_message(&self) -> RunMessage {
        match self.role {
            Role::System => RunMessage::System {
                text: self.content.clone(),
            },
            Role::User => RunMessage::User {
                text: self.content.clone(),
            },
            Role::Assistant => RunMessage::Assistant {
                text: self.content.clone(),
                tool_calls: self.tool_calls.clone(),
            },
            Role::Tool => RunMessage::ToolResult {
                call_id: self.tool_call_id.clone().unwrap_or_default(),
                tool_name: self.tool_name.clone().unwrap_or_default(),
                content: self.content.clone(),
            },
        }
    }

    pub fn to_record(&self) -> Result<SnapshotRecord, SessionStoreError> {
        let timestamp = self
            .timestamp
            .format(&Rfc3339)
            .map_err(SessionStoreError::ClockFormat)?;
        let mut record = SnapshotRecord::new(self.role, self.content.clone(), timestamp)
            .with_tool_calls(self.tool_calls.clone());
        if let (Some(call_id), Some(tool_name)) = (&self.tool_call_id, &self.tool_name) {
            record = record.with_tool_result(call_id.clone(), tool_name.clone());
        }
        Ok(record)
    }

    /// `None` for records that did not pass `SessionStore::load` validation.
    pub fn from_record(record: &SnapshotRecord) -> Option<Self> {
        Some(Self {
            role: record.parsed_role()?,
            content: record.content.clone(),
            timestamp: record.parsed_timestamp()?,
            tool_calls: record.tool_calls.clone(),
            tool_call_id: record.tool_call_id.clone(),
            tool_name: record.tool_name.clone(),
        })
    }

    fn char_count(&self) -> u64 {
        let arguments: usize = self
            .tool_calls
            .iter()
            .map(|call| {
                let arguments = serde_json::Value::Object(call.arguments.clone()).to_string();
                call.tool_name.len() + arguments.len()
            })
            .sum();
        u64::try_from(self.content.chars().count() + arguments).unwrap_or(u64::MAX)
    }
}

/// Ordered message log bounded by `max_messages`, plus the session's token
/// usage.
///
/// Whenever the log grows past its bound, the first two messages are kept and
/// everything between them and the most recent `max_messages - 2` messages is
/// discarded. No summarization happens.
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<Message>,
    max_messages: usize,
    usage: TokenUsage,
}

impl ConversationState {
    /// `max_messages` below the minimum is raised to it.
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: max_messages.max(MIN_MAX_HISTORY),
            usage: TokenUsage::default(),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends `message` and trims. Returns how many messages were dropped.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.trim()
    }

    pub fn trim(&mut self) -> usize {
        let len = self.messages.len();
        if len <= self.max_messages {
            return 0;
        }
        let keep_recent = self.max_messages - PINNED_MESSAGES;
        let drop_end = len - keep_recent;
        self.messages.drain(PINNED_MESSAGES..drop_end);
        let dropped = drop_end - PINNED_MESSAGES;
        tracing::debug!(dropped, kept = self.messages.len(), "conversation trimmed");
        dropped
    }

    /// The last `limit` messages, oldest first.
    pub fn recent_context(&self, limit: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    /// Rough context size: characters divided by four.
    pub fn estimate_tokens(&self) -> u64 {
        self.messages.iter().map(Message::char_count).sum::<u64>() / CHARS_PER_TOKEN
    }

    pub fn record_usage(&mut self, usage: TokenUsage) {
        self.usage.accumulate(usage);
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Drops everything except a leading system prompt. Usage is kept.
    pub fn clear(&mut self) {
        let keep = usize::from(
            self.messages
                .first()
                .is_some_and(|message| message.role == Role::System),
        );
        self.messages.truncate(keep);
    }

    /// Replaces the log, e.g. with a restored snapshot, and trims it.
    pub fn restore(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.trim();
    }

    pub fn to_run_messages(&self) -> Vec<RunMessage> {
        self.messages.iter().map(Message::to_run_message).collect()
    }

    pub fn to_records(&self) -> Result<Vec<SnapshotRecord>, SessionStoreError> {
        self.messages.iter().map(Message::to_record).collect()
    }
}
