use agent_provider::{Role, ToolCallRequest};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionStoreError;

/// One persisted conversation message.
///
/// `role` is kept as its wire string so unknown values can be reported with
/// the record index instead of a generic parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotRecord {
    pub role: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl SnapshotRecord {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: content.into(),
            timestamp: timestamp.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallRequest>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    #[must_use]
    pub fn with_tool_result(
        mut self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self.tool_name = Some(tool_name.into());
        self
    }

    /// Parsed role. Records returned by `SessionStore::load` always have one.
    #[must_use]
    pub fn parsed_role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    /// Parsed timestamp. Records returned by `SessionStore::load` always have one.
    #[must_use]
    pub fn parsed_timestamp(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(&self.timestamp, &Rfc3339).ok()
    }
}

/// Current UTC time formatted as RFC3339.
pub fn now_rfc3339() -> Result<String, SessionStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::ClockFormat)
}
