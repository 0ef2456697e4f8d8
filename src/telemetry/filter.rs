//! Filter engine for tool-call tables.
//!
//! Agent and tool predicates are case-insensitive substring matches; the
//! status predicate is an exact match. An unset predicate matches every call.

use serde::{Deserialize, Serialize};

use crate::telemetry::model::{CallStatus, ToolCall};

/// The active filter settings. Held by the caller, never by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallFilter {
    pub agent_id: Option<String>,
    pub tool_name: Option<String>,
    pub status: Option<CallStatus>,
}

impl CallFilter {
    /// Build a filter from raw user input. Blank strings mean "match all".
    pub fn new(agent_id: Option<&str>, tool_name: Option<&str>, status: Option<CallStatus>) -> Self {
        Self {
            agent_id: normalize(agent_id),
            tool_name: normalize(tool_name),
            status,
        }
    }

    /// Whether no predicate is set.
    pub fn is_empty(&self) -> bool {
        self.agent_id.is_none() && self.tool_name.is_none() && self.status.is_none()
    }

    /// Whether a single call satisfies every predicate.
    pub fn matches(&self, call: &ToolCall) -> bool {
        contains_ignore_case(&call.agent_id, self.agent_id.as_deref())
            && contains_ignore_case(&call.tool_name, self.tool_name.as_deref())
            && self.status.is_none_or(|s| call.call_status == s)
    }

    /// The subsequence of `calls` that satisfies the filter, order preserved.
    pub fn apply(&self, calls: &[ToolCall]) -> Vec<ToolCall> {
        calls.iter().filter(|c| self.matches(c)).cloned().collect()
    }
}

/// Lower-cases and trims a predicate; blank input becomes `None`.
fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
