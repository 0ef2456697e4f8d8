//! Typed telemetry records.
//!
//! Three record kinds live in the store:
//! - [`ToolCall`] — one tool invocation by an agent
//! - [`AgentDecision`] — one agent choice, with a confidence score
//! - [`CorrelationMetric`] — derived, links a decision to the calls it produced
//!
//! Submissions arrive as drafts ([`NewToolCall`], [`NewDecision`]) without an
//! id; the store assigns one when the record is appended.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Call status
// ---------------------------------------------------------------------------

/// Outcome of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Success,
    Failure,
    Timeout,
    Error,
}

impl CallStatus {
    /// All statuses, in dashboard display order.
    pub const ALL: [CallStatus; 4] = [
        CallStatus::Success,
        CallStatus::Failure,
        CallStatus::Timeout,
        CallStatus::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "timeout" => Ok(Self::Timeout),
            "error" => Ok(Self::Error),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern type
// ---------------------------------------------------------------------------

/// Shape of the calls attached to a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Exactly one related call.
    Single,
    /// More than one related call.
    Sequential,
}

impl PatternType {
    pub fn for_call_count(count: usize) -> Self {
        if count > 1 {
            Self::Sequential
        } else {
            Self::Single
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Sequential => f.write_str("sequential"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// A logged tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub call_status: CallStatus,
    /// Call latency in milliseconds. Absent in some records; read as 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    pub agent_id: String,
    pub session_id: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub response_data: String,
}

impl ToolCall {
    /// Latency with the missing-field default applied.
    pub fn latency(&self) -> f64 {
        self.latency_ms.unwrap_or(0.0)
    }

    pub fn is_success(&self) -> bool {
        self.call_status == CallStatus::Success
    }
}

/// A logged agent decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    pub id: String,
    pub agent_id: String,
    pub session_id: String,
    #[serde(default)]
    pub decision_type: String,
    #[serde(default)]
    pub decision_context: String,
    #[serde(default)]
    pub chosen_action: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub outcome_success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub related_tool_calls: Vec<String>,
}

/// A decision joined to the calls it produced.
///
/// `tool_call_ids` is never empty, and `pattern_type` is
/// [`PatternType::Sequential`] exactly when it holds more than one id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMetric {
    pub agent_id: String,
    pub session_id: String,
    pub decision_id: String,
    pub tool_call_ids: Vec<String>,
    pub correlation_strength: f64,
    pub success_rate: f64,
    pub avg_latency: f64,
    pub pattern_type: PatternType,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Submission drafts
// ---------------------------------------------------------------------------

/// A tool call as submitted, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewToolCall {
    pub tool_name: String,
    pub call_status: CallStatus,
    #[serde(default)]
    pub latency_ms: Option<f64>,
    pub agent_id: String,
    pub session_id: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_data: String,
}

impl NewToolCall {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("tool_name", &self.tool_name)?;
        require_non_empty("agent_id", &self.agent_id)?;
        require_non_empty("session_id", &self.session_id)?;
        if let Some(latency) = self.latency_ms
            && (!latency.is_finite() || latency < 0.0)
        {
            return Err(ValidationError::NegativeLatency(latency));
        }
        Ok(())
    }

    /// Turn the draft into a stored record.
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> ToolCall {
        ToolCall {
            id,
            tool_name: self.tool_name,
            call_status: self.call_status,
            latency_ms: self.latency_ms,
            agent_id: self.agent_id,
            session_id: self.session_id,
            parameters: self.parameters,
            error_message: self.error_message,
            timestamp: self.timestamp.unwrap_or(now),
            response_data: self.response_data,
        }
    }
}

/// An agent decision as submitted, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDecision {
    pub agent_id: String,
    pub session_id: String,
    #[serde(default)]
    pub decision_type: String,
    #[serde(default)]
    pub decision_context: String,
    #[serde(default)]
    pub chosen_action: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub outcome_success: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_tool_calls: Vec<String>,
}

impl NewDecision {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("agent_id", &self.agent_id)?;
        require_non_empty("session_id", &self.session_id)?;
        let score = self.confidence_score;
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ValidationError::ConfidenceOutOfRange(score));
        }
        Ok(())
    }

    pub fn into_record(self, id: String, now: DateTime<Utc>) -> AgentDecision {
        AgentDecision {
            id,
            agent_id: self.agent_id,
            session_id: self.session_id,
            decision_type: self.decision_type,
            decision_context: self.decision_context,
            chosen_action: self.chosen_action,
            confidence_score: self.confidence_score,
            outcome_success: self.outcome_success,
            timestamp: self.timestamp.unwrap_or(now),
            related_tool_calls: self.related_tool_calls,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reasons a submitted draft is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("latency_ms must be a non-negative number, got {0}")]
    NegativeLatency(f64),

    #[error("confidence_score must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("unknown call status `{0}` (expected success, failure, timeout or error)")]
    UnknownStatus(String),
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_call() -> NewToolCall {
        NewToolCall {
            tool_name: "google:search".to_string(),
            call_status: CallStatus::Success,
            latency_ms: Some(120.0),
            agent_id: "agent-1".to_string(),
            session_id: "s1".to_string(),
            parameters: String::new(),
            error_message: String::new(),
            timestamp: None,
            response_data: String::new(),
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("SUCCESS".parse::<CallStatus>(), Ok(CallStatus::Success));
        assert_eq!(" timeout ".parse::<CallStatus>(), Ok(CallStatus::Timeout));
        assert!("pending".parse::<CallStatus>().is_err());
    }

    #[test]
    fn pattern_type_follows_call_count() {
        assert_eq!(PatternType::for_call_count(1), PatternType::Single);
        assert_eq!(PatternType::for_call_count(2), PatternType::Sequential);
    }

    #[test]
    fn missing_latency_reads_as_zero() {
        let json = r#"{
            "id": "c1", "tool_name": "jira:update", "call_status": "failure",
            "agent_id": "a1", "session_id": "s1",
            "timestamp": "2025-01-15T10:00:00Z"
        }"#;
        let call: ToolCall = serde_json::from_str(json).unwrap();
        assert_eq!(call.latency_ms, None);
        assert_eq!(call.latency(), 0.0);
        assert!(call.parameters.is_empty());
    }

    #[test]
    fn call_draft_rejects_empty_tool_and_negative_latency() {
        let mut draft = draft_call();
        draft.tool_name = "  ".to_string();
        assert_eq!(draft.validate(), Err(ValidationError::EmptyField("tool_name")));

        let mut draft = draft_call();
        draft.latency_ms = Some(-1.0);
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::NegativeLatency(_))
        ));

        assert!(draft_call().validate().is_ok());
    }

    #[test]
    fn decision_draft_rejects_out_of_range_confidence() {
        let draft = NewDecision {
            agent_id: "a1".to_string(),
            session_id: "s1".to_string(),
            decision_type: "tool_selection".to_string(),
            decision_context: String::new(),
            chosen_action: "google:search".to_string(),
            confidence_score: 1.5,
            outcome_success: true,
            timestamp: None,
            related_tool_calls: Vec::new(),
        };
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::ConfidenceOutOfRange(_))
        ));
    }

    #[test]
    fn into_record_fills_timestamp_when_absent() {
        let now = Utc::now();
        let call = draft_call().into_record("id-1".to_string(), now);
        assert_eq!(call.id, "id-1");
        assert_eq!(call.timestamp, now);
    }

    #[test]
    fn correlation_serializes_pattern_lowercase() {
        let metric = CorrelationMetric {
            agent_id: "a1".to_string(),
            session_id: "s1".to_string(),
            decision_id: "d1".to_string(),
            tool_call_ids: vec!["c1".to_string(), "c2".to_string()],
            correlation_strength: 0.4,
            success_rate: 0.5,
            avg_latency: 200.0,
            pattern_type: PatternType::Sequential,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&metric).unwrap();
        assert!(json.contains("\"pattern_type\":\"sequential\""));
    }
}
