//! Metrics aggregator — summary statistics over a set of tool calls.
//!
//! - **Summary**: totals, success rate, average latency, active agents
//! - **Performance**: p95/p99 latency, error and timeout rates
//!
//! Everything here is a pure function of the calls passed in. Empty input
//! never fails: counters fall back to `0` and the performance readings fall
//! back to the `"-"` sentinel.

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::telemetry::model::{CallStatus, ToolCall};

/// Placeholder shown for a reading that has no data behind it.
pub const EMPTY_SENTINEL: &str = "-";

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Headline numbers for the dashboard status cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_calls: usize,
    /// Whole percent, `0..=100`.
    pub success_rate: u32,
    /// Mean latency in whole milliseconds.
    pub avg_latency: u64,
    pub active_agents: usize,
}

/// Compute the summary cards for a set of calls.
pub fn summarize(calls: &[ToolCall]) -> Summary {
    let total_calls = calls.len();
    if total_calls == 0 {
        return Summary::default();
    }

    let successes = count_status(calls, CallStatus::Success);
    let success_rate = (100.0 * successes as f64 / total_calls as f64).round() as u32;

    let total_latency: f64 = calls.iter().map(ToolCall::latency).sum();
    let avg_latency = (total_latency / total_calls as f64).round() as u64;

    let active_agents = calls
        .iter()
        .map(|c| c.agent_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    Summary {
        total_calls,
        success_rate,
        avg_latency,
        active_agents,
    }
}

// ---------------------------------------------------------------------------
// Performance readings
// ---------------------------------------------------------------------------

/// A number that may be missing because there was nothing to measure.
///
/// Serializes as the number itself, or as `"-"` when empty, so a consumer
/// can tell "no data" apart from a genuine `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Empty,
    Value(f64),
}

impl Reading {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Empty => None,
            Self::Value(v) => Some(v),
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str(EMPTY_SENTINEL),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_str(EMPTY_SENTINEL),
            Self::Value(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Latency percentiles and failure rates for the analytics panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Performance {
    pub p95_latency: Reading,
    pub p99_latency: Reading,
    /// Percent of calls with status `error`, one decimal place.
    pub error_rate: Reading,
    /// Percent of calls with status `timeout`, one decimal place.
    pub timeout_rate: Reading,
}

/// Compute the performance panel for a (usually filtered) set of calls.
pub fn performance(calls: &[ToolCall]) -> Performance {
    if calls.is_empty() {
        return Performance {
            p95_latency: Reading::Empty,
            p99_latency: Reading::Empty,
            error_rate: Reading::Empty,
            timeout_rate: Reading::Empty,
        };
    }

    let latencies = sorted_latencies(calls);

    Performance {
        p95_latency: percentile(&latencies, 95),
        p99_latency: percentile(&latencies, 99),
        error_rate: Reading::Value(status_rate(calls, CallStatus::Error)),
        timeout_rate: Reading::Value(status_rate(calls, CallStatus::Timeout)),
    }
}

/// Latencies of all calls in ascending order, missing values read as 0.
pub fn sorted_latencies(calls: &[ToolCall]) -> Vec<f64> {
    let mut latencies: Vec<f64> = calls.iter().map(ToolCall::latency).collect();
    latencies.sort_by(f64::total_cmp);
    latencies
}

/// Nearest-rank percentile over ascending-sorted values.
///
/// The index is `floor(len * pct / 100)` in integer arithmetic, clamped to
/// the last element. For 20 values and `pct = 95` that is index 19.
pub fn percentile(sorted: &[f64], pct: u32) -> Reading {
    if sorted.is_empty() {
        return Reading::Empty;
    }
    let index = (sorted.len() * pct as usize / 100).min(sorted.len() - 1);
    Reading::Value(sorted[index])
}

/// Percent of calls with the given status, rounded to one decimal place.
/// Returns 0.0 for an empty slice.
pub fn status_rate(calls: &[ToolCall], status: CallStatus) -> f64 {
    if calls.is_empty() {
        return 0.0;
    }
    let pct = 100.0 * count_status(calls, status) as f64 / calls.len() as f64;
    round_one_decimal(pct)
}

pub(crate) fn count_status(calls: &[ToolCall], status: CallStatus) -> usize {
    calls.iter().filter(|c| c.call_status == status).count()
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
