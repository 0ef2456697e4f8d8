//! Per-status, per-tool and per-agent breakdowns for the dashboard panels.

use std::collections::HashMap;

use serde::Serialize;

use crate::telemetry::metrics::round_one_decimal;
use crate::telemetry::model::{AgentDecision, CallStatus, CorrelationMetric, ToolCall};

// ---------------------------------------------------------------------------
// Status distribution
// ---------------------------------------------------------------------------

/// Call counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusDistribution {
    pub success: usize,
    pub failure: usize,
    pub timeout: usize,
    pub error: usize,
}

impl StatusDistribution {
    pub fn total(&self) -> usize {
        self.success + self.failure + self.timeout + self.error
    }

    pub fn count(&self, status: CallStatus) -> usize {
        match status {
            CallStatus::Success => self.success,
            CallStatus::Failure => self.failure,
            CallStatus::Timeout => self.timeout,
            CallStatus::Error => self.error,
        }
    }
}

pub fn status_distribution(calls: &[ToolCall]) -> StatusDistribution {
    let mut dist = StatusDistribution::default();
    for call in calls {
        match call.call_status {
            CallStatus::Success => dist.success += 1,
            CallStatus::Failure => dist.failure += 1,
            CallStatus::Timeout => dist.timeout += 1,
            CallStatus::Error => dist.error += 1,
        }
    }
    dist
}

// ---------------------------------------------------------------------------
// Latency series
// ---------------------------------------------------------------------------

/// One point on the latency trend line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyPoint {
    pub label: String,
    pub latency_ms: f64,
}

/// Latencies of the `limit` most recent calls, oldest first.
pub fn latency_series(calls: &[ToolCall], limit: usize) -> Vec<LatencyPoint> {
    let mut by_time: Vec<&ToolCall> = calls.iter().collect();
    by_time.sort_by_key(|c| c.timestamp);
    let skip = by_time.len().saturating_sub(limit);

    by_time
        .into_iter()
        .skip(skip)
        .enumerate()
        .map(|(i, call)| LatencyPoint {
            label: format!("Call {}", i + 1),
            latency_ms: call.latency(),
        })
        .collect()
}

/// The `limit` newest calls, newest first.
pub fn recent_activity(calls: &[ToolCall], limit: usize) -> Vec<ToolCall> {
    let mut by_time: Vec<&ToolCall> = calls.iter().collect();
    by_time.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    by_time.into_iter().take(limit).cloned().collect()
}

/// The `limit` newest decisions, newest first.
pub fn recent_decisions(decisions: &[AgentDecision], limit: usize) -> Vec<AgentDecision> {
    let mut by_time: Vec<&AgentDecision> = decisions.iter().collect();
    by_time.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    by_time.into_iter().take(limit).cloned().collect()
}

// ---------------------------------------------------------------------------
// Tool usage and reliability
// ---------------------------------------------------------------------------

/// Number of calls made to one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolUsage {
    pub tool_name: String,
    pub count: usize,
}

/// Most-used tools, descending by call count (ties by name).
pub fn tool_usage(calls: &[ToolCall], limit: usize) -> Vec<ToolUsage> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for call in calls {
        *counts.entry(&call.tool_name).or_default() += 1;
    }

    let mut usage: Vec<ToolUsage> = counts
        .into_iter()
        .map(|(tool, count)| ToolUsage {
            tool_name: tool.to_string(),
            count,
        })
        .collect();
    usage.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tool_name.cmp(&b.tool_name)));
    usage.truncate(limit);
    usage
}

/// Success ratio for one tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolReliability {
    pub tool_name: String,
    pub total: usize,
    pub successful: usize,
    /// Percent, one decimal place.
    pub reliability: f64,
}

/// Most reliable tools first.
pub fn tool_reliability(calls: &[ToolCall], limit: usize) -> Vec<ToolReliability> {
    let mut groups: HashMap<&str, (usize, usize)> = HashMap::new();
    for call in calls {
        let entry = groups.entry(&call.tool_name).or_default();
        entry.0 += 1;
        if call.is_success() {
            entry.1 += 1;
        }
    }

    let mut out: Vec<ToolReliability> = groups
        .into_iter()
        .map(|(tool, (total, successful))| ToolReliability {
            tool_name: tool.to_string(),
            total,
            successful,
            reliability: percent(successful, total),
        })
        .collect();
    out.sort_by(|a, b| {
        b.reliability
            .total_cmp(&a.reliability)
            .then_with(|| a.tool_name.cmp(&b.tool_name))
    });
    out.truncate(limit);
    out
}

// ---------------------------------------------------------------------------
// Agent performance
// ---------------------------------------------------------------------------

/// Aggregate outcome of all calls made by one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPerformance {
    pub agent_id: String,
    pub total: usize,
    pub successful: usize,
    /// Percent, one decimal place.
    pub success_rate: f64,
    /// Whole milliseconds.
    pub avg_latency: u64,
}

/// Best-performing agents first, by success rate.
pub fn agent_performance(calls: &[ToolCall], limit: usize) -> Vec<AgentPerformance> {
    #[derive(Default)]
    struct Acc {
        total: usize,
        successful: usize,
        latency: f64,
    }

    let mut groups: HashMap<&str, Acc> = HashMap::new();
    for call in calls {
        let acc = groups.entry(&call.agent_id).or_default();
        acc.total += 1;
        if call.is_success() {
            acc.successful += 1;
        }
        acc.latency += call.latency();
    }

    let mut out: Vec<AgentPerformance> = groups
        .into_iter()
        .map(|(agent, acc)| AgentPerformance {
            agent_id: agent.to_string(),
            total: acc.total,
            successful: acc.successful,
            success_rate: percent(acc.successful, acc.total),
            avg_latency: (acc.latency / acc.total as f64).round() as u64,
        })
        .collect();
    out.sort_by(|a, b| {
        b.success_rate
            .total_cmp(&a.success_rate)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
    out.truncate(limit);
    out
}

// ---------------------------------------------------------------------------
// Correlation scatter
// ---------------------------------------------------------------------------

/// One point on the confidence-vs-success scatter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationPoint {
    pub x: f64,
    pub y: f64,
}

/// `(correlation_strength, success_rate)` pairs.
pub fn correlation_points(correlations: &[CorrelationMetric]) -> Vec<CorrelationPoint> {
    correlations
        .iter()
        .map(|c| CorrelationPoint {
            x: c.correlation_strength,
            y: c.success_rate,
        })
        .collect()
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_one_decimal(100.0 * part as f64 / total as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn call(id: usize, agent: &str, tool: &str, status: CallStatus, latency: f64) -> ToolCall {
        ToolCall {
            id: format!("c{id}"),
            tool_name: tool.to_string(),
            call_status: status,
            latency_ms: Some(latency),
            agent_id: agent.to_string(),
            session_id: "s1".to_string(),
            parameters: String::new(),
            error_message: String::new(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
                + Duration::seconds(id as i64),
            response_data: String::new(),
        }
    }

    fn sample() -> Vec<ToolCall> {
        vec![
            call(1, "a1", "google:search", CallStatus::Success, 100.0),
            call(2, "a1", "google:search", CallStatus::Failure, 200.0),
            call(3, "a2", "jira:update", CallStatus::Success, 50.0),
            call(4, "a2", "calendar:create", CallStatus::Timeout, 900.0),
            call(5, "a3", "google:search", CallStatus::Error, 10.0),
        ]
    }

    #[test]
    fn distribution_counts_each_status() {
        let dist = status_distribution(&sample());
        assert_eq!(dist.success, 2);
        assert_eq!(dist.failure, 1);
        assert_eq!(dist.timeout, 1);
        assert_eq!(dist.error, 1);
        assert_eq!(dist.total(), 5);
    }

    #[test]
    fn latency_series_keeps_newest_in_time_order() {
        let mut calls = sample();
        calls.reverse();
        let series = latency_series(&calls, 2);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "Call 1");
        assert_eq!(series[0].latency_ms, 900.0);
        assert_eq!(series[1].latency_ms, 10.0);
    }

    #[test]
    fn recent_activity_is_newest_first() {
        let recent = recent_activity(&sample(), 3);
        let ids: Vec<&str> = recent.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c5", "c4", "c3"]);
    }

    #[test]
    fn recent_decisions_is_newest_first() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let decisions: Vec<AgentDecision> = [3, 1, 2]
            .into_iter()
            .map(|i| AgentDecision {
                id: format!("d{i}"),
                agent_id: "a1".to_string(),
                session_id: "s1".to_string(),
                decision_type: "tool_selection".to_string(),
                decision_context: String::new(),
                chosen_action: "search".to_string(),
                confidence_score: 0.5,
                outcome_success: true,
                timestamp: base + Duration::seconds(i),
                related_tool_calls: Vec::new(),
            })
            .collect();

        let recent = recent_decisions(&decisions, 2);
        let ids: Vec<&str> = recent.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d3", "d2"]);
    }

    #[test]
    fn tool_usage_sorted_by_count() {
        let usage = tool_usage(&sample(), 2);
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].tool_name, "google:search");
        assert_eq!(usage[0].count, 3);
        // calendar:create and jira:update tie at 1; name order wins
        assert_eq!(usage[1].tool_name, "calendar:create");
    }

    #[test]
    fn agent_performance_ranks_by_success_rate() {
        let perf = agent_performance(&sample(), 5);
        assert_eq!(perf.len(), 3);
        assert_eq!(perf[0].agent_id, "a1");
        assert_eq!(perf[0].success_rate, 50.0);
        assert_eq!(perf[0].avg_latency, 150);
        assert_eq!(perf[2].agent_id, "a3");
        assert_eq!(perf[2].success_rate, 0.0);
    }

    #[test]
    fn tool_reliability_ranks_most_reliable_first() {
        let rel = tool_reliability(&sample(), 5);
        assert_eq!(rel[0].tool_name, "jira:update");
        assert_eq!(rel[0].reliability, 100.0);
        let search = rel.iter().find(|r| r.tool_name == "google:search").unwrap();
        assert_eq!(search.total, 3);
        assert_eq!(search.reliability, 33.3);
    }
}
