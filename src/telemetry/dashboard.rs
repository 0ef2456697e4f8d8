//! Dashboard assembly — one view computed from an explicit snapshot.
//!
//! The caller owns both the snapshot and the active filter; nothing here
//! holds state between calls.

use serde::Serialize;

use crate::config::schema::DashboardConfig;
use crate::telemetry::breakdown::{
    self, AgentPerformance, CorrelationPoint, LatencyPoint, StatusDistribution, ToolReliability,
    ToolUsage,
};
use crate::telemetry::filter::CallFilter;
use crate::telemetry::metrics::{self, Performance, Summary};
use crate::telemetry::model::{AgentDecision, CorrelationMetric, ToolCall};

/// The three collections as read from the store at one moment.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub calls: Vec<ToolCall>,
    pub decisions: Vec<AgentDecision>,
    pub correlations: Vec<CorrelationMetric>,
}

/// Everything the dashboard page renders.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    /// Status cards, over all calls.
    pub summary: Summary,
    pub status_distribution: StatusDistribution,
    pub latency_series: Vec<LatencyPoint>,
    pub tool_usage: Vec<ToolUsage>,
    pub correlation_points: Vec<CorrelationPoint>,
    pub recent_activity: Vec<ToolCall>,
    pub recent_decisions: Vec<AgentDecision>,
    /// The filter that produced `calls` and `performance`.
    pub filter: CallFilter,
    /// Number of calls matching the filter before the row cap.
    pub filtered_total: usize,
    /// Newest filtered calls first, capped at `dashboard.table_rows`.
    pub calls: Vec<ToolCall>,
    /// Percentiles and rates, over filtered calls.
    pub performance: Performance,
    pub agent_performance: Vec<AgentPerformance>,
    pub tool_reliability: Vec<ToolReliability>,
    pub decision_count: usize,
    pub correlation_count: usize,
}

/// Build the dashboard view for a snapshot and filter.
pub fn build(snapshot: &Snapshot, filter: &CallFilter, limits: &DashboardConfig) -> DashboardView {
    let all = &snapshot.calls;
    let filtered = filter.apply(all);
    let filtered_total = filtered.len();
    let performance = metrics::performance(&filtered);

    let table = breakdown::recent_activity(&filtered, limits.table_rows);

    DashboardView {
        summary: metrics::summarize(all),
        status_distribution: breakdown::status_distribution(all),
        latency_series: breakdown::latency_series(all, limits.latency_points),
        tool_usage: breakdown::tool_usage(all, limits.top_tools),
        correlation_points: breakdown::correlation_points(&snapshot.correlations),
        recent_activity: breakdown::recent_activity(all, limits.recent_activity),
        recent_decisions: breakdown::recent_decisions(&snapshot.decisions, limits.recent_decisions),
        filter: filter.clone(),
        filtered_total,
        calls: table,
        performance,
        agent_performance: breakdown::agent_performance(all, limits.top_agents),
        tool_reliability: breakdown::tool_reliability(all, limits.top_reliability),
        decision_count: snapshot.decisions.len(),
        correlation_count: snapshot.correlations.len(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::telemetry::model::CallStatus;

    fn call(id: usize, status: CallStatus) -> ToolCall {
        ToolCall {
            id: format!("c{id}"),
            tool_name: "google:search".to_string(),
            call_status: status,
            latency_ms: Some(id as f64),
            agent_id: "a1".to_string(),
            session_id: "s1".to_string(),
            parameters: String::new(),
            error_message: String::new(),
            timestamp: Utc::now(),
            response_data: String::new(),
        }
    }

    #[test]
    fn summary_ignores_filter_but_table_respects_it() {
        let snapshot = Snapshot {
            calls: vec![
                call(1, CallStatus::Success),
                call(2, CallStatus::Failure),
                call(3, CallStatus::Success),
            ],
            ..Snapshot::default()
        };
        let filter = CallFilter::new(None, None, Some(CallStatus::Failure));
        let view = build(&snapshot, &filter, &DashboardConfig::default());

        assert_eq!(view.summary.total_calls, 3);
        assert_eq!(view.filtered_total, 1);
        assert_eq!(view.calls.len(), 1);
        assert_eq!(view.performance.p95_latency.value(), Some(2.0));
    }

    #[test]
    fn table_is_capped_at_configured_rows() {
        let snapshot = Snapshot {
            calls: (0..10).map(|i| call(i, CallStatus::Success)).collect(),
            ..Snapshot::default()
        };
        let limits = DashboardConfig {
            table_rows: 4,
            ..DashboardConfig::default()
        };
        let view = build(&snapshot, &CallFilter::default(), &limits);
        assert_eq!(view.filtered_total, 10);
        assert_eq!(view.calls.len(), 4);
    }

    #[test]
    fn table_keeps_newest_calls_first() {
        let base = Utc::now();
        let snapshot = Snapshot {
            calls: (0..10)
                .map(|i| ToolCall {
                    timestamp: base + Duration::seconds(i as i64),
                    ..call(i, CallStatus::Success)
                })
                .collect(),
            ..Snapshot::default()
        };
        let limits = DashboardConfig {
            table_rows: 3,
            ..DashboardConfig::default()
        };
        let view = build(&snapshot, &CallFilter::default(), &limits);
        let ids: Vec<&str> = view.calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c9", "c8", "c7"]);
    }

    #[test]
    fn recent_decisions_are_capped_newest_first() {
        let base = Utc::now();
        let snapshot = Snapshot {
            decisions: (0..8)
                .map(|i| AgentDecision {
                    id: format!("d{i}"),
                    agent_id: "a1".to_string(),
                    session_id: "s1".to_string(),
                    decision_type: "tool_selection".to_string(),
                    decision_context: String::new(),
                    chosen_action: "search".to_string(),
                    confidence_score: 0.9,
                    outcome_success: i % 2 == 0,
                    timestamp: base + Duration::seconds(i),
                    related_tool_calls: Vec::new(),
                })
                .collect(),
            ..Snapshot::default()
        };
        let view = build(&snapshot, &CallFilter::default(), &DashboardConfig::default());
        assert_eq!(view.decision_count, 8);
        let ids: Vec<&str> = view.recent_decisions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d7", "d6", "d5", "d4", "d3"]);
    }

    #[test]
    fn empty_snapshot_yields_sentinels() {
        let view = build(&Snapshot::default(), &CallFilter::default(), &DashboardConfig::default());
        assert_eq!(view.summary.total_calls, 0);
        assert!(view.performance.error_rate.is_empty());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["performance"]["p95_latency"], "-");
    }
}
