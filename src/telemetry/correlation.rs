//! Correlation engine — joins agent decisions to the tool calls they produced.
//!
//! A call belongs to a decision when it shares the decision's agent and
//! session and its timestamp lies strictly within the window on either side
//! of the decision timestamp. Each decision with at least one related call
//! yields one [`CorrelationMetric`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::schema::CorrelationConfig;
use crate::store::{StoreError, TelemetryStore};
use crate::telemetry::model::{AgentDecision, CorrelationMetric, PatternType, ToolCall};

/// Default join window: one minute either side of the decision.
pub const DEFAULT_WINDOW_MS: i64 = 60_000;

/// Compute correlations for every decision that has related calls.
///
/// `computed_at` stamps each emitted record. Decisions without related calls
/// are skipped, so the output never holds more records than `decisions`.
pub fn correlate(
    decisions: &[AgentDecision],
    calls: &[ToolCall],
    window_ms: i64,
    computed_at: DateTime<Utc>,
) -> Vec<CorrelationMetric> {
    decisions
        .iter()
        .filter_map(|decision| correlate_one(decision, calls, window_ms, computed_at))
        .collect()
}

/// Correlate a single decision. `None` when no call falls inside the window.
pub fn correlate_one(
    decision: &AgentDecision,
    calls: &[ToolCall],
    window_ms: i64,
    computed_at: DateTime<Utc>,
) -> Option<CorrelationMetric> {
    let related = related_calls(decision, calls, window_ms);
    if related.is_empty() {
        return None;
    }

    let count = related.len() as f64;
    let avg_latency = related.iter().map(|c| c.latency()).sum::<f64>() / count;
    let successes = related.iter().filter(|c| c.is_success()).count() as f64;
    let success_rate = successes / count;

    Some(CorrelationMetric {
        agent_id: decision.agent_id.clone(),
        session_id: decision.session_id.clone(),
        decision_id: decision.id.clone(),
        tool_call_ids: related.iter().map(|c| c.id.clone()).collect(),
        correlation_strength: decision.confidence_score * success_rate,
        success_rate,
        avg_latency,
        pattern_type: PatternType::for_call_count(related.len()),
        timestamp: computed_at,
    })
}

/// Calls in the same agent/session within `window_ms` of the decision.
///
/// The bound is strict: a call exactly `window_ms` away is excluded.
pub fn related_calls<'a>(
    decision: &AgentDecision,
    calls: &'a [ToolCall],
    window_ms: i64,
) -> Vec<&'a ToolCall> {
    calls
        .iter()
        .filter(|c| c.agent_id == decision.agent_id && c.session_id == decision.session_id)
        .filter(|c| {
            let offset = (c.timestamp - decision.timestamp).num_milliseconds();
            offset.abs() < window_ms
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// How derived records are written back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace any earlier correlation for the same decision.
    Upsert,
    /// Always add a new record, even if one exists for the decision.
    Append,
}

impl WriteMode {
    pub fn from_dedupe(dedupe: bool) -> Self {
        if dedupe { Self::Upsert } else { Self::Append }
    }
}

/// Outcome of a persistence pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub written: usize,
    pub failed: usize,
}

/// Write each correlation through the store.
///
/// Writes are independent: a failed write is logged and counted, and the
/// remaining correlations are still written. Nothing is retried or rolled back.
/// Upserts go to the store as one batch.
pub fn persist_correlations(
    store: &dyn TelemetryStore,
    correlations: &[CorrelationMetric],
    mode: WriteMode,
) -> PersistReport {
    let mut report = PersistReport::default();
    if correlations.is_empty() {
        return report;
    }

    match mode {
        WriteMode::Upsert => match store.upsert_correlations(correlations) {
            Ok(results) => {
                for (correlation, result) in correlations.iter().zip(results) {
                    report.record(correlation, result);
                }
            }
            Err(e) => {
                warn!(
                    count = correlations.len(),
                    error = %e,
                    "failed to save correlation batch"
                );
                report.failed += correlations.len();
            }
        },
        WriteMode::Append => {
            for correlation in correlations {
                report.record(correlation, store.append_correlation(correlation));
            }
        }
    }

    debug!(
        written = report.written,
        failed = report.failed,
        "correlation pass persisted"
    );
    report
}

impl PersistReport {
    fn record(&mut self, correlation: &CorrelationMetric, result: Result<(), StoreError>) {
        match result {
            Ok(()) => self.written += 1,
            Err(e) => {
                warn!(
                    decision_id = %correlation.decision_id,
                    error = %e,
                    "failed to save correlation"
                );
                self.failed += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Full pass
// ---------------------------------------------------------------------------

/// Result of reading, correlating, and persisting in one go.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationPass {
    pub correlations: Vec<CorrelationMetric>,
    pub report: PersistReport,
}

/// Re-read calls and decisions, recompute every correlation, and write them back.
///
/// Only the initial reads can fail; individual write failures end up in the
/// report. With `dry_run` nothing is written.
pub fn run_pass(
    store: &dyn TelemetryStore,
    config: &CorrelationConfig,
    read_limit: usize,
    dry_run: bool,
) -> Result<CorrelationPass, StoreError> {
    let calls = store.load_calls(read_limit)?;
    let decisions = store.load_decisions(read_limit)?;
    let correlations = correlate(&decisions, &calls, config.window_ms, Utc::now());

    let report = if dry_run {
        PersistReport::default()
    } else {
        persist_correlations(store, &correlations, WriteMode::from_dedupe(config.dedupe))
    };

    Ok(CorrelationPass {
        correlations,
        report,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
