//! Persistence for telemetry records.
//!
//! [`TelemetryStore`] is the seam between the pure telemetry core and
//! wherever records actually live. The shipped implementation is
//! [`JsonlStore`], one JSON object per line per table:
//!
//! ```text
//! <data_dir>/tool_calls.jsonl
//! <data_dir>/agent_decisions.jsonl
//! <data_dir>/correlation_metrics.jsonl
//! ```

mod jsonl;

use std::path::PathBuf;

use thiserror::Error;

use crate::telemetry::dashboard::Snapshot;
use crate::telemetry::model::{
    AgentDecision, CorrelationMetric, NewDecision, NewToolCall, ToolCall, ValidationError,
};

pub use jsonl::{JsonlStore, Table};

/// Store-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine a data directory (no home directory and no store.data_dir)")]
    NoDataDir,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),
}

/// Read and write access to the three telemetry tables.
///
/// Reads return at most `limit` records, the most recent ones. Records that
/// cannot be parsed are skipped rather than failing the read.
pub trait TelemetryStore {
    fn load_calls(&self, limit: usize) -> Result<Vec<ToolCall>, StoreError>;

    fn load_decisions(&self, limit: usize) -> Result<Vec<AgentDecision>, StoreError>;

    fn load_correlations(&self, limit: usize) -> Result<Vec<CorrelationMetric>, StoreError>;

    /// Validate a draft, assign it an id, and append it.
    fn append_call(&self, draft: NewToolCall) -> Result<ToolCall, StoreError>;

    /// Validate a draft, assign it an id, and append it.
    fn append_decision(&self, draft: NewDecision) -> Result<AgentDecision, StoreError>;

    /// Append a derived record unconditionally.
    fn append_correlation(&self, correlation: &CorrelationMetric) -> Result<(), StoreError>;

    /// Insert a derived record, replacing any earlier one for the same decision.
    fn upsert_correlation(&self, correlation: &CorrelationMetric) -> Result<(), StoreError>;

    /// Upsert a batch of derived records.
    ///
    /// The outer error means nothing in the batch was written; the inner
    /// results line up with `batch`. Later entries for the same decision win.
    fn upsert_correlations(
        &self,
        batch: &[CorrelationMetric],
    ) -> Result<Vec<Result<(), StoreError>>, StoreError> {
        Ok(batch.iter().map(|c| self.upsert_correlation(c)).collect())
    }

    /// Read all three tables.
    fn snapshot(&self, limit: usize) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            calls: self.load_calls(limit)?,
            decisions: self.load_decisions(limit)?,
            correlations: self.load_correlations(limit)?,
        })
    }
}
