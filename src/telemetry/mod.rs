//! Telemetry core: typed records, the metrics aggregator, the correlation
//! engine, the filter engine, and dashboard assembly.
//!
//! All functions here are pure transformations over snapshots supplied by
//! the caller. Only [`correlation::persist_correlations`] touches the store.

pub mod breakdown;
pub mod correlation;
pub mod dashboard;
pub mod filter;
pub mod metrics;
pub mod model;

pub use dashboard::{DashboardView, Snapshot};
pub use filter::CallFilter;
pub use model::{
    AgentDecision, CallStatus, CorrelationMetric, NewDecision, NewToolCall, PatternType, ToolCall,
    ValidationError,
};
