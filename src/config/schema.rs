/// Configuration schema and defaults for telemetry-hub.
///
/// Defines the TOML-serializable configuration structure with all sections:
/// `[store]`, `[correlation]`, `[dashboard]`, `[web]`, and `[logging]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override.
use serde::{Deserialize, Serialize};

use crate::telemetry::correlation::DEFAULT_WINDOW_MS;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level telemetry-hub configuration.
///
/// Maps directly to `~/.telemetry-hub/config.toml` and `.telemetry-hub.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub store: StoreConfig,
    pub correlation: CorrelationConfig,
    pub dashboard: DashboardConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [store]
// ---------------------------------------------------------------------------

/// Where records live and how many are read per refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Data directory. Defaults to `~/.telemetry-hub/data` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Maximum records read from each table.
    pub read_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            read_limit: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// [correlation]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Join window either side of a decision (milliseconds, exclusive).
    pub window_ms: i64,
    /// Replace earlier correlations for the same decision instead of
    /// appending a new record on every pass.
    pub dedupe: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            dedupe: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

/// Panel sizes and refresh cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Browser polling interval (seconds).
    pub refresh_secs: u64,
    pub recent_activity: usize,
    pub recent_decisions: usize,
    pub latency_points: usize,
    pub top_tools: usize,
    pub top_agents: usize,
    pub top_reliability: usize,
    /// Rows shown in the filtered call table.
    pub table_rows: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 30,
            recent_activity: 10,
            recent_decisions: 5,
            latency_points: 20,
            top_tools: 10,
            top_agents: 5,
            top_reliability: 5,
            table_rows: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address for `telemetry-hub serve`.
    pub addr: String,
    /// Open the dashboard in the default browser on start.
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9747".to_string(),
            open_browser: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `telemetry_hub=debug`.
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotated default file
// ---------------------------------------------------------------------------

impl HubConfig {
    /// The commented config written by `telemetry-hub config init`.
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG_TOML
    }

    /// Reset values that parse but cannot be used to their defaults.
    ///
    /// Returns one message per value replaced.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut replaced = Vec::new();
        if self.correlation.window_ms <= 0 {
            let fallback = CorrelationConfig::default().window_ms;
            replaced.push(format!(
                "correlation.window_ms must be positive, got {}; using {fallback}",
                self.correlation.window_ms
            ));
            self.correlation.window_ms = fallback;
        }
        replaced
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"# telemetry-hub configuration
#
# Precedence (highest last): built-in defaults, this file,
# ./.telemetry-hub.toml, TELEMETRY_HUB_* environment variables.

[store]
# data_dir = "/path/to/data"   # default: ~/.telemetry-hub/data
read_limit = 1000

[correlation]
# Calls within this many milliseconds of a decision (either side, exclusive)
# are attributed to it.
window_ms = 60000
# Keep one correlation per decision instead of appending on every pass.
dedupe = true

[dashboard]
refresh_secs = 30
recent_activity = 10
recent_decisions = 5
latency_points = 20
top_tools = 10
top_agents = 5
top_reliability = 5
table_rows = 50

[web]
addr = "127.0.0.1:9747"
open_browser = true

[logging]
level = "info"
format = "pretty"   # pretty | json
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
