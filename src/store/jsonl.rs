//! JSONL-backed store.
//!
//! Appends open the table file in append mode and write one line. Upserts
//! rewrite the correlation table once per batch through a sibling temp file
//! and a rename, so a reader never sees a half-written table. Lines that do
//! not parse are skipped on read and preserved on rewrite.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use super::{StoreError, TelemetryStore};
use crate::config::schema::StoreConfig;
use crate::telemetry::model::{
    AgentDecision, CorrelationMetric, NewDecision, NewToolCall, ToolCall,
};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The tables kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    ToolCalls,
    AgentDecisions,
    CorrelationMetrics,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::ToolCalls, Table::AgentDecisions, Table::CorrelationMetrics];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::ToolCalls => "tool_calls.jsonl",
            Self::AgentDecisions => "agent_decisions.jsonl",
            Self::CorrelationMetrics => "correlation_metrics.jsonl",
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// File-backed store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    data_dir: PathBuf,
}

impl JsonlStore {
    /// Store rooted at an explicit directory. The directory is created on
    /// first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Store rooted at `store.data_dir`, or `~/.telemetry-hub/data`.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let dir = match &config.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir().ok_or(StoreError::NoDataDir)?,
        };
        Ok(Self::new(dir))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Full path of a table file.
    pub fn table_path(&self, table: Table) -> PathBuf {
        self.data_dir.join(table.file_name())
    }

    /// Number of non-blank lines in a table, parseable or not. Missing file
    /// counts as 0.
    pub fn line_count(&self, table: Table) -> usize {
        let Ok(file) = File::open(self.table_path(table)) else {
            return 0;
        };
        BufReader::new(file)
            .split(b'\n')
            .map_while(Result::ok)
            .filter(|line| !is_blank(line))
            .count()
    }

    /// Every non-blank line with its parsed record, if it parsed.
    ///
    /// Lines are read as bytes, so invalid UTF-8 is just another malformed
    /// line rather than the end of the table.
    fn read_rows<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<Row<T>>, StoreError> {
        let path = self.table_path(table);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let mut rows = Vec::new();
        for line in BufReader::new(file).split(b'\n') {
            let raw = line.map_err(io_error(&path))?;
            if is_blank(&raw) {
                continue;
            }
            let record = serde_json::from_slice::<T>(&raw).ok();
            rows.push(Row { raw, record });
        }
        Ok(rows)
    }

    fn read_table<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>, StoreError> {
        let rows = self.read_rows(table)?;
        let total = rows.len();
        let records: Vec<T> = rows.into_iter().filter_map(|row| row.record).collect();

        let skipped = total - records.len();
        if skipped > 0 {
            debug!(table = table.file_name(), skipped, "skipped malformed lines");
        }
        Ok(records)
    }

    fn read_tail<T: DeserializeOwned>(&self, table: Table, limit: usize) -> Result<Vec<T>, StoreError> {
        let mut records = self.read_table(table)?;
        let skip = records.len().saturating_sub(limit);
        records.drain(..skip);
        Ok(records)
    }

    fn append_line<T: Serialize>(&self, table: Table, record: &T) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let path = self.table_path(table);
        let json = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        writeln!(file, "{json}").map_err(io_error(&path))
    }

    /// Replace a table's contents with `lines`, one per line.
    fn rewrite_lines<'a>(
        &self,
        table: Table,
        lines: impl IntoIterator<Item = &'a [u8]>,
    ) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let path = self.table_path(table);
        let tmp = path.with_extension("jsonl.tmp");

        let file = File::create(&tmp).map_err(io_error(&tmp))?;
        let mut writer = BufWriter::new(file);
        for line in lines {
            writer.write_all(line).map_err(io_error(&tmp))?;
            writer.write_all(b"\n").map_err(io_error(&tmp))?;
        }
        writer.flush().map_err(io_error(&tmp))?;
        drop(writer);

        fs::rename(&tmp, &path).map_err(io_error(&path))
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        create_dir_all(&self.data_dir).map_err(io_error(&self.data_dir))
    }
}

impl TelemetryStore for JsonlStore {
    fn load_calls(&self, limit: usize) -> Result<Vec<ToolCall>, StoreError> {
        self.read_tail(Table::ToolCalls, limit)
    }

    fn load_decisions(&self, limit: usize) -> Result<Vec<AgentDecision>, StoreError> {
        self.read_tail(Table::AgentDecisions, limit)
    }

    fn load_correlations(&self, limit: usize) -> Result<Vec<CorrelationMetric>, StoreError> {
        self.read_tail(Table::CorrelationMetrics, limit)
    }

    fn append_call(&self, draft: NewToolCall) -> Result<ToolCall, StoreError> {
        draft.validate()?;
        let record = draft.into_record(new_id(), Utc::now());
        self.append_line(Table::ToolCalls, &record)?;
        Ok(record)
    }

    fn append_decision(&self, draft: NewDecision) -> Result<AgentDecision, StoreError> {
        draft.validate()?;
        let record = draft.into_record(new_id(), Utc::now());
        self.append_line(Table::AgentDecisions, &record)?;
        Ok(record)
    }

    fn append_correlation(&self, correlation: &CorrelationMetric) -> Result<(), StoreError> {
        self.append_line(Table::CorrelationMetrics, correlation)
    }

    fn upsert_correlation(&self, correlation: &CorrelationMetric) -> Result<(), StoreError> {
        self.upsert_correlations(std::slice::from_ref(correlation))?
            .into_iter()
            .next()
            .unwrap_or(Ok(()))
    }

    /// One read and one rewrite for the whole batch. Lines that do not parse
    /// are carried over untouched.
    fn upsert_correlations(
        &self,
        batch: &[CorrelationMetric],
    ) -> Result<Vec<Result<(), StoreError>>, StoreError> {
        let table = Table::CorrelationMetrics;
        let existing = self.read_rows::<CorrelationMetric>(table)?;

        let mut results = Vec::with_capacity(batch.len());
        let mut fresh: Vec<Vec<u8>> = Vec::new();
        let mut slot_by_decision: HashMap<&str, usize> = HashMap::new();
        for correlation in batch {
            match serde_json::to_vec(correlation) {
                Ok(line) => {
                    match slot_by_decision.get(correlation.decision_id.as_str()) {
                        Some(&slot) => fresh[slot] = line,
                        None => {
                            slot_by_decision.insert(&correlation.decision_id, fresh.len());
                            fresh.push(line);
                        }
                    }
                    results.push(Ok(()));
                }
                Err(e) => results.push(Err(e.into())),
            }
        }

        let kept = existing.iter().filter(|row| match &row.record {
            Some(old) => !slot_by_decision.contains_key(old.decision_id.as_str()),
            None => true,
        });
        let lines = kept
            .map(|row| row.raw.as_slice())
            .chain(fresh.iter().map(Vec::as_slice));
        self.rewrite_lines(table, lines)?;

        Ok(results)
    }
}

/// A stored line and its record, `None` when the line is malformed.
struct Row<T> {
    raw: Vec<u8>,
    record: Option<T>,
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { path, source }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// `~/.telemetry-hub/data`.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".telemetry-hub").join("data"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
