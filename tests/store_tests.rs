/// JSONL store tests.
///
/// Every test runs against its own temporary data directory.
use std::fs;
use std::io::Write;

use chrono::{TimeZone, Utc};
use telemetry_hub::config::schema::CorrelationConfig;
use telemetry_hub::store::{JsonlStore, StoreError, Table, TelemetryStore};
use telemetry_hub::telemetry::correlation;
use telemetry_hub::telemetry::model::{
    CallStatus, CorrelationMetric, NewDecision, NewToolCall, PatternType,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn draft_call(tool: &str) -> NewToolCall {
    NewToolCall {
        tool_name: tool.to_string(),
        call_status: CallStatus::Success,
        latency_ms: Some(25.0),
        agent_id: "a1".to_string(),
        session_id: "s1".to_string(),
        parameters: r#"{"q":"rust"}"#.to_string(),
        error_message: String::new(),
        timestamp: None,
        response_data: String::new(),
    }
}

fn draft_decision(confidence: f64) -> NewDecision {
    NewDecision {
        agent_id: "a1".to_string(),
        session_id: "s1".to_string(),
        decision_type: "tool_selection".to_string(),
        decision_context: String::new(),
        chosen_action: "search".to_string(),
        confidence_score: confidence,
        outcome_success: true,
        timestamp: None,
        related_tool_calls: Vec::new(),
    }
}

fn metric(decision_id: &str, strength: f64) -> CorrelationMetric {
    CorrelationMetric {
        agent_id: "a1".to_string(),
        session_id: "s1".to_string(),
        decision_id: decision_id.to_string(),
        tool_call_ids: vec!["c1".to_string()],
        correlation_strength: strength,
        success_rate: 1.0,
        avg_latency: 25.0,
        pattern_type: PatternType::Single,
        timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
    }
}

// ---------------------------------------------------------------------------
// Appends and reads
// ---------------------------------------------------------------------------

#[test]
fn appended_call_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path().join("data"));

    let written = store.append_call(draft_call("search")).unwrap();
    assert!(!written.id.is_empty());

    let read = store.load_calls(10).unwrap();
    assert_eq!(read, vec![written]);
    assert!(store.table_path(Table::ToolCalls).exists());
}

#[test]
fn ids_are_unique() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());

    let a = store.append_call(draft_call("search")).unwrap();
    let b = store.append_call(draft_call("search")).unwrap();
    assert_ne!(a.id, b.id);
}

#[test]
fn load_returns_most_recent_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());

    for tool in ["one", "two", "three", "four"] {
        store.append_call(draft_call(tool)).unwrap();
    }

    let tools: Vec<_> = store
        .load_calls(2)
        .unwrap()
        .into_iter()
        .map(|c| c.tool_name)
        .collect();
    assert_eq!(tools, vec!["three", "four"]);
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());
    store.append_call(draft_call("good")).unwrap();

    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(store.table_path(Table::ToolCalls))
        .unwrap();
    writeln!(file, "{{not json").unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"tool_name":"missing required fields"}}"#).unwrap();
    drop(file);

    store.append_call(draft_call("also good")).unwrap();

    let calls = store.load_calls(100).unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].tool_name, "also good");
    // Blank lines are not counted; malformed ones are.
    assert_eq!(store.line_count(Table::ToolCalls), 4);
}

#[test]
fn record_without_latency_reads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());
    fs::write(
        store.table_path(Table::ToolCalls),
        r#"{"id":"x","tool_name":"t","call_status":"timeout","agent_id":"a","session_id":"s","timestamp":"2025-01-01T00:00:00Z"}"#,
    )
    .unwrap();

    let calls = store.load_calls(10).unwrap();
    assert_eq!(calls[0].latency_ms, None);
    assert_eq!(calls[0].latency(), 0.0);
}

#[test]
fn invalid_drafts_are_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());

    let err = store.append_decision(draft_decision(1.5)).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));

    let mut call = draft_call("search");
    call.latency_ms = Some(-1.0);
    assert!(matches!(
        store.append_call(call).unwrap_err(),
        StoreError::Invalid(_)
    ));

    assert!(!store.table_path(Table::AgentDecisions).exists());
    assert!(!store.table_path(Table::ToolCalls).exists());
}

// ---------------------------------------------------------------------------
// Correlation table
// ---------------------------------------------------------------------------

#[test]
fn upsert_replaces_by_decision_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());

    store.upsert_correlation(&metric("d1", 0.2)).unwrap();
    store.upsert_correlation(&metric("d2", 0.5)).unwrap();
    store.upsert_correlation(&metric("d1", 0.9)).unwrap();

    let rows = store.load_correlations(10).unwrap();
    assert_eq!(rows.len(), 2);
    let d1 = rows.iter().find(|m| m.decision_id == "d1").unwrap();
    assert_eq!(d1.correlation_strength, 0.9);
    assert!(!store.table_path(Table::CorrelationMetrics).with_extension("jsonl.tmp").exists());
}

#[test]
fn invalid_utf8_line_does_not_hide_later_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());
    let path = store.table_path(Table::CorrelationMetrics);

    store.append_correlation(&metric("d1", 0.1)).unwrap();
    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"\xff\xfe garbage\n").unwrap();
    drop(file);
    store.append_correlation(&metric("d2", 0.2)).unwrap();
    store.append_correlation(&metric("d3", 0.3)).unwrap();

    let ids = |store: &JsonlStore| -> Vec<String> {
        store
            .load_correlations(100)
            .unwrap()
            .into_iter()
            .map(|m| m.decision_id)
            .collect()
    };
    assert_eq!(ids(&store), vec!["d1", "d2", "d3"]);
    assert_eq!(store.line_count(Table::CorrelationMetrics), 4);

    store.upsert_correlation(&metric("d9", 0.9)).unwrap();
    assert_eq!(ids(&store), vec!["d1", "d2", "d3", "d9"]);

    // The unreadable line is carried over byte for byte.
    let bytes = fs::read(&path).unwrap();
    assert!(bytes.windows(10).any(|w| w == b"\xff\xfe garbage"));
    assert_eq!(store.line_count(Table::CorrelationMetrics), 5);
}

#[test]
fn batch_upsert_replaces_and_appends_in_one_go() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());
    store.append_correlation(&metric("d1", 0.1)).unwrap();
    store.append_correlation(&metric("d2", 0.2)).unwrap();

    let results = store
        .upsert_correlations(&[metric("d2", 0.8), metric("d3", 0.3), metric("d3", 0.6)])
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(Result::is_ok));

    let rows = store.load_correlations(100).unwrap();
    let summary: Vec<(String, f64)> = rows
        .into_iter()
        .map(|m| (m.decision_id, m.correlation_strength))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("d1".to_string(), 0.1),
            ("d2".to_string(), 0.8),
            ("d3".to_string(), 0.6),
        ]
    );
}

#[test]
fn append_keeps_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());

    store.append_correlation(&metric("d1", 0.2)).unwrap();
    store.append_correlation(&metric("d1", 0.2)).unwrap();
    assert_eq!(store.load_correlations(10).unwrap().len(), 2);
}

#[test]
fn repeated_passes_do_not_duplicate_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());
    store.append_decision(draft_decision(0.7)).unwrap();
    store.append_call(draft_call("search")).unwrap();

    let config = CorrelationConfig::default();
    for _ in 0..3 {
        let pass = correlation::run_pass(&store, &config, 100, false).unwrap();
        assert_eq!(pass.report.written, 1);
        assert_eq!(pass.report.failed, 0);
    }

    let rows = store.load_correlations(100).unwrap();
    assert_eq!(rows.len(), 1);
    assert!((rows[0].correlation_strength - 0.7).abs() < 1e-9);
}

#[test]
fn snapshot_reads_all_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlStore::new(dir.path());
    store.append_call(draft_call("search")).unwrap();
    store.append_decision(draft_decision(0.5)).unwrap();
    store.append_correlation(&metric("d1", 0.5)).unwrap();

    let snapshot = store.snapshot(100).unwrap();
    assert_eq!(snapshot.calls.len(), 1);
    assert_eq!(snapshot.decisions.len(), 1);
    assert_eq!(snapshot.correlations.len(), 1);
}
