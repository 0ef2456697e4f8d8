//! CLI command implementations for telemetry-hub.
//!
//! Provides subcommand handlers for:
//! - `telemetry-hub stats` — summary, performance metrics, breakdowns
//! - `telemetry-hub calls` — filtered call table
//! - `telemetry-hub decisions` — most recent agent decisions
//! - `telemetry-hub correlations` / `correlate` — stored and recomputed correlations
//! - `telemetry-hub record call|decision` — add records from the shell
//! - `telemetry-hub health` — config and data file status
//! - `telemetry-hub config show|init|set|reset` — configuration management

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use crate::config::{self, HubConfig};
use crate::store::{JsonlStore, Table, TelemetryStore};
use crate::telemetry::breakdown;
use crate::telemetry::correlation::{self, CorrelationPass};
use crate::telemetry::dashboard::{self, DashboardView};
use crate::telemetry::filter::CallFilter;
use crate::telemetry::metrics::Reading;
use crate::telemetry::model::{
    AgentDecision, CallStatus, CorrelationMetric, NewDecision, NewToolCall, ToolCall,
};

/// Output format for report commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

/// Build a filter from CLI flags; an unknown status is an error.
pub fn parse_filter(
    agent: Option<&str>,
    tool: Option<&str>,
    status: Option<&str>,
) -> Result<CallFilter> {
    let status = status
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<CallStatus>)
        .transpose()?;
    Ok(CallFilter::new(agent, tool, status))
}

// ---------------------------------------------------------------------------
// telemetry-hub stats
// ---------------------------------------------------------------------------

/// Show the dashboard view in the terminal.
pub fn run_stats(
    cfg: &HubConfig,
    store: &JsonlStore,
    filter: &CallFilter,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = store
        .snapshot(cfg.store.read_limit)
        .context("failed to read telemetry data")?;
    let view = dashboard::build(&snapshot, filter, &cfg.dashboard);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Csv => print_stats_csv(&view),
        OutputFormat::Table => {
            if view.summary.total_calls == 0 {
                println!(
                    "{}",
                    "No tool calls recorded yet. Add some with `telemetry-hub record call`.".yellow()
                );
                return Ok(());
            }
            print_stats_table(&view);
        }
    }

    Ok(())
}

fn print_stats_table(view: &DashboardView) {
    println!("{}", "Telemetry Hub Report".bold().cyan());
    println!("{}", "=".repeat(60));
    println!();

    let s = &view.summary;
    println!("  {} {}", "Total calls:  ".bold(), format_number(s.total_calls));
    println!("  {} {}%", "Success rate: ".bold(), s.success_rate);
    println!("  {} {}ms", "Avg latency:  ".bold(), s.avg_latency);
    println!("  {} {}", "Active agents:".bold(), s.active_agents);
    println!();

    let d = &view.status_distribution;
    println!("{}", "Status Distribution".bold().cyan());
    println!(
        "  Success: {}  Failure: {}  Timeout: {}  Error: {}",
        d.success, d.failure, d.timeout, d.error,
    );
    println!();

    if !view.filter.is_empty() {
        println!(
            "{} {}",
            "Filtered to".dimmed(),
            describe_filter(&view.filter).dimmed()
        );
        println!("  {} {}", "Matching calls:".bold(), view.filtered_total);
    }
    let p = &view.performance;
    println!("{}", "Performance".bold().cyan());
    println!(
        "  P95: {}  P99: {}  Error rate: {}  Timeout rate: {}",
        fmt_ms(p.p95_latency),
        fmt_ms(p.p99_latency),
        fmt_pct(p.error_rate),
        fmt_pct(p.timeout_rate),
    );
    println!();

    if !view.tool_usage.is_empty() {
        println!("{}", "Tool Usage".bold().cyan());
        println!("  {:<30} {:>8}", "Tool", "Calls");
        println!("  {}", "-".repeat(40));
        for (i, t) in view.tool_usage.iter().enumerate() {
            let line = format!("  {:<30} {:>8}", truncate(&t.tool_name, 30), t.count);
            print_striped(i, &line);
        }
        println!();
    }

    if !view.agent_performance.is_empty() {
        println!("{}", "Agent Performance".bold().cyan());
        println!(
            "  {:<24} {:>8} {:>10} {:>12}",
            "Agent", "Calls", "Success", "Avg latency"
        );
        println!("  {}", "-".repeat(58));
        for (i, a) in view.agent_performance.iter().enumerate() {
            let line = format!(
                "  {:<24} {:>8} {:>9.1}% {:>10}ms",
                truncate(&a.agent_id, 24),
                a.total,
                a.success_rate,
                a.avg_latency,
            );
            print_striped(i, &line);
        }
        println!();
    }

    if !view.tool_reliability.is_empty() {
        println!("{}", "Tool Reliability".bold().cyan());
        println!("  {:<30} {:>8} {:>12}", "Tool", "Calls", "Reliability");
        println!("  {}", "-".repeat(52));
        for (i, t) in view.tool_reliability.iter().enumerate() {
            let line = format!(
                "  {:<30} {:>8} {:>11.1}%",
                truncate(&t.tool_name, 30),
                t.total,
                t.reliability,
            );
            print_striped(i, &line);
        }
        println!();
    }

    println!(
        "  {} {} decisions, {} correlations",
        "Stored:".dimmed(),
        view.decision_count,
        view.correlation_count,
    );
}

fn print_stats_csv(view: &DashboardView) {
    println!("metric,value");
    println!("total_calls,{}", view.summary.total_calls);
    println!("success_rate,{}", view.summary.success_rate);
    println!("avg_latency,{}", view.summary.avg_latency);
    println!("active_agents,{}", view.summary.active_agents);
    println!("filtered_total,{}", view.filtered_total);
    println!("p95_latency,{}", view.performance.p95_latency);
    println!("p99_latency,{}", view.performance.p99_latency);
    println!("error_rate,{}", view.performance.error_rate);
    println!("timeout_rate,{}", view.performance.timeout_rate);
    for status in CallStatus::ALL {
        println!("status_{},{}", status, view.status_distribution.count(status));
    }
}

// ---------------------------------------------------------------------------
// telemetry-hub calls
// ---------------------------------------------------------------------------

/// List the newest calls matching the filter, newest first.
pub fn run_calls(
    cfg: &HubConfig,
    store: &JsonlStore,
    filter: &CallFilter,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let calls = store
        .load_calls(cfg.store.read_limit)
        .context("failed to read tool calls")?;
    let matched = filter.apply(&calls);
    let newest = breakdown::recent_activity(&matched, limit);
    let shown = newest.as_slice();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(shown)?),
        OutputFormat::Csv => print_calls_csv(shown),
        OutputFormat::Table => {
            if shown.is_empty() {
                println!("{}", "No matching tool calls.".yellow());
                return Ok(());
            }
            print_calls_table(shown, matched.len());
        }
    }

    Ok(())
}

fn print_calls_table(calls: &[ToolCall], total: usize) {
    println!("{}", format!("Tool Calls ({} of {})", calls.len(), total).bold().cyan());
    println!(
        "  {:<20} {:<8} {:>9} {:<16} {:<16} Time",
        "Tool", "Status", "Latency", "Agent", "Session"
    );
    println!("  {}", "-".repeat(90));

    for (i, c) in calls.iter().enumerate() {
        let line = format!(
            "  {:<20} {:<8} {:>7}ms {:<16} {:<16} {}",
            truncate(&c.tool_name, 20),
            colorize_status(c.call_status),
            c.latency().round(),
            truncate(&c.agent_id, 16),
            truncate(&c.session_id, 16),
            c.timestamp.format("%Y-%m-%d %H:%M:%S"),
        );
        print_striped(i, &line);
    }
}

fn print_calls_csv(calls: &[ToolCall]) {
    println!("id,tool_name,call_status,latency_ms,agent_id,session_id,timestamp");
    for c in calls {
        println!(
            "{},{},{},{},{},{},{}",
            c.id,
            csv_field(&c.tool_name),
            c.call_status,
            c.latency(),
            csv_field(&c.agent_id),
            csv_field(&c.session_id),
            c.timestamp.to_rfc3339(),
        );
    }
}

// ---------------------------------------------------------------------------
// telemetry-hub decisions
// ---------------------------------------------------------------------------

/// List the newest decisions, newest first.
pub fn run_decisions(
    cfg: &HubConfig,
    store: &JsonlStore,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let decisions = store
        .load_decisions(cfg.store.read_limit)
        .context("failed to read decisions")?;
    let shown = breakdown::recent_decisions(&decisions, limit);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
        OutputFormat::Csv => {
            println!("{DECISION_CSV_HEADER}");
            for d in &shown {
                println!("{}", decision_csv_row(d));
            }
        }
        OutputFormat::Table => {
            if shown.is_empty() {
                println!(
                    "{}",
                    "No decisions recorded yet. Add some with `telemetry-hub record decision`."
                        .yellow()
                );
                return Ok(());
            }
            print_decisions_table(&shown, decisions.len());
        }
    }

    Ok(())
}

fn print_decisions_table(decisions: &[AgentDecision], total: usize) {
    println!(
        "{}",
        format!("Recent Decisions ({} of {})", decisions.len(), total)
            .bold()
            .cyan()
    );
    println!(
        "  {:<18} {:<18} {:<16} {:>10} {:<8} Time",
        "Type", "Action", "Agent", "Confidence", "Outcome"
    );
    println!("  {}", "-".repeat(92));

    for (i, d) in decisions.iter().enumerate() {
        let outcome = if d.outcome_success {
            "success".green()
        } else {
            "failure".red()
        };
        let line = format!(
            "  {:<18} {:<18} {:<16} {:>9.1}% {:<8} {}",
            truncate(&d.decision_type, 18),
            truncate(&d.chosen_action, 18),
            truncate(&d.agent_id, 16),
            d.confidence_score * 100.0,
            outcome,
            d.timestamp.format("%Y-%m-%d %H:%M:%S"),
        );
        print_striped(i, &line);
    }
}

const DECISION_CSV_HEADER: &str =
    "id,agent_id,session_id,decision_type,chosen_action,confidence_score,outcome_success,timestamp";

fn decision_csv_row(d: &AgentDecision) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        d.id,
        csv_field(&d.agent_id),
        csv_field(&d.session_id),
        csv_field(&d.decision_type),
        csv_field(&d.chosen_action),
        d.confidence_score,
        d.outcome_success,
        d.timestamp.to_rfc3339(),
    )
}

// ---------------------------------------------------------------------------
// telemetry-hub correlations | correlate
// ---------------------------------------------------------------------------

/// Show stored correlations.
pub fn run_correlations(cfg: &HubConfig, store: &JsonlStore, format: OutputFormat) -> Result<()> {
    let correlations = store
        .load_correlations(cfg.store.read_limit)
        .context("failed to read correlations")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&correlations)?),
        OutputFormat::Csv => print_correlations_csv(&correlations),
        OutputFormat::Table => {
            if correlations.is_empty() {
                println!(
                    "{}",
                    "No correlations stored. Run `telemetry-hub correlate` to compute them.".yellow()
                );
                return Ok(());
            }
            print_correlations_table(&correlations);
        }
    }

    Ok(())
}

/// Recompute correlations and persist them unless `dry_run`.
pub fn run_correlate(
    cfg: &HubConfig,
    store: &JsonlStore,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let pass = correlation::run_pass(store, &cfg.correlation, cfg.store.read_limit, dry_run)
        .context("correlation pass failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&pass)?),
        OutputFormat::Csv => print_correlations_csv(&pass.correlations),
        OutputFormat::Table => {
            if !pass.correlations.is_empty() {
                print_correlations_table(&pass.correlations);
                println!();
            }
            print_pass_report(&pass, dry_run);
        }
    }

    Ok(())
}

fn print_pass_report(pass: &CorrelationPass, dry_run: bool) {
    if dry_run {
        println!(
            "{} {} correlations computed (dry run, nothing written)",
            "·".dimmed(),
            pass.correlations.len()
        );
    } else if pass.report.failed == 0 {
        println!(
            "{} {} correlations written",
            "✓".green().bold(),
            pass.report.written
        );
    } else {
        println!(
            "{} {} correlations written, {} failed (see log)",
            "✗".red().bold(),
            pass.report.written,
            pass.report.failed
        );
    }
}

fn print_correlations_table(correlations: &[CorrelationMetric]) {
    println!("{}", "Decision / Tool Call Correlations".bold().cyan());
    println!(
        "  {:<16} {:<16} {:>6} {:>9} {:>8} {:>10} Pattern",
        "Agent", "Session", "Calls", "Strength", "Success", "Latency"
    );
    println!("  {}", "-".repeat(84));

    for (i, c) in correlations.iter().enumerate() {
        let line = format!(
            "  {:<16} {:<16} {:>6} {:>9.2} {:>8.2} {:>8.0}ms {}",
            truncate(&c.agent_id, 16),
            truncate(&c.session_id, 16),
            c.tool_call_ids.len(),
            c.correlation_strength,
            c.success_rate,
            c.avg_latency,
            c.pattern_type,
        );
        print_striped(i, &line);
    }
}

fn print_correlations_csv(correlations: &[CorrelationMetric]) {
    println!(
        "decision_id,agent_id,session_id,tool_calls,correlation_strength,success_rate,avg_latency,pattern_type"
    );
    for c in correlations {
        println!(
            "{},{},{},{},{:.4},{:.4},{:.1},{}",
            c.decision_id,
            csv_field(&c.agent_id),
            csv_field(&c.session_id),
            c.tool_call_ids.len(),
            c.correlation_strength,
            c.success_rate,
            c.avg_latency,
            c.pattern_type,
        );
    }
}

// ---------------------------------------------------------------------------
// telemetry-hub record call | decision
// ---------------------------------------------------------------------------

/// Append a tool call and refresh correlations.
pub fn run_record_call(cfg: &HubConfig, store: &JsonlStore, draft: NewToolCall) -> Result<()> {
    let call = store.append_call(draft).context("failed to record tool call")?;
    info!(id = %call.id, tool = %call.tool_name, "tool call recorded");
    println!(
        "{} Recorded {} call {} ({})",
        "✓".green().bold(),
        call.tool_name.bold(),
        call.id.dimmed(),
        colorize_status(call.call_status),
    );
    refresh_correlations(cfg, store)
}

/// Append a decision and refresh correlations.
pub fn run_record_decision(cfg: &HubConfig, store: &JsonlStore, draft: NewDecision) -> Result<()> {
    let decision = store
        .append_decision(draft)
        .context("failed to record decision")?;
    info!(id = %decision.id, agent = %decision.agent_id, "decision recorded");
    println!(
        "{} Recorded decision {} for {}",
        "✓".green().bold(),
        decision.id.dimmed(),
        decision.agent_id.bold(),
    );
    refresh_correlations(cfg, store)
}

fn refresh_correlations(cfg: &HubConfig, store: &JsonlStore) -> Result<()> {
    let pass = correlation::run_pass(store, &cfg.correlation, cfg.store.read_limit, false)
        .context("correlation pass failed")?;
    print_pass_report(&pass, false);
    Ok(())
}

// ---------------------------------------------------------------------------
// telemetry-hub health
// ---------------------------------------------------------------------------

/// Check config files and data tables.
pub fn run_health(cfg: &HubConfig, store: &JsonlStore) -> Result<()> {
    println!("{}", "Telemetry Hub Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.telemetry-hub/config.toml found"
        } else {
            "not found (run `telemetry-hub config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".telemetry-hub.toml found"
        } else {
            "none (optional)"
        },
    );

    let data_dir = store.data_dir();
    print_health_item(
        "Data directory",
        data_dir.is_dir(),
        &if data_dir.is_dir() {
            data_dir.display().to_string()
        } else {
            format!("{} (created on first write)", data_dir.display())
        },
    );

    for table in Table::ALL {
        let path = store.table_path(table);
        let exists = path.exists();
        print_health_item(
            table.file_name(),
            exists,
            &if exists {
                format!("{} records", format_number(store.line_count(table)))
            } else {
                "no data yet".to_string()
            },
        );
    }

    print_health_item(
        "Correlation window",
        true,
        &format!(
            "±{}ms ({})",
            cfg.correlation.window_ms,
            if cfg.correlation.dedupe { "upsert" } else { "append" }
        ),
    );

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<28} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// telemetry-hub config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective Telemetry Hub Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.telemetry-hub/config.toml", global_exists);
    print_source(".telemetry-hub.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "TELEMETRY_HUB_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(label: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), label.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{label} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.telemetry-hub/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!("  {}", "Edit the file to customize telemetry-hub.".dimmed());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Format a number with comma separators for readability.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Quote a CSV field when it contains a separator, quote, or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn fmt_ms(r: Reading) -> String {
    match r.value() {
        Some(v) => format!("{}ms", v.round()),
        None => r.to_string(),
    }
}

fn fmt_pct(r: Reading) -> String {
    match r.value() {
        Some(v) => format!("{v:.1}%"),
        None => r.to_string(),
    }
}

fn describe_filter(filter: &CallFilter) -> String {
    let mut parts = Vec::new();
    if let Some(agent) = &filter.agent_id {
        parts.push(format!("agent={agent}"));
    }
    if let Some(tool) = &filter.tool_name {
        parts.push(format!("tool={tool}"));
    }
    if let Some(status) = filter.status {
        parts.push(format!("status={status}"));
    }
    parts.join(" ")
}

fn print_striped(i: usize, line: &str) {
    if i % 2 == 0 {
        println!("{line}");
    } else {
        println!("{}", line.dimmed());
    }
}

/// Colorize a call status.
fn colorize_status(status: CallStatus) -> colored::ColoredString {
    match status {
        CallStatus::Success => status.as_str().green(),
        CallStatus::Failure => status.as_str().red(),
        CallStatus::Timeout => status.as_str().yellow(),
        CallStatus::Error => status.as_str().magenta(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
