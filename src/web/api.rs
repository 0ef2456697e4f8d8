//! JSON API handlers for the web dashboard.
//!
//! Each handler corresponds to an API endpoint and returns a
//! `Response<Cursor<Vec<u8>>>` with JSON content.

use std::io::Cursor;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tiny_http::{Response, StatusCode};
use tracing::info;

use crate::config;
use crate::store::{JsonlStore, StoreError, Table, TelemetryStore};
use crate::telemetry::breakdown;
use crate::telemetry::correlation;
use crate::telemetry::dashboard;
use crate::telemetry::filter::CallFilter;
use crate::telemetry::model::{CallStatus, NewDecision, NewToolCall};

use super::{AppContext, content_type_json};

type JsonResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// JSON request/response types
// ---------------------------------------------------------------------------

/// Config API response — the full config as a JSON value + the raw TOML.
#[derive(Serialize)]
struct ConfigResponse {
    config: config::HubConfig,
    toml_text: String,
}

/// Config update request — a list of key-value pairs.
#[derive(Deserialize)]
struct ConfigUpdateRequest {
    updates: Vec<ConfigKeyValue>,
}

#[derive(Deserialize)]
struct ConfigKeyValue {
    key: String,
    value: String,
}

#[derive(Serialize)]
struct HealthResponse {
    version: &'static str,
    data_dir: String,
    config_exists: bool,
    tool_calls: usize,
    agent_decisions: usize,
    correlation_metrics: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a JSON response with the given status.
fn json_with_status<T: Serialize>(data: &T, status: u16) -> Result<JsonResponse> {
    let body = serde_json::to_string(data).context("failed to serialize JSON response")?;
    Ok(Response::from_data(body.into_bytes())
        .with_header(content_type_json())
        .with_status_code(StatusCode(status)))
}

/// Build a JSON success response.
fn json_response<T: Serialize>(data: &T) -> Result<JsonResponse> {
    json_with_status(data, 200)
}

/// `{ "error": msg }` with a client-error status.
fn client_error(status: u16, msg: impl std::fmt::Display) -> Result<JsonResponse> {
    json_with_status(&serde_json::json!({ "error": msg.to_string() }), status)
}

/// Extract and percent-decode a query parameter. Blank values count as absent.
pub(crate) fn query_param(url: &str, key: &str) -> Option<String> {
    url.split_once('?')?.1.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if form_decode(k) != key {
            return None;
        }
        let v = form_decode(v);
        if v.trim().is_empty() { None } else { Some(v) }
    })
}

/// Decode one `application/x-www-form-urlencoded` component (`+` is a
/// space). Input that does not decode to UTF-8 is kept as sent.
fn form_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Build the call filter from `?agent=&tool=&status=`.
///
/// An unknown status is a client error rather than a silent match-all.
fn filter_from_url(url: &str) -> std::result::Result<CallFilter, String> {
    let status = match query_param(url, "status") {
        Some(raw) => Some(raw.parse::<CallStatus>().map_err(|e| e.to_string())?),
        None => None,
    };
    Ok(CallFilter::new(
        query_param(url, "agent").as_deref(),
        query_param(url, "tool").as_deref(),
        status,
    ))
}

/// Map a store error on a write path: bad input is the client's fault.
fn store_write_error(e: StoreError) -> Result<JsonResponse> {
    match e {
        StoreError::Invalid(v) => client_error(400, v),
        other => Err(other).context("failed to write record"),
    }
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

/// `GET /api/dashboard?agent=&tool=&status=` — the full dashboard view.
pub fn get_dashboard(ctx: &AppContext, url: &str) -> Result<JsonResponse> {
    let filter = match filter_from_url(url) {
        Ok(f) => f,
        Err(msg) => return client_error(400, msg),
    };
    let snapshot = ctx
        .store
        .snapshot(ctx.config.store.read_limit)
        .context("failed to read telemetry snapshot")?;

    let view = dashboard::build(&snapshot, &filter, &ctx.config.dashboard);
    json_response(&view)
}

/// `GET /api/calls?agent=&tool=&status=&limit=` — newest matching calls first.
pub fn get_calls(ctx: &AppContext, url: &str) -> Result<JsonResponse> {
    let filter = match filter_from_url(url) {
        Ok(f) => f,
        Err(msg) => return client_error(400, msg),
    };
    let limit = query_param(url, "limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(ctx.config.dashboard.table_rows);

    let calls = ctx
        .store
        .load_calls(ctx.config.store.read_limit)
        .context("failed to read tool calls")?;
    let filtered = filter.apply(&calls);

    json_response(&serde_json::json!({
        "total": filtered.len(),
        "calls": breakdown::recent_activity(&filtered, limit),
    }))
}

/// `GET /api/decisions` — stored decisions.
pub fn get_decisions(ctx: &AppContext) -> Result<JsonResponse> {
    let decisions = ctx
        .store
        .load_decisions(ctx.config.store.read_limit)
        .context("failed to read decisions")?;
    json_response(&decisions)
}

/// `GET /api/correlations` — stored correlations.
pub fn get_correlations(ctx: &AppContext) -> Result<JsonResponse> {
    let correlations = ctx
        .store
        .load_correlations(ctx.config.store.read_limit)
        .context("failed to read correlations")?;
    json_response(&correlations)
}

// ---------------------------------------------------------------------------
// Write endpoints
// ---------------------------------------------------------------------------

/// `POST /api/calls` — record a tool call, then recompute correlations.
pub fn post_call(ctx: &AppContext, body: &str) -> Result<JsonResponse> {
    let draft: NewToolCall = match serde_json::from_str(body) {
        Ok(d) => d,
        Err(e) => return client_error(400, format!("invalid tool call JSON: {e}")),
    };

    let call = match ctx.store.append_call(draft) {
        Ok(call) => call,
        Err(e) => return store_write_error(e),
    };
    info!(id = %call.id, tool = %call.tool_name, "tool call recorded");

    let pass = run_correlation_pass(ctx)?;
    json_with_status(
        &serde_json::json!({ "call": call, "correlation": pass.report }),
        201,
    )
}

/// `POST /api/decisions` — record a decision, then recompute correlations.
pub fn post_decision(ctx: &AppContext, body: &str) -> Result<JsonResponse> {
    let draft: NewDecision = match serde_json::from_str(body) {
        Ok(d) => d,
        Err(e) => return client_error(400, format!("invalid decision JSON: {e}")),
    };

    let decision = match ctx.store.append_decision(draft) {
        Ok(d) => d,
        Err(e) => return store_write_error(e),
    };
    info!(id = %decision.id, agent = %decision.agent_id, "decision recorded");

    let pass = run_correlation_pass(ctx)?;
    json_with_status(
        &serde_json::json!({ "decision": decision, "correlation": pass.report }),
        201,
    )
}

/// `POST /api/correlate` — recompute and persist all correlations.
pub fn post_correlate(ctx: &AppContext) -> Result<JsonResponse> {
    let pass = run_correlation_pass(ctx)?;
    json_response(&pass)
}

fn run_correlation_pass(ctx: &AppContext) -> Result<correlation::CorrelationPass> {
    correlation::run_pass(
        &ctx.store,
        &ctx.config.correlation,
        ctx.config.store.read_limit,
        false,
    )
    .context("correlation pass failed")
}

// ---------------------------------------------------------------------------
// Config and health
// ---------------------------------------------------------------------------

/// `GET /api/config` — current effective configuration.
pub fn get_config(ctx: &AppContext) -> Result<JsonResponse> {
    let toml_text = toml::to_string_pretty(&ctx.config).unwrap_or_default();
    json_response(&ConfigResponse {
        config: ctx.config.clone(),
        toml_text,
    })
}

/// `PUT /api/config` — update configuration keys.
///
/// Expects JSON body: `{ "updates": [{ "key": "correlation.window_ms", "value": "30000" }] }`.
/// Returns whether any key was applied so the caller can reload.
pub fn put_config(body: &str) -> Result<(JsonResponse, bool)> {
    let req: ConfigUpdateRequest = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => return Ok((client_error(400, format!("invalid config update JSON: {e}"))?, false)),
    };

    let mut errors: Vec<String> = Vec::new();
    let mut applied: Vec<String> = Vec::new();

    for kv in &req.updates {
        match config::set_config_value(&kv.key, &kv.value) {
            Ok(()) => applied.push(format!("{} = {}", kv.key, kv.value)),
            Err(e) => errors.push(format!("{}: {e:#}", kv.key)),
        }
    }

    let changed = !applied.is_empty();
    let result = serde_json::json!({
        "applied": applied,
        "errors": errors,
        "success": errors.is_empty(),
    });

    Ok((json_response(&result)?, changed))
}

/// `POST /api/config/reset` — reset config to defaults.
pub fn post_config_reset() -> Result<JsonResponse> {
    config::reset_config().context("failed to reset config")?;

    json_response(&serde_json::json!({
        "success": true,
        "message": "Configuration reset to defaults",
    }))
}

/// `GET /api/health` — store and config status.
pub fn get_health(ctx: &AppContext) -> Result<JsonResponse> {
    json_response(&health_of(&ctx.store))
}

fn health_of(store: &JsonlStore) -> HealthResponse {
    HealthResponse {
        version: env!("CARGO_PKG_VERSION"),
        data_dir: store.data_dir().display().to_string(),
        config_exists: config::global_config_file()
            .map(|p| p.exists())
            .unwrap_or(false),
        tool_calls: store.line_count(Table::ToolCalls),
        agent_decisions: store.line_count(Table::AgentDecisions),
        correlation_metrics: store.line_count(Table::CorrelationMetrics),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
