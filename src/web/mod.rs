//! Embedded web dashboard for telemetry-hub.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - A single-page dashboard with filters and record-entry forms
//! - JSON API endpoints for the dashboard view, records, correlations,
//!   and config management
//!
//! Launched via `telemetry-hub serve` (default: `http://127.0.0.1:9747`).

mod api;
mod frontend;

use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{info, warn};

use crate::config::{self, HubConfig};
use crate::store::JsonlStore;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything a request handler needs. Rebuilt after config changes.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: HubConfig,
    pub store: JsonlStore,
}

impl AppContext {
    pub fn new(config: HubConfig, store: JsonlStore) -> Self {
        Self { config, store }
    }

    /// Build from the effective configuration on disk.
    pub fn load() -> Result<Self> {
        let config = config::load().logged();
        let store = JsonlStore::from_config(&config.store)?;
        Ok(Self::new(config, store))
    }

    /// Re-read configuration after an edit. Keeps the old state on failure.
    fn reload(&mut self) {
        match Self::load() {
            Ok(fresh) => *self = fresh,
            Err(e) => warn!(error = %e, "config reload failed; keeping previous settings"),
        }
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the web dashboard server on the given address.
///
/// Blocks the current thread. Handles requests sequentially (sufficient for
/// a local single-user dashboard). Errors are reported per request without
/// stopping the server.
pub fn serve(mut ctx: AppContext, addr: &str) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    info!(%addr, data_dir = %ctx.store.data_dir().display(), "dashboard listening");
    println!("telemetry-hub dashboard running at http://{addr}");
    println!("Press Ctrl+C to stop.\n");

    if ctx.config.web.open_browser {
        let url = format!("http://{addr}");
        if let Err(e) = open_browser(&url) {
            warn!(error = %e, "could not open browser");
        }
    }

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();

        // Read body up-front for methods that carry one
        let body = if matches!(method, Method::Put | Method::Post | Method::Patch) {
            let mut buf = String::new();
            if let Err(e) = request.as_reader().read_to_string(&mut buf) {
                warn!(error = %e, %url, "failed to read request body");
            }
            Some(buf)
        } else {
            None
        };

        let response = match dispatch(&mut ctx, &method, &url, body.as_deref()) {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = format!("{e:#}"), %method, %url, "request failed");
                error_response(&e)
            }
        };
        let status = response.status_code().0;

        if let Err(e) = request.respond(response) {
            warn!(error = %e, %url, "failed to send response");
        }

        info!(%method, %url, status, "request");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Dispatch an incoming request to the appropriate handler.
pub fn dispatch(
    ctx: &mut AppContext,
    method: &Method,
    url: &str,
    body: Option<&str>,
) -> Result<Response<Cursor<Vec<u8>>>> {
    // Strip query string for path matching
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        // Frontend
        (&Method::Get, "/") | (&Method::Get, "/index.html") => {
            Ok(serve_frontend(ctx.config.dashboard.refresh_secs))
        }

        // API — Dashboard and records
        (&Method::Get, "/api/dashboard") => api::get_dashboard(ctx, url),
        (&Method::Get, "/api/calls") => api::get_calls(ctx, url),
        (&Method::Post, "/api/calls") => api::post_call(ctx, body.unwrap_or("")),
        (&Method::Get, "/api/decisions") => api::get_decisions(ctx),
        (&Method::Post, "/api/decisions") => api::post_decision(ctx, body.unwrap_or("")),
        (&Method::Get, "/api/correlations") => api::get_correlations(ctx),
        (&Method::Post, "/api/correlate") => api::post_correlate(ctx),

        // API — Configuration
        (&Method::Get, "/api/config") => api::get_config(ctx),
        (&Method::Put, "/api/config") => {
            let (resp, changed) = api::put_config(body.unwrap_or("{}"))?;
            if changed {
                ctx.reload();
            }
            Ok(resp)
        }
        (&Method::Post, "/api/config/reset") => {
            let resp = api::post_config_reset()?;
            ctx.reload();
            Ok(resp)
        }

        // API — Health
        (&Method::Get, "/api/health") => api::get_health(ctx),

        // 404
        _ => Ok(not_found()),
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Serve the embedded single-page frontend.
fn serve_frontend(refresh_secs: u64) -> Response<Cursor<Vec<u8>>> {
    let html = frontend::index_html(refresh_secs);
    Response::from_data(html.into_bytes())
        .with_header(content_type_html())
        .with_status_code(StatusCode(200))
}

/// 404 response.
fn not_found() -> Response<Cursor<Vec<u8>>> {
    let body = r#"{"error": "not found"}"#;
    Response::from_data(body.as_bytes().to_vec())
        .with_header(content_type_json())
        .with_status_code(StatusCode(404))
}

/// 500 response carrying the error chain.
fn error_response(e: &anyhow::Error) -> Response<Cursor<Vec<u8>>> {
    let body = serde_json::json!({ "error": format!("{e:#}") }).to_string();
    Response::from_data(body.into_bytes())
        .with_header(content_type_json())
        .with_status_code(StatusCode(500))
}

/// JSON content type header.
pub(crate) fn content_type_json() -> Header {
    Header::from_bytes("Content-Type", "application/json; charset=utf-8")
        .expect("static header is valid")
}

/// HTML content type header.
fn content_type_html() -> Header {
    Header::from_bytes("Content-Type", "text/html; charset=utf-8")
        .expect("static header is valid")
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx(dir: &std::path::Path) -> AppContext {
        AppContext::new(HubConfig::default(), JsonlStore::new(dir))
    }

    fn body_of(resp: Response<Cursor<Vec<u8>>>) -> serde_json::Value {
        let mut reader = resp.into_reader();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        serde_json::from_str(&buf).unwrap()
    }

    #[test]
    fn unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        let resp = dispatch(&mut ctx, &Method::Get, "/nope", None).unwrap();
        assert_eq!(resp.status_code().0, 404);
    }

    #[test]
    fn frontend_served_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        let resp = dispatch(&mut ctx, &Method::Get, "/", None).unwrap();
        assert_eq!(resp.status_code().0, 200);
    }

    #[test]
    fn empty_store_dashboard_uses_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        let resp = dispatch(&mut ctx, &Method::Get, "/api/dashboard", None).unwrap();
        assert_eq!(resp.status_code().0, 200);

        let v = body_of(resp);
        assert_eq!(v["summary"]["total_calls"], 0);
        assert_eq!(v["summary"]["success_rate"], 0);
        assert_eq!(v["performance"]["p95_latency"], "-");
        assert_eq!(v["performance"]["error_rate"], "-");
    }

    #[test]
    fn posted_call_shows_up_in_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        let body = r#"{"tool_name":"search","call_status":"success","latency_ms":120,
                       "agent_id":"a1","session_id":"s1"}"#;
        let resp = dispatch(&mut ctx, &Method::Post, "/api/calls", Some(body)).unwrap();
        assert_eq!(resp.status_code().0, 201);

        let v = body_of(dispatch(&mut ctx, &Method::Get, "/api/dashboard", None).unwrap());
        assert_eq!(v["summary"]["total_calls"], 1);
        assert_eq!(v["summary"]["success_rate"], 100);
        assert_eq!(v["summary"]["avg_latency"], 120);
    }

    #[test]
    fn calls_endpoint_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        for (tool, minute) in [("old", "00"), ("newest", "02"), ("middle", "01")] {
            let body = format!(
                r#"{{"tool_name":"{tool}","call_status":"success","latency_ms":5,
                    "agent_id":"a1","session_id":"s1","timestamp":"2025-06-01T12:{minute}:00Z"}}"#
            );
            let resp = dispatch(&mut ctx, &Method::Post, "/api/calls", Some(&body)).unwrap();
            assert_eq!(resp.status_code().0, 201);
        }

        let v = body_of(dispatch(&mut ctx, &Method::Get, "/api/calls?limit=2", None).unwrap());
        assert_eq!(v["total"], 3);
        let tools: Vec<&str> = v["calls"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["tool_name"].as_str().unwrap())
            .collect();
        assert_eq!(tools, vec!["newest", "middle"]);
    }

    #[test]
    fn posted_decision_shows_up_in_recent_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        let body = r#"{"agent_id":"a1","session_id":"s1","decision_type":"tool_selection",
                       "chosen_action":"search","confidence_score":0.8,"outcome_success":true}"#;
        let resp = dispatch(&mut ctx, &Method::Post, "/api/decisions", Some(body)).unwrap();
        assert_eq!(resp.status_code().0, 201);

        let v = body_of(dispatch(&mut ctx, &Method::Get, "/api/dashboard", None).unwrap());
        assert_eq!(v["recent_decisions"][0]["chosen_action"], "search");
        assert_eq!(v["decision_count"], 1);
    }

    #[test]
    fn invalid_call_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        let body = r#"{"tool_name":"","call_status":"success","agent_id":"a1","session_id":"s1"}"#;
        let resp = dispatch(&mut ctx, &Method::Post, "/api/calls", Some(body)).unwrap();
        assert_eq!(resp.status_code().0, 400);

        let resp = dispatch(&mut ctx, &Method::Post, "/api/calls", Some("not json")).unwrap();
        assert_eq!(resp.status_code().0, 400);
    }

    #[test]
    fn out_of_range_confidence_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        let body = r#"{"agent_id":"a1","session_id":"s1","confidence_score":1.5,"outcome_success":true}"#;
        let resp = dispatch(&mut ctx, &Method::Post, "/api/decisions", Some(body)).unwrap();
        assert_eq!(resp.status_code().0, 400);
    }

    #[test]
    fn unknown_status_filter_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_ctx(dir.path());
        let resp = dispatch(&mut ctx, &Method::Get, "/api/calls?status=pending", None).unwrap();
        assert_eq!(resp.status_code().0, 400);
    }
}
