//! Embedded HTML/JS frontend for the telemetry-hub dashboard.
//!
//! The page is compiled into the binary as a string constant. It polls
//! `/api/dashboard` on an interval and renders plain tables; no external
//! assets or chart libraries.

/// Placeholder replaced with the polling interval (milliseconds).
pub const REFRESH_PLACEHOLDER: &str = "__REFRESH_MS__";

/// Render the page with the configured polling interval.
pub fn index_html(refresh_secs: u64) -> String {
    let refresh_ms = refresh_secs.max(1).saturating_mul(1000);
    INDEX_HTML.replace(REFRESH_PLACEHOLDER, &refresh_ms.to_string())
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Telemetry Hub</title>
<style>
body { font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif; margin: 24px; font-size: 14px; }
h1 { font-size: 22px; }
h2 { font-size: 16px; margin-top: 28px; }
.cards { display: flex; gap: 16px; flex-wrap: wrap; }
.card { border: 1px solid #ccc; border-radius: 6px; padding: 12px 16px; min-width: 140px; }
.card .label { color: #666; font-size: 12px; }
.card .value { font-size: 22px; font-weight: 600; }
table { border-collapse: collapse; margin-top: 8px; }
th, td { border-bottom: 1px solid #ddd; padding: 4px 10px; text-align: left; }
form { display: flex; gap: 8px; flex-wrap: wrap; align-items: end; margin-top: 8px; }
label { display: flex; flex-direction: column; font-size: 12px; color: #444; }
#status { color: #666; font-size: 12px; }
.error { color: #b00020; }
</style>
</head>
<body>
<h1>Telemetry Hub</h1>
<div id="status">loading…</div>

<h2>Overview</h2>
<div class="cards">
  <div class="card"><div class="label">Total calls</div><div class="value" id="total-calls">-</div></div>
  <div class="card"><div class="label">Success rate</div><div class="value" id="success-rate">-</div></div>
  <div class="card"><div class="label">Avg latency</div><div class="value" id="avg-latency">-</div></div>
  <div class="card"><div class="label">Active agents</div><div class="value" id="active-agents">-</div></div>
</div>

<h2>Status distribution</h2>
<table id="status-table"></table>

<h2>Recent activity</h2>
<table id="recent-table"></table>

<h2>Tool usage</h2>
<table id="usage-table"></table>

<h2>Latency (most recent calls)</h2>
<table id="latency-table"></table>

<h2>Analytics</h2>
<form id="filter-form">
  <label>Agent <input name="agent"></label>
  <label>Tool <input name="tool"></label>
  <label>Status
    <select name="status">
      <option value="">All</option>
      <option value="success">success</option>
      <option value="failure">failure</option>
      <option value="timeout">timeout</option>
      <option value="error">error</option>
    </select>
  </label>
  <button type="submit">Apply filters</button>
</form>
<div class="cards" style="margin-top:12px">
  <div class="card"><div class="label">P95 latency</div><div class="value" id="p95">-</div></div>
  <div class="card"><div class="label">P99 latency</div><div class="value" id="p99">-</div></div>
  <div class="card"><div class="label">Error rate</div><div class="value" id="error-rate">-</div></div>
  <div class="card"><div class="label">Timeout rate</div><div class="value" id="timeout-rate">-</div></div>
</div>
<table id="calls-table"></table>

<h2>Agent performance</h2>
<table id="agents-table"></table>

<h2>Tool reliability</h2>
<table id="reliability-table"></table>

<h2>Decision / success correlation</h2>
<table id="correlation-table"></table>

<h2>Recent decisions</h2>
<table id="decisions-table"></table>

<h2>Record a tool call</h2>
<form id="call-form">
  <label>Tool <input name="tool_name" required></label>
  <label>Status
    <select name="call_status">
      <option>success</option><option>failure</option><option>timeout</option><option>error</option>
    </select>
  </label>
  <label>Latency (ms) <input name="latency_ms" type="number" min="0" step="any"></label>
  <label>Agent <input name="agent_id" required></label>
  <label>Session <input name="session_id" required></label>
  <label>Parameters <input name="parameters"></label>
  <label>Error message <input name="error_message"></label>
  <button type="submit">Add</button>
</form>

<h2>Record a decision</h2>
<form id="decision-form">
  <label>Agent <input name="agent_id" required></label>
  <label>Session <input name="session_id" required></label>
  <label>Type <input name="decision_type"></label>
  <label>Context <input name="decision_context"></label>
  <label>Action <input name="chosen_action"></label>
  <label>Confidence <input name="confidence_score" type="number" min="0" max="1" step="0.01" required></label>
  <label>Outcome
    <select name="outcome_success"><option value="true">success</option><option value="false">failure</option></select>
  </label>
  <button type="submit">Add</button>
</form>

<script>
const REFRESH_MS = __REFRESH_MS__;
let filters = { agent: '', tool: '', status: '' };

function esc(s) {
  return String(s ?? '').replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
}

function ms(v) { return v === '-' ? '-' : Math.round(v) + 'ms'; }
function pct(v) { return v === '-' ? '-' : Number(v).toFixed(1) + '%'; }

function table(id, headers, rows) {
  const head = '<tr>' + headers.map(h => `<th>${esc(h)}</th>`).join('') + '</tr>';
  const body = rows.map(r => '<tr>' + r.map(c => `<td>${esc(c)}</td>`).join('') + '</tr>').join('');
  document.getElementById(id).innerHTML = head + (body || `<tr><td colspan="${headers.length}">no data</td></tr>`);
}

async function api(method, path, body) {
  const opts = { method, headers: {} };
  if (body) {
    opts.headers['Content-Type'] = 'application/json';
    opts.body = JSON.stringify(body);
  }
  const res = await fetch(path, opts);
  const data = await res.json();
  if (!res.ok) throw new Error(data.error || res.statusText);
  return data;
}

async function refresh() {
  const q = new URLSearchParams(filters).toString();
  try {
    const v = await api('GET', '/api/dashboard?' + q);
    render(v);
    document.getElementById('status').textContent = 'updated ' + new Date().toLocaleTimeString();
    document.getElementById('status').className = '';
  } catch (e) {
    document.getElementById('status').textContent = 'refresh failed: ' + e.message;
    document.getElementById('status').className = 'error';
  }
}

function render(v) {
  document.getElementById('total-calls').textContent = v.summary.total_calls;
  document.getElementById('success-rate').textContent = v.summary.success_rate + '%';
  document.getElementById('avg-latency').textContent = v.summary.avg_latency + 'ms';
  document.getElementById('active-agents').textContent = v.summary.active_agents;

  const d = v.status_distribution;
  table('status-table', ['Success', 'Failure', 'Timeout', 'Error'], [[d.success, d.failure, d.timeout, d.error]]);
  table('recent-table', ['Tool', 'Status', 'Agent', 'Latency', 'Time'],
    v.recent_activity.map(c => [c.tool_name, c.call_status, c.agent_id, ms(c.latency_ms ?? 0), new Date(c.timestamp).toLocaleTimeString()]));
  table('usage-table', ['Tool', 'Calls'], v.tool_usage.map(t => [t.tool_name, t.count]));
  table('latency-table', ['Call', 'Latency'], v.latency_series.map(p => [p.label, ms(p.latency_ms)]));

  const p = v.performance;
  document.getElementById('p95').textContent = ms(p.p95_latency);
  document.getElementById('p99').textContent = ms(p.p99_latency);
  document.getElementById('error-rate').textContent = pct(p.error_rate);
  document.getElementById('timeout-rate').textContent = pct(p.timeout_rate);
  table('calls-table', ['Tool', 'Status', 'Latency', 'Agent', 'Session', 'Time'],
    v.calls.map(c => [c.tool_name, c.call_status, ms(c.latency_ms ?? 0), c.agent_id, c.session_id, new Date(c.timestamp).toLocaleString()]));

  table('agents-table', ['Agent', 'Success', 'Avg latency', 'Calls'],
    v.agent_performance.map(a => [a.agent_id, pct(a.success_rate), ms(a.avg_latency), a.total]));
  table('reliability-table', ['Tool', 'Reliability', 'Calls'],
    v.tool_reliability.map(t => [t.tool_name, pct(t.reliability), t.total]));
  table('correlation-table', ['Strength', 'Success rate'],
    v.correlation_points.map(c => [c.x.toFixed(2), c.y.toFixed(2)]));
  table('decisions-table', ['Type', 'Action', 'Agent', 'Confidence', 'Outcome', 'Time'],
    v.recent_decisions.map(d => [d.decision_type, d.chosen_action, d.agent_id, pct(d.confidence_score * 100),
      d.outcome_success ? 'success' : 'failure', new Date(d.timestamp).toLocaleTimeString()]));
}

document.getElementById('filter-form').addEventListener('submit', e => {
  e.preventDefault();
  const f = new FormData(e.target);
  filters = { agent: f.get('agent'), tool: f.get('tool'), status: f.get('status') };
  refresh();
});

document.getElementById('call-form').addEventListener('submit', async e => {
  e.preventDefault();
  const f = Object.fromEntries(new FormData(e.target));
  f.latency_ms = f.latency_ms === '' ? null : parseFloat(f.latency_ms);
  try {
    await api('POST', '/api/calls', f);
    e.target.reset();
    refresh();
  } catch (err) {
    alert('Could not add tool call: ' + err.message);
  }
});

document.getElementById('decision-form').addEventListener('submit', async e => {
  e.preventDefault();
  const f = Object.fromEntries(new FormData(e.target));
  f.confidence_score = parseFloat(f.confidence_score);
  f.outcome_success = f.outcome_success === 'true';
  try {
    await api('POST', '/api/decisions', f);
    e.target.reset();
    refresh();
  } catch (err) {
    alert('Could not add decision: ' + err.message);
  }
});

refresh();
setInterval(refresh, REFRESH_MS);
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_interval_is_substituted() {
        let html = index_html(30);
        assert!(html.contains("const REFRESH_MS = 30000;"));
        assert!(!html.contains(REFRESH_PLACEHOLDER));
    }

    #[test]
    fn zero_refresh_is_clamped_to_one_second() {
        assert!(index_html(0).contains("const REFRESH_MS = 1000;"));
    }

    #[test]
    fn page_renders_recent_decisions() {
        let html = index_html(30);
        assert!(html.contains(r#"<table id="decisions-table"></table>"#));
        assert!(html.contains("v.recent_decisions.map("));
    }
}
