/// Configuration system for telemetry-hub.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults** — [`schema::HubConfig::default()`]
/// 2. **User global config** — `~/.telemetry-hub/config.toml`
/// 3. **Project local config** — `.telemetry-hub.toml` in the current directory
/// 4. **Environment variables** — `TELEMETRY_HUB_*` overrides (highest precedence)
///
/// Later layers override earlier ones key by key: a file that only sets
/// `correlation.window_ms` leaves every other value from the previous layer
/// intact.
///
/// # Usage
///
/// ```rust,ignore
/// use telemetry_hub::config;
///
/// let cfg = config::load().logged();
/// let window = cfg.correlation.window_ms;
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

pub use schema::HubConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// A resolved configuration and the problems met while resolving it.
///
/// Loading runs before tracing is initialized, so warnings are collected
/// here and logged by the caller once a subscriber exists.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub config: HubConfig,
    pub warnings: Vec<String>,
}

impl Loaded {
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            warn!("{warning}");
        }
    }

    /// Log the warnings and keep the config.
    pub fn logged(self) -> HubConfig {
        self.log_warnings();
        self.config
    }
}

/// Load the fully resolved configuration.
///
/// Merges defaults → global TOML → project TOML → env vars. Malformed files
/// and unusable values are reported in [`Loaded::warnings`] and skipped so a
/// bad edit never stops the dashboard.
pub fn load() -> Loaded {
    load_from(global_config_path(), project_config_path())
}

/// Load with explicit file locations (either may be `None`).
pub fn load_from(global: Option<PathBuf>, project: Option<PathBuf>) -> Loaded {
    resolve([global, project], |key| std::env::var(key).ok())
}

fn resolve(files: [Option<PathBuf>; 2], var: impl Fn(&str) -> Option<String>) -> Loaded {
    let mut warnings = Vec::new();
    let mut config = merge_files(files, &mut warnings);
    apply_env_overrides(&mut config, var);
    warnings.extend(config.sanitize());
    Loaded { config, warnings }
}

fn merge_files(files: [Option<PathBuf>; 2], warnings: &mut Vec<String>) -> HubConfig {
    let mut merged = match toml::Value::try_from(HubConfig::default()) {
        Ok(value) => value,
        Err(_) => return HubConfig::default(),
    };

    for path in files.into_iter().flatten() {
        if let Some(layer) = read_toml_layer(&path, warnings) {
            merge_values(&mut merged, layer);
        }
    }

    merged.try_into().unwrap_or_else(|e| {
        warnings.push(format!("merged config is invalid, using defaults: {e}"));
        HubConfig::default()
    })
}

/// Read a TOML file as a raw value tree. Missing files yield `None` silently.
fn read_toml_layer(path: &Path, warnings: &mut Vec<String>) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str::<toml::Value>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warnings.push(format!(
                "ignoring malformed config file {}: {e}",
                path.display()
            ));
            None
        }
    }
}

/// Recursively overlay `overlay` onto `base`. Tables merge key by key;
/// any other value replaces the base value.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.telemetry-hub/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".telemetry-hub").join("config.toml"))
}

/// Path to the project local config: `.telemetry-hub.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".telemetry-hub.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `TELEMETRY_HUB_DATA_DIR` — store data directory
/// - `TELEMETRY_HUB_READ_LIMIT` — records read per table
/// - `TELEMETRY_HUB_WINDOW_MS` — correlation window
/// - `TELEMETRY_HUB_DEDUPE` — upsert correlations (`1`/`true`/`yes`/`on`)
/// - `TELEMETRY_HUB_ADDR` — dashboard listen address
/// - `TELEMETRY_HUB_LOG_LEVEL` — tracing filter directive
/// - `TELEMETRY_HUB_LOG_FORMAT` — `pretty` or `json`
fn apply_env_overrides(config: &mut HubConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("TELEMETRY_HUB_DATA_DIR")
        && !val.is_empty()
    {
        config.store.data_dir = Some(val);
    }
    if let Some(val) = var("TELEMETRY_HUB_READ_LIMIT")
        && let Ok(n) = val.parse::<usize>()
    {
        config.store.read_limit = n;
    }
    if let Some(val) = var("TELEMETRY_HUB_WINDOW_MS")
        && let Ok(ms) = val.parse::<i64>()
    {
        config.correlation.window_ms = ms;
    }
    if let Some(val) = var("TELEMETRY_HUB_DEDUPE") {
        config.correlation.dedupe = is_truthy(&val);
    }
    if let Some(val) = var("TELEMETRY_HUB_ADDR")
        && !val.is_empty()
    {
        config.web.addr = val;
    }
    if let Some(val) = var("TELEMETRY_HUB_LOG_LEVEL")
        && !val.is_empty()
    {
        config.logging.level = val;
    }
    if let Some(val) = var("TELEMETRY_HUB_LOG_FORMAT")
        && let Some(format) = parse_log_format(&val)
    {
        config.logging.format = format;
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_log_format(val: &str) -> Option<schema::LogFormat> {
    match val.to_ascii_lowercase().as_str() {
        "pretty" | "text" => Some(schema::LogFormat::Pretty),
        "json" => Some(schema::LogFormat::Json),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.telemetry-hub/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.telemetry-hub/ directory")?;
    }

    fs::write(&path, HubConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key in the global config file.
///
/// Supports dotted keys like `correlation.window_ms`. When the file does not
/// exist yet it is created from the defaults first.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    set_config_value_at(&path, key, value)
}

/// Set a dotted key in the config file at `path`.
pub fn set_config_value_at(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut root: toml::Value = if path.exists() {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        toml::Value::try_from(HubConfig::default()).context("failed to serialize default config")?
    };

    set_toml_value(&mut root, key, value)?;

    // Reject edits that would make the file unloadable.
    let mut candidate: HubConfig = root
        .clone()
        .try_into()
        .with_context(|| format!("invalid value for '{key}': {value}"))?;
    if let Some(problem) = candidate.sanitize().into_iter().next() {
        anyhow::bail!("invalid value for '{key}': {problem}");
    }

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
///
/// The value's type comes from the existing entry, or from the built-in
/// defaults when the file does not set the key yet. Sections missing from
/// the file are created if they exist in the defaults. Keys with no typed
/// default (such as an unset `store.data_dir`) are stored as strings.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("config key must look like 'section.key', got '{key}'");
    }
    let (leaf, sections) = parts.split_last().context("empty config key")?;

    let defaults =
        toml::Value::try_from(HubConfig::default()).context("failed to serialize default config")?;
    let mut default_node = Some(&defaults);
    for &part in sections {
        default_node = default_node.and_then(|node| node.get(part));
    }
    let default_leaf = default_node.and_then(|node| node.get(*leaf)).cloned();

    let mut current = root;
    for &part in sections {
        let table = current
            .as_table_mut()
            .with_context(|| format!("expected table above '{part}' in '{key}'"))?;
        if !table.contains_key(part) {
            if default_node.is_none() {
                anyhow::bail!("config key not found: section '{part}' in '{key}'");
            }
            table.insert(part.to_string(), toml::Value::Table(toml::map::Map::new()));
        }
        current = table
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf).or(default_leaf.as_ref()) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load().config;
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
