use anyhow::Result;
use clap::{Parser, Subcommand};

use telemetry_hub::cli::{self, OutputFormat};
use telemetry_hub::config;
use telemetry_hub::logging;
use telemetry_hub::store::JsonlStore;
use telemetry_hub::telemetry::model::{CallStatus, NewDecision, NewToolCall};
use telemetry_hub::web::{self, AppContext};

#[derive(Debug, Parser)]
#[command(name = "telemetry-hub")]
#[command(about = "Agent tool-call telemetry with decision correlation and a web dashboard")]
#[command(version)]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the web dashboard
    Serve {
        /// Listen address (default: web.addr from config)
        #[arg(long)]
        addr: Option<String>,
        /// Do not open a browser window
        #[arg(long)]
        no_open: bool,
    },
    /// Show summary, performance metrics, and breakdowns
    Stats {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// List tool calls matching the filters
    Calls {
        #[command(flatten)]
        filter: FilterArgs,
        /// Maximum rows to show (default: dashboard.table_rows)
        #[arg(long)]
        limit: Option<usize>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// List the most recent agent decisions
    Decisions {
        /// Maximum rows to show (default: dashboard.recent_decisions)
        #[arg(long)]
        limit: Option<usize>,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show stored decision/tool-call correlations
    Correlations {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Recompute correlations from stored calls and decisions
    Correlate {
        /// Compute without writing
        #[arg(long)]
        dry_run: bool,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Record a tool call or an agent decision
    Record {
        #[command(subcommand)]
        record: RecordCommand,
    },
    /// Check config files and data tables
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Args)]
struct FilterArgs {
    /// Only calls by this agent (case-insensitive)
    #[arg(long)]
    agent: Option<String>,
    /// Only calls to this tool (case-insensitive)
    #[arg(long)]
    tool: Option<String>,
    /// Only calls with this status: success, failure, timeout, error
    #[arg(long)]
    status: Option<String>,
}

#[derive(Debug, Subcommand)]
enum RecordCommand {
    /// Record a tool call
    Call {
        #[arg(long)]
        tool: String,
        /// success, failure, timeout, or error
        #[arg(long)]
        status: String,
        /// Latency in milliseconds
        #[arg(long)]
        latency: Option<f64>,
        #[arg(long)]
        agent: String,
        #[arg(long)]
        session: String,
        #[arg(long, default_value = "")]
        params: String,
        #[arg(long, default_value = "")]
        error: String,
        #[arg(long, default_value = "")]
        response: String,
    },
    /// Record an agent decision
    Decision {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        session: String,
        #[arg(long, default_value = "")]
        decision_type: String,
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long, default_value = "")]
        action: String,
        /// Confidence in [0, 1]
        #[arg(long)]
        confidence: f64,
        /// The decision's outcome was successful
        #[arg(long)]
        outcome_success: bool,
        /// Ids of tool calls the decision refers to
        #[arg(long = "related", num_args = 1..)]
        related: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `correlation.window_ms 30000`
    Set { key: String, value: String },
    /// Reset the config file to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    let loaded = config::load();
    logging::init(&loaded.config.logging);
    loaded.log_warnings();
    let mut cfg = loaded.config;

    match app.command {
        // Config subcommands work without a data directory.
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
        Commands::Serve { addr, no_open } => {
            let store = JsonlStore::from_config(&cfg.store)?;
            let addr = addr.unwrap_or_else(|| cfg.web.addr.clone());
            if no_open {
                cfg.web.open_browser = false;
            }
            web::serve(AppContext::new(cfg, store), &addr)
        }
        Commands::Stats { filter, format } => {
            let store = JsonlStore::from_config(&cfg.store)?;
            let filter = filter.parse()?;
            cli::run_stats(&cfg, &store, &filter, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Calls {
            filter,
            limit,
            format,
        } => {
            let store = JsonlStore::from_config(&cfg.store)?;
            let filter = filter.parse()?;
            let limit = limit.unwrap_or(cfg.dashboard.table_rows);
            cli::run_calls(
                &cfg,
                &store,
                &filter,
                limit,
                OutputFormat::from_str_opt(Some(&format)),
            )
        }
        Commands::Decisions { limit, format } => {
            let store = JsonlStore::from_config(&cfg.store)?;
            let limit = limit.unwrap_or(cfg.dashboard.recent_decisions);
            cli::run_decisions(&cfg, &store, limit, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Correlations { format } => {
            let store = JsonlStore::from_config(&cfg.store)?;
            cli::run_correlations(&cfg, &store, OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Correlate { dry_run, format } => {
            let store = JsonlStore::from_config(&cfg.store)?;
            cli::run_correlate(
                &cfg,
                &store,
                dry_run,
                OutputFormat::from_str_opt(Some(&format)),
            )
        }
        Commands::Record { record } => {
            let store = JsonlStore::from_config(&cfg.store)?;
            match record {
                RecordCommand::Call {
                    tool,
                    status,
                    latency,
                    agent,
                    session,
                    params,
                    error,
                    response,
                } => {
                    let draft = NewToolCall {
                        tool_name: tool,
                        call_status: status.parse::<CallStatus>()?,
                        latency_ms: latency,
                        agent_id: agent,
                        session_id: session,
                        parameters: params,
                        error_message: error,
                        timestamp: None,
                        response_data: response,
                    };
                    cli::run_record_call(&cfg, &store, draft)
                }
                RecordCommand::Decision {
                    agent,
                    session,
                    decision_type,
                    context,
                    action,
                    confidence,
                    outcome_success,
                    related,
                } => {
                    let draft = NewDecision {
                        agent_id: agent,
                        session_id: session,
                        decision_type,
                        decision_context: context,
                        chosen_action: action,
                        confidence_score: confidence,
                        outcome_success,
                        timestamp: None,
                        related_tool_calls: related,
                    };
                    cli::run_record_decision(&cfg, &store, draft)
                }
            }
        }
        Commands::Health => {
            let store = JsonlStore::from_config(&cfg.store)?;
            cli::run_health(&cfg, &store)
        }
    }
}

impl FilterArgs {
    fn parse(&self) -> Result<telemetry_hub::telemetry::CallFilter> {
        cli::parse_filter(
            self.agent.as_deref(),
            self.tool.as_deref(),
            self.status.as_deref(),
        )
    }
}
