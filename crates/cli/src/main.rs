mod config;
mod lifecycle;
mod replay;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use dpp_engine::DeploymentConfig;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Digital Product Passport ledger tools.
#[derive(Parser)]
#[command(name = "dpp", version, about = "Digital Product Passport ledger tools")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Deployment configuration file (.toml or .json); built-in tables if omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the deployment configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Query the lifecycle graph
    Lifecycle {
        #[command(subcommand)]
        command: LifecycleCommands,
    },

    /// Run a scripted sequence of invocations against a fresh in-memory ledger
    Replay {
        /// Path to the JSON replay script
        script: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Load the configuration and report unusable entries
    Check,
    /// Print the effective configuration, defaults filled in
    Show,
}

#[derive(Subcommand)]
enum LifecycleCommands {
    /// Print every stage and its successors
    Graph,
    /// Check whether one stage may move directly to another
    Check {
        /// Current stage
        from: String,
        /// Requested stage
        to: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let deployment = load_config(cli.config.as_deref(), cli.output, cli.quiet);

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Check => config::cmd_check(&deployment, cli.output, cli.quiet),
            ConfigCommands::Show => config::cmd_show(&deployment, cli.output, cli.quiet),
        },
        Commands::Lifecycle { command } => match command {
            LifecycleCommands::Graph => lifecycle::cmd_graph(&deployment, cli.output, cli.quiet),
            LifecycleCommands::Check { from, to } => {
                lifecycle::cmd_check(&deployment, &from, &to, cli.output, cli.quiet)
            }
        },
        Commands::Replay { script } => {
            replay::cmd_replay(&script, &deployment, cli.output, cli.quiet);
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> DeploymentConfig {
    let Some(path) = path else {
        return DeploymentConfig::default();
    };
    match DeploymentConfig::load(path) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "configuration loaded");
            config
        }
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

/// Report an error message in the appropriate output format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Print a JSON value to stdout, pretty-printed.
pub(crate) fn print_json(value: &impl serde::Serialize, output: OutputFormat, quiet: bool) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            report_error(&format!("serialization error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}
