use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

use ticketbridge::commands::{
    OutputOptions, SyncOptions, cmd_config_check, cmd_config_show, cmd_sync,
};
use ticketbridge::config::SyncConfig;

#[derive(Parser)]
#[command(name = "ticketbridge")]
#[command(about = "Reconcile local tickets with a remote ticketing system")]
#[command(version)]
struct Cli {
    /// Log sync decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the YAML config (default: $TICKETBRIDGE_CONFIG or ticketbridge.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl CommonArgs {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(SyncConfig::config_path)
    }

    fn output(&self) -> OutputOptions {
        OutputOptions { json: self.json }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a local ticket (JSON file) with its remote counterpart
    Sync {
        /// Path to the local ticket JSON file
        ticket: PathBuf,

        /// Write the updated ticket here instead of back to TICKET
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Account the configuration belongs to
        #[arg(long)]
        account: Option<Uuid>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Check for missing settings and inconsistent mappings
    Check {
        #[command(flatten)]
        common: CommonArgs,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Sync {
            ticket,
            output,
            account,
            common,
        } => {
            cmd_sync(
                SyncOptions {
                    ticket_path: ticket,
                    config_path: common.config_path(),
                    output_path: output,
                    account_id: account,
                },
                common.output(),
            )
            .await
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { common } => cmd_config_show(&common.config_path(), common.output()),
            ConfigAction::Check { common } => {
                cmd_config_check(&common.config_path(), common.output())
            }
        },
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
