mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use clipserve::init_logging;

#[derive(Parser)]
#[command(name = "clipserve", version, about = "Local command-execution server")]
struct Cli {
    /// Unix socket the server listens on
    #[arg(long, global = true, env = "CLIPSERVE_SOCKET", value_name = "PATH")]
    socket: Option<PathBuf>,

    /// SQLite database holding action data
    #[arg(short = 'd', long = "db", global = true, env = "CLIPSERVE_DB", value_name = "PATH")]
    store: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for client commands
    Serve {
        /// Seconds to wait for a client's standard input
        #[arg(long = "input-timeout", value_name = "SECS", default_value_t = 30)]
        input_timeout: u64,
    },
    /// Inspect and edit stored action data
    Action {
        #[command(subcommand)]
        command: ActionCommand,
    },
}

#[derive(Subcommand)]
pub(crate) enum ActionCommand {
    /// List action ids that have stored data
    List,
    /// Print the data stored for an action
    Show {
        id: i64,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a text value under KEY
    Set { id: i64, key: String, value: String },
    /// Remove all data stored for an action
    Clear { id: i64 },
}

pub(crate) fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    match cli.command {
        Command::Serve { input_timeout } => {
            commands::cmd_serve(cli.socket, cli.store.as_deref(), input_timeout)
        }
        Command::Action { command } => {
            let store_path = commands::require_store_path(cli.store.as_deref())?;
            commands::cmd_action(store_path, command)
        }
    }
}
