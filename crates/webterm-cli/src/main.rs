//! webterm: command-line client for a webterm server.
//!
//! Lists, creates and kills sessions through the Control API and attaches
//! the local terminal to a session with transparent reconnects.

mod commands;
mod config;
mod terminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;
use webterm_client::{ControlClient, LastSession};

use commands::App;

/// webterm: remote terminal sessions
#[derive(Parser)]
#[command(name = "webterm", version, about = "Client for webterm remote terminal sessions")]
struct Cli {
    /// Server base URL, e.g. http://localhost:4001 or https://host/terminal
    #[arg(short, long, global = true, env = "WEBTERM_SERVER")]
    server: Option<String>,

    /// Delay between reconnect attempts, in milliseconds
    #[arg(long, global = true)]
    reconnect_delay_ms: Option<u64>,

    /// Config file path (default: ~/.webterm/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List sessions on the server
    #[command(alias = "ls")]
    List,

    /// Create a new session and print its id
    New {
        /// Attach to the new session right away
        #[arg(short, long)]
        attach: bool,
    },

    /// Kill a session
    Kill {
        /// Session id
        session: String,
    },

    /// Attach the local terminal to a session (Ctrl+] detaches)
    Attach {
        /// Session id; defaults to the last one used
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix into the raw terminal stream.
    let filter = if cli.verbose {
        "webterm=debug,webterm_cli=debug,webterm_client=debug,webterm_core=debug"
    } else {
        "webterm=warn,webterm_cli=warn,webterm_client=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("webterm: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = match cli.config.or_else(config::Config::default_path) {
        Some(path) => config::Config::load(&path)?,
        None => config::Config::default(),
    };

    let server = cli.server.unwrap_or(cfg.default.server.clone());
    let reconnect_delay = cli
        .reconnect_delay_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| cfg.default.reconnect_delay());

    let app = App {
        control: ControlClient::new(&server).context("invalid --server")?,
        reconnect_delay,
        last: LastSession::default_path().map(LastSession::new),
    };

    match cli.command {
        Command::List => commands::sessions::run_list(&app).await,
        Command::New { attach } => {
            let id = commands::sessions::run_new(&app).await?;
            if attach {
                commands::attach::run(&app, Some(&id)).await?;
            }
            Ok(())
        }
        Command::Kill { session } => commands::sessions::run_kill(&app, &session).await,
        Command::Attach { session } => commands::attach::run(&app, session.as_deref()).await,
    }
}
