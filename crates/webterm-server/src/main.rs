//! webterm-server: remote terminal session server.
//!
//! Serves the Control API under `/api` and the viewer channel at `/ws`,
//! optionally nested below a base path for a reverse proxy.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use webterm_server::{CliOverrides, ServerConfig, TermServer};

/// webterm-server: remote terminal session server
#[derive(Parser, Debug)]
#[command(name = "webterm-server", version, about = "Remote terminal session server")]
struct Cli {
    /// Listen port
    #[arg(short, long, env = "TERMINAL_PORT")]
    port: Option<u16>,

    /// Listen address
    #[arg(long)]
    host: Option<String>,

    /// Route prefix, e.g. /terminal
    #[arg(long)]
    base_path: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.webterm/server.toml")]
    config: String,

    /// Maximum concurrent sessions
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Shell to spawn for new sessions (default: $SHELL, then bash)
    #[arg(long)]
    shell: Option<String>,

    /// Preferred start directory for new shells
    #[arg(long)]
    start_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting webterm-server");

    let config_path = PathBuf::from(&cli.config);
    let overrides = CliOverrides {
        host: cli.host,
        port: cli.port,
        base_path: cli.base_path,
        max_sessions: cli.max_sessions,
        shell: cli.shell,
        start_dir: cli.start_dir,
    };
    let server_config = match ServerConfig::load(Some(&config_path), overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let server = TermServer::new(server_config);
    if let Err(e) = server.run(shutdown_signal()).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("received shutdown signal");
}
