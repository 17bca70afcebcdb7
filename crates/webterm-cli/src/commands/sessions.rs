//! `webterm list` / `webterm new` / `webterm kill`.

use anyhow::{Context, Result};
use tracing::info;

use super::App;

/// Print every session on the server, oldest first. The remembered session
/// is marked with `*`.
pub async fn run_list(app: &App) -> Result<()> {
    let mut sessions = app
        .control
        .list()
        .await
        .context("failed to list sessions")?;
    sessions.sort_by_key(|s| s.created_at);

    if sessions.is_empty() {
        println!("no sessions");
        return Ok(());
    }

    let last = app.last_session();
    println!("  {:<38} CREATED", "ID");
    for s in &sessions {
        let mark = if last.as_deref() == Some(s.id.as_str()) { '*' } else { ' ' };
        println!(
            "{mark} {:<38} {}",
            s.id,
            s.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

/// Create a session and print its id. Returns the id.
pub async fn run_new(app: &App) -> Result<String> {
    let session = app
        .control
        .create()
        .await
        .context("failed to create session")?;
    info!(session_id = %session.id, "created session");
    app.remember(&session.id);
    println!("{}", session.id);
    Ok(session.id)
}

pub async fn run_kill(app: &App, session_id: &str) -> Result<()> {
    app.control
        .delete(session_id)
        .await
        .with_context(|| format!("failed to kill session {session_id}"))?;
    app.forget(session_id);
    info!(session_id, "killed session");
    Ok(())
}
