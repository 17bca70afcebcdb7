//! `webterm attach [id]`: interactive session in the local terminal.
//!
//! Resolves which session to use, enters raw mode and hands the terminal to
//! a [`SessionRunner`]. Keystrokes and resize events are read on a blocking
//! thread and forwarded as [`LocalEvent`]s. Ctrl+] detaches.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webterm_client::{LocalEvent, RunOutcome, SessionController, SessionRunner};
use webterm_core::status;

use super::App;
use crate::terminal::{self as term, RawModeGuard, StdoutTerminal};

/// How often the input thread checks whether the session is over.
const INPUT_POLL: Duration = Duration::from_millis(100);

pub async fn run(app: &App, requested: Option<&str>) -> Result<()> {
    let session_id = resolve_session(app, requested).await?;
    app.remember(&session_id);

    let (cols, rows) = term::get_terminal_size();
    info!(session_id = %session_id, cols, rows, "attaching");

    let controller = SessionController::new(session_id.clone(), cols, rows)
        .with_reconnect_delay(app.reconnect_delay);
    let runner = SessionRunner::new(controller, app.control.base().clone(), StdoutTerminal::new());
    let cancel = runner.cancel_token();

    let guard = RawModeGuard::enter()?;
    eprint!("[webterm] attached to {session_id}, press Ctrl+] to detach\r\n");

    let (tx, rx) = mpsc::channel::<LocalEvent>(256);
    let input = tokio::task::spawn_blocking(move || {
        if let Err(e) = read_local_events(&tx) {
            warn!("terminal event error: {e}");
        }
        // Either detach or a read error ends the session for this client.
        cancel.cancel();
    });

    let result = runner.run(rx).await;
    drop(guard);
    // The receiver is gone now, so the input thread exits on its next poll.
    let _ = input.await;

    let (outcome, _scrollback) = result.context("session failed")?;
    match outcome {
        RunOutcome::Ended(reason) => {
            if reason == status::SESSION_EXITED || reason == status::UNKNOWN_SESSION {
                app.forget(&session_id);
            }
            eprintln!("\n[webterm] session {session_id}: {reason}");
        }
        RunOutcome::Abandoned => {
            eprintln!("\n[webterm] detached from {session_id}");
        }
    }
    Ok(())
}

/// The explicit id, else the remembered one if it still exists, else the
/// oldest session, else a new one.
async fn resolve_session(app: &App, requested: Option<&str>) -> Result<String> {
    if let Some(id) = requested {
        return Ok(id.to_string());
    }

    let mut sessions = app
        .control
        .list()
        .await
        .context("failed to list sessions")?;

    if let Some(last) = app.last_session() {
        if sessions.iter().any(|s| s.id == last) {
            debug!(session_id = %last, "reusing last session");
            return Ok(last);
        }
    }

    sessions.sort_by_key(|s| s.created_at);
    if let Some(oldest) = sessions.into_iter().next() {
        return Ok(oldest.id);
    }

    let created = app
        .control
        .create()
        .await
        .context("failed to create session")?;
    info!(session_id = %created.id, "created session");
    Ok(created.id)
}

/// Forward terminal events until detach, or until the runner stops listening.
fn read_local_events(tx: &mpsc::Sender<LocalEvent>) -> std::io::Result<()> {
    while !tx.is_closed() {
        if !event::poll(INPUT_POLL)? {
            continue;
        }
        let local = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Release => continue,
            Event::Key(key) if term::is_detach_key(&key) => return Ok(()),
            Event::Key(key) => match term::key_event_to_bytes(&key) {
                Some(data) => LocalEvent::Input(data),
                None => continue,
            },
            Event::Paste(text) => LocalEvent::Input(text),
            Event::Resize(cols, rows) => LocalEvent::Resize { cols, rows },
            _ => continue,
        };
        if tx.blocking_send(local).is_err() {
            break;
        }
    }
    Ok(())
}
