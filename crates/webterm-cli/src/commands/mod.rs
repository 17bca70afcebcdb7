//! CLI subcommand implementations.

pub mod attach;
pub mod sessions;

use std::time::Duration;
use webterm_client::{ControlClient, LastSession};

/// Everything a subcommand needs, resolved from flags and config.
pub struct App {
    pub control: ControlClient,
    pub reconnect_delay: Duration,
    /// `None` when there is no home directory to keep it in.
    pub last: Option<LastSession>,
}

impl App {
    /// Remember `session_id` for the next bare `webterm attach`.
    pub fn remember(&self, session_id: &str) {
        if let Some(last) = &self.last {
            if let Err(e) = last.save(session_id) {
                tracing::warn!(error = %e, "could not save last session");
            }
        }
    }

    pub fn forget(&self, session_id: &str) {
        if let Some(last) = &self.last {
            if let Err(e) = last.forget(session_id) {
                tracing::warn!(error = %e, "could not clear last session");
            }
        }
    }

    pub fn last_session(&self) -> Option<String> {
        self.last.as_ref().and_then(LastSession::load)
    }
}
