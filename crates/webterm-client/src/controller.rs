//! Per-session client logic as an explicit state machine.
//!
//! The controller never performs I/O. Callers feed it [`Event`]s and carry
//! out the [`Action`]s it returns, in order. This keeps the reconnect and
//! replay rules testable without a network or a terminal.
//!
//! ```text
//! Disconnected --start/timer--> Connecting --connected--> Connected
//!      ^                            |                         |
//!      +------- failed / lost ------+-------------------------+
//!
//! any --terminal status / abandon--> Closed
//! ```

use std::time::Duration;
use webterm_core::{status, ClientMessage, ServerMessage};

use crate::scrollback::ScrollbackBuffer;

/// Fixed delay between a lost connection and the next attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Connection lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: the session is gone or the user abandoned it.
    Closed,
}

/// Inputs to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Begin the first connection attempt.
    Start,
    /// The channel opened.
    Connected,
    /// The connection attempt failed.
    ConnectFailed(String),
    /// A decoded frame from the server.
    Message(ServerMessage),
    /// A text frame that was not a protocol message. Shown as-is.
    RawText(String),
    /// The open channel closed or errored.
    ConnectionLost,
    ReconnectTimerElapsed,
    /// Keystrokes from the local terminal.
    LocalInput(String),
    /// Local terminal geometry changed (already debounced).
    LocalResize { cols: u16, rows: u16 },
    /// The user is done with this session.
    Abandon,
}

/// Side effects requested by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Open a channel to the session.
    Connect { session_id: String },
    /// Close the open channel, if any.
    Disconnect,
    Send(ClientMessage),
    /// Write text to the terminal.
    Render(String),
    /// Clear the terminal and seed it with `replay` before anything else.
    ResetTerminal { replay: String },
    /// Inline client-side notice. Not stored in the scrollback.
    Notice(String),
    ScheduleReconnect(Duration),
    /// The session ended with this status; nothing more will happen.
    ShowStatus(String),
}

/// Reconnecting controller for a single session id.
#[derive(Debug)]
pub struct SessionController {
    session_id: String,
    state: ConnectionState,
    scrollback: ScrollbackBuffer,
    cols: u16,
    rows: u16,
    reconnect_delay: Duration,
    /// Consecutive failed attempts since the last successful connect.
    failures: u32,
}

impl SessionController {
    pub fn new(session_id: impl Into<String>, cols: u16, rows: u16) -> Self {
        Self {
            session_id: session_id.into(),
            state: ConnectionState::Disconnected,
            scrollback: ScrollbackBuffer::default(),
            cols,
            rows,
            reconnect_delay: RECONNECT_DELAY,
            failures: 0,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Start from an existing buffer, e.g. when switching back to a session.
    pub fn with_scrollback(mut self, scrollback: ScrollbackBuffer) -> Self {
        self.scrollback = scrollback;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn scrollback(&self) -> &ScrollbackBuffer {
        &self.scrollback
    }

    pub fn into_scrollback(self) -> ScrollbackBuffer {
        self.scrollback
    }

    pub fn geometry(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Apply one event and return the actions to perform, in order.
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        use ConnectionState::*;

        match (self.state, event) {
            (Closed, _) => Vec::new(),

            (_, Event::Abandon) => {
                self.state = Closed;
                vec![Action::Disconnect]
            }

            (Disconnected, Event::Start | Event::ReconnectTimerElapsed) => {
                self.state = Connecting;
                vec![Action::Connect {
                    session_id: self.session_id.clone(),
                }]
            }

            (Connecting, Event::Connected) => {
                self.state = Connected;
                self.failures = 0;
                vec![
                    Action::ResetTerminal {
                        replay: self.scrollback.as_str().to_string(),
                    },
                    Action::Send(ClientMessage::resize(self.cols, self.rows)),
                ]
            }

            (Connecting, Event::ConnectFailed(reason)) => {
                self.state = Disconnected;
                self.failures += 1;
                let mut actions = Vec::new();
                // Only the first failure of a streak is worth telling the user.
                if self.failures == 1 {
                    actions.push(Action::Notice(format!(
                        "\r\n[client] cannot reach session ({reason}), retrying every {}ms\r\n",
                        self.reconnect_delay.as_millis()
                    )));
                }
                actions.push(Action::ScheduleReconnect(self.reconnect_delay));
                actions
            }

            (Connecting | Connected, Event::ConnectionLost) => {
                let was_connected = self.state == Connected;
                self.state = Disconnected;
                let mut actions = vec![Action::Disconnect];
                if was_connected {
                    actions.push(Action::Notice(
                        "\r\n[client] connection lost, reconnecting...\r\n".to_string(),
                    ));
                }
                actions.push(Action::ScheduleReconnect(self.reconnect_delay));
                actions
            }

            (Connected, Event::Message(ServerMessage::Output { data })) => self.render(data),

            (Connected, Event::RawText(text)) => self.render(text),

            (Connected, Event::Message(ServerMessage::Status { status: text })) => {
                let line = format!("\r\n[server] {text}");
                self.scrollback.append(&line);
                let mut actions = vec![Action::Render(format!("{line}\r\n"))];
                if status::is_terminal(&text) {
                    self.state = Closed;
                    actions.push(Action::Disconnect);
                    actions.push(Action::ShowStatus(text));
                }
                actions
            }

            (Connected, Event::LocalInput(data)) => {
                vec![Action::Send(ClientMessage::input(data))]
            }

            (state, Event::LocalResize { cols, rows }) => {
                self.cols = cols;
                self.rows = rows;
                if state == Connected {
                    vec![Action::Send(ClientMessage::resize(cols, rows))]
                } else {
                    Vec::new()
                }
            }

            // Input while disconnected is dropped, as are stale frames and
            // timers that no longer apply.
            _ => Vec::new(),
        }
    }

    fn render(&mut self, text: String) -> Vec<Action> {
        if text.is_empty() {
            return Vec::new();
        }
        self.scrollback.append(&text);
        vec![Action::Render(text)]
    }
}
