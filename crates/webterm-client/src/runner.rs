//! Async driver for a [`SessionController`].
//!
//! Owns the channel, the reconnect timer and the resize debounce, turns
//! their completions into controller events, and carries out the
//! resulting actions against a [`TerminalSink`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use webterm_core::TermResult;

use crate::controller::{Action, ConnectionState, Event, SessionController};
use crate::scrollback::ScrollbackBuffer;
use crate::transport::{channel_url, Channel, Incoming};

/// Local resizes are coalesced to one per frame (~60 Hz).
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(16);

/// Where session output ends up.
pub trait TerminalSink {
    /// Clear the terminal and write `replay` into it.
    fn reset(&mut self, replay: &str) -> TermResult<()>;

    /// Write session output.
    fn write(&mut self, text: &str) -> TermResult<()>;

    /// Write a client-side notice.
    fn notice(&mut self, text: &str) -> TermResult<()> {
        self.write(text)
    }

    /// The session is over; show why.
    fn show_status(&mut self, status: &str) -> TermResult<()>;
}

/// Input from the local terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEvent {
    Input(String),
    Resize { cols: u16, rows: u16 },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The server reported a terminal status such as `"session exited"`.
    Ended(String),
    /// The user cancelled or closed the local input.
    Abandoned,
}

type ConnectFuture = Pin<Box<dyn Future<Output = TermResult<Channel>> + Send>>;

/// In-flight I/O owned by a run.
#[derive(Default)]
struct Io {
    channel: Option<Channel>,
    connecting: Option<ConnectFuture>,
    reconnect: Option<Pin<Box<Sleep>>>,
    resize_timer: Option<Pin<Box<Sleep>>>,
    pending_resize: Option<(u16, u16)>,
    outcome: Option<RunOutcome>,
}

/// Drives one session until it ends or is abandoned.
pub struct SessionRunner<T> {
    controller: SessionController,
    base: Url,
    terminal: T,
    cancel: CancellationToken,
    resize_debounce: Duration,
}

impl<T: TerminalSink + Send> SessionRunner<T> {
    /// `base` is the server URL the channel URL is derived from.
    pub fn new(controller: SessionController, base: Url, terminal: T) -> Self {
        Self {
            controller,
            base,
            terminal,
            cancel: CancellationToken::new(),
            resize_debounce: RESIZE_DEBOUNCE,
        }
    }

    /// Token that abandons the session when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until the session ends or is abandoned. Returns the outcome and
    /// the scrollback so a later run can replay it.
    pub async fn run(
        mut self,
        mut local: mpsc::Receiver<LocalEvent>,
    ) -> TermResult<(RunOutcome, ScrollbackBuffer)> {
        let mut io = Io::default();
        info!(session_id = %self.controller.session_id(), "attaching");
        self.dispatch(&mut io, Event::Start).await?;

        while self.controller.state() != ConnectionState::Closed {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => Event::Abandon,

                result = poll_slot(&mut io.connecting) => {
                    io.connecting = None;
                    match result {
                        Ok(channel) => {
                            io.channel = Some(channel);
                            Event::Connected
                        }
                        Err(e) => Event::ConnectFailed(e.to_string()),
                    }
                }

                _ = poll_slot(&mut io.reconnect) => {
                    io.reconnect = None;
                    Event::ReconnectTimerElapsed
                }

                frame = recv_slot(&mut io.channel) => match frame {
                    Some(Incoming::Message(msg)) => Event::Message(msg),
                    Some(Incoming::Raw(text)) => Event::RawText(text),
                    None => {
                        io.channel = None;
                        Event::ConnectionLost
                    }
                },

                _ = poll_slot(&mut io.resize_timer) => {
                    io.resize_timer = None;
                    match io.pending_resize.take() {
                        Some((cols, rows)) => Event::LocalResize { cols, rows },
                        None => continue,
                    }
                }

                local_event = local.recv() => match local_event {
                    Some(LocalEvent::Input(data)) => Event::LocalInput(data),
                    Some(LocalEvent::Resize { cols, rows }) => {
                        io.pending_resize = Some((cols, rows));
                        if io.resize_timer.is_none() {
                            io.resize_timer = Some(Box::pin(tokio::time::sleep(self.resize_debounce)));
                        }
                        continue;
                    }
                    None => Event::Abandon,
                },
            };

            self.dispatch(&mut io, event).await?;
        }

        let outcome = io.outcome.take().unwrap_or(RunOutcome::Abandoned);
        info!(session_id = %self.controller.session_id(), ?outcome, "detached");
        Ok((outcome, self.controller.into_scrollback()))
    }

    /// Feed `event` to the controller and perform what it asks for.
    async fn dispatch(&mut self, io: &mut Io, event: Event) -> TermResult<()> {
        for action in self.controller.handle(event) {
            match action {
                Action::Connect { session_id } => {
                    let url = channel_url(&self.base, &session_id)?;
                    debug!(%url, "connecting");
                    io.connecting = Some(Box::pin(async move { Channel::connect(&url).await }));
                }
                Action::Disconnect => {
                    io.connecting = None;
                    io.reconnect = None;
                    if let Some(channel) = io.channel.take() {
                        channel.close().await;
                    }
                }
                Action::Send(msg) => {
                    // A broken channel is noticed by the receive side, after
                    // any frames the server already sent have been read.
                    if let Some(channel) = io.channel.as_mut() {
                        if let Err(e) = channel.send(&msg).await {
                            debug!(error = %e, "send failed");
                        }
                    }
                }
                Action::Render(text) => self.terminal.write(&text)?,
                Action::ResetTerminal { replay } => self.terminal.reset(&replay)?,
                Action::Notice(text) => self.terminal.notice(&text)?,
                Action::ScheduleReconnect(delay) => {
                    io.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Action::ShowStatus(status) => {
                    self.terminal.show_status(&status)?;
                    io.outcome = Some(RunOutcome::Ended(status));
                }
            }
        }
        Ok(())
    }
}

/// Await the future in `slot`, or never resolve if the slot is empty.
async fn poll_slot<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn recv_slot(channel: &mut Option<Channel>) -> Option<Incoming> {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}
