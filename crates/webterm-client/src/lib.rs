//! webterm-client: client library for webterm sessions.
//!
//! Provides the Control API client, a reconnecting per-session controller
//! with a bounded scrollback that is replayed into a fresh terminal after
//! every reconnect, and the async runner that drives it over WebSocket.
//!
//! # Quick Start
//!
//! ```no_run
//! use webterm_client::{ControlClient, SessionController, SessionRunner, TerminalSink};
//!
//! struct Print;
//! impl TerminalSink for Print {
//!     fn reset(&mut self, replay: &str) -> webterm_core::TermResult<()> {
//!         print!("{replay}");
//!         Ok(())
//!     }
//!     fn write(&mut self, text: &str) -> webterm_core::TermResult<()> {
//!         print!("{text}");
//!         Ok(())
//!     }
//!     fn show_status(&mut self, status: &str) -> webterm_core::TermResult<()> {
//!         eprintln!("{status}");
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> webterm_core::TermResult<()> {
//! let control = ControlClient::new("http://localhost:4001")?;
//! let session = control.create().await?;
//!
//! let (_input_tx, input_rx) = tokio::sync::mpsc::channel(64);
//! let controller = SessionController::new(session.id, 80, 24);
//! let runner = SessionRunner::new(controller, control.base().clone(), Print);
//! let (outcome, _scrollback) = runner.run(input_rx).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod controller;
pub mod runner;
pub mod scrollback;
pub mod state;
pub mod transport;

// Re-export primary public types.
pub use api::ControlClient;
pub use controller::{Action, ConnectionState, Event, SessionController, RECONNECT_DELAY};
pub use runner::{LocalEvent, RunOutcome, SessionRunner, TerminalSink};
pub use scrollback::{ScrollbackBuffer, MAX_SCROLLBACK};
pub use state::LastSession;
pub use transport::{channel_url, Channel, Incoming};

// Re-export webterm-core error types for convenience.
pub use webterm_core::{TermError, TermResult};
