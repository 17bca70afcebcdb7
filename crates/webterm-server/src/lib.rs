//! webterm-server: remote shell sessions over WebSocket.
//!
//! Spawns shells on pseudo-terminals, keeps them in a [`SessionRegistry`],
//! fans their output out to any number of WebSocket viewers and exposes a
//! small JSON Control API to list, create and delete sessions.

pub mod api;
pub mod channel;
pub mod config;
pub mod server;
pub mod session;

pub use config::{CliOverrides, ServerConfig};
pub use server::{router, AppState, TermServer};
pub use session::{PtyHandle, Session, SessionRegistry, ShellSpec, Viewer};
