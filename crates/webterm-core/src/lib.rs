//! webterm-core: Shared protocol library for the web terminal service.
//!
//! Provides the JSON wire messages exchanged over a viewer connection, the
//! text codec, a streaming UTF-8 decoder for pty output, the Control API
//! payloads, and the error type shared by server and client.

pub mod api;
pub mod codec;
pub mod error;
pub mod messages;

// Re-export commonly used items at crate root.
pub use api::{Ack, ErrorBody, SessionSummary};
pub use codec::{decode, decode_bytes, encode, Utf8StreamDecoder};
pub use error::{TermError, TermResult};
pub use messages::{
    clamp_dimension, status, ClientMessage, ServerMessage, DEFAULT_COLS, DEFAULT_ROWS,
};

