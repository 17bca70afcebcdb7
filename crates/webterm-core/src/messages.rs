//! Wire messages carried by a viewer connection.
//!
//! Every frame is a JSON object discriminated by its `type` field:
//!
//! ```text
//! client → server   {"type":"input","data":"ls\r"}
//! client → server   {"type":"resize","cols":120,"rows":40}
//! server → client   {"type":"output","data":"..."}
//! server → client   {"type":"status","status":"session exited"}
//! ```

use serde::{Deserialize, Serialize};

/// Terminal width used when a resize request omits `cols`.
pub const DEFAULT_COLS: u16 = 80;
/// Terminal height used when a resize request omits `rows`.
pub const DEFAULT_ROWS: u16 = 24;

/// Messages sent from a viewer to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Raw keystrokes to write into the pty.
    Input { data: String },
    /// Pty window resize request. Out-of-range values are clamped by the pty.
    Resize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cols: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<i64>,
    },
}

impl ClientMessage {
    pub fn input(data: impl Into<String>) -> Self {
        Self::Input { data: data.into() }
    }

    pub fn resize(cols: u16, rows: u16) -> Self {
        Self::Resize {
            cols: Some(i64::from(cols)),
            rows: Some(i64::from(rows)),
        }
    }
}

/// Messages sent from the server to a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Text produced by the pty.
    Output { data: String },
    /// Lifecycle notice, see [`status`].
    Status { status: String },
}

impl ServerMessage {
    pub fn output(data: impl Into<String>) -> Self {
        Self::Output { data: data.into() }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self::Status {
            status: status.into(),
        }
    }
}

/// Well-known `status` strings.
pub mod status {
    /// The session's shell terminated (exit, signal or explicit delete).
    pub const SESSION_EXITED: &str = "session exited";
    /// The requested session id is not in the registry.
    pub const UNKNOWN_SESSION: &str = "unknown session";
    /// The connection did not carry a session id.
    pub const MISSING_SESSION_ID: &str = "missing sessionId";

    /// Status sent before closing a connection whose handler failed.
    pub fn error(message: impl std::fmt::Display) -> String {
        format!("error: {message}")
    }

    /// Whether a status means the session can never be attached again.
    ///
    /// Clients stop reconnecting once they see one of these.
    pub fn is_terminal(status: &str) -> bool {
        matches!(status, SESSION_EXITED | UNKNOWN_SESSION | MISSING_SESSION_ID)
    }
}

/// Resolve an optional, possibly out-of-range dimension to a valid pty size.
///
/// Missing values fall back to `default`; present values are clamped into
/// `1..=u16::MAX`.
pub fn clamp_dimension(value: Option<i64>, default: u16) -> u16 {
    match value {
        None => default,
        Some(v) => v.clamp(1, i64::from(u16::MAX)) as u16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_type_tag() {
        let json = serde_json::to_string(&ClientMessage::input("ls\r")).unwrap();
        assert_eq!(json, r#"{"type":"input","data":"ls\r"}"#);

        let json = serde_json::to_string(&ClientMessage::resize(120, 40)).unwrap();
        assert_eq!(json, r#"{"type":"resize","cols":120,"rows":40}"#);
    }

    #[test]
    fn server_messages_use_type_tag() {
        let json = serde_json::to_string(&ServerMessage::status(status::UNKNOWN_SESSION)).unwrap();
        assert_eq!(json, r#"{"type":"status","status":"unknown session"}"#);
    }

    #[test]
    fn resize_accepts_negative_and_missing_dimensions() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"resize","cols":0,"rows":-5}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Resize {
                cols: Some(0),
                rows: Some(-5)
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"resize"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Resize { cols: None, rows: None });
    }

    #[test]
    fn clamp_dimension_bounds() {
        assert_eq!(clamp_dimension(Some(0), DEFAULT_COLS), 1);
        assert_eq!(clamp_dimension(Some(-5), DEFAULT_ROWS), 1);
        assert_eq!(clamp_dimension(Some(120), DEFAULT_COLS), 120);
        assert_eq!(clamp_dimension(Some(1 << 40), DEFAULT_COLS), u16::MAX);
        assert_eq!(clamp_dimension(None, DEFAULT_ROWS), 24);
    }

    #[test]
    fn terminal_statuses() {
        assert!(status::is_terminal(status::SESSION_EXITED));
        assert!(status::is_terminal(status::UNKNOWN_SESSION));
        assert!(status::is_terminal(status::MISSING_SESSION_ID));
        assert!(!status::is_terminal(&status::error("boom")));
    }
}
