//! WebSocket channel to one session.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;
use webterm_core::{codec, ClientMessage, ServerMessage, TermError, TermResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A frame received from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Message(ServerMessage),
    /// Text that did not parse as a protocol message.
    Raw(String),
}

/// Build the channel URL for `session_id` from the server's base URL.
///
/// `http://host:4001/terminal` becomes
/// `ws://host:4001/terminal/ws?sessionId=<id>`.
pub fn channel_url(base: &Url, session_id: &str) -> TermResult<Url> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TermError::Transport(format!(
                "unsupported URL scheme: {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| TermError::Transport(format!("cannot use scheme {scheme} for {base}")))?;
    let path = format!("{}/ws", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair("sessionId", session_id);
    Ok(url)
}

/// An open viewer connection.
pub struct Channel {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl Channel {
    /// Connect to a session channel URL.
    pub async fn connect(url: &Url) -> TermResult<Self> {
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TermError::Transport(format!("WebSocket connect error: {e}")))?;

        info!(url = %url, "channel connected");

        let (sink, stream) = ws_stream.split();
        Ok(Self { sink, stream })
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> TermResult<()> {
        let text = codec::encode(msg)?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TermError::Transport(format!("WS write error: {e}")))
    }

    /// Next frame from the server. `None` once the connection is closed.
    pub async fn recv(&mut self) -> Option<Incoming> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(parse_frame(text)),
                Ok(Message::Binary(data)) => {
                    return Some(parse_frame(String::from_utf8_lossy(&data).into_owned()))
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "channel closed by server");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "channel read error");
                    return None;
                }
            }
        }
    }

    /// Send a close frame. Errors are ignored.
    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

fn parse_frame(text: String) -> Incoming {
    match codec::decode::<ServerMessage>(&text) {
        Ok(msg) => Incoming::Message(msg),
        Err(_) => Incoming::Raw(text),
    }
}
