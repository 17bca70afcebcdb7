//! HTTP client for the Control API.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use webterm_core::{Ack, ErrorBody, SessionSummary, TermError, TermResult};

use crate::transport::channel_url;

/// Talks to `<base>/api/...` on a webterm server.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: reqwest::Client,
    base: Url,
}

impl ControlClient {
    /// `base` is the server URL including any route prefix, e.g.
    /// `http://localhost:4001` or `https://host/terminal`.
    pub fn new(base: &str) -> TermResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| TermError::Api(format!("invalid server URL {base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(TermError::Api(format!("invalid server URL {base}")));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// WebSocket URL for attaching to `session_id`.
    pub fn channel_url(&self, session_id: &str) -> TermResult<Url> {
        channel_url(&self.base, session_id)
    }

    pub async fn health(&self) -> TermResult<bool> {
        let ack: Ack = self.get(&["health"]).await?;
        Ok(ack.ok)
    }

    pub async fn list(&self) -> TermResult<Vec<SessionSummary>> {
        self.get(&["sessions"]).await
    }

    pub async fn create(&self) -> TermResult<SessionSummary> {
        let url = self.endpoint(&["sessions"])?;
        debug!(%url, "creating session");
        let response = self.http.post(url).send().await.map_err(request_error)?;
        decode(response).await
    }

    /// Delete a session. Succeeds for ids the server does not know.
    pub async fn delete(&self, session_id: &str) -> TermResult<()> {
        let url = self.endpoint(&["sessions", session_id])?;
        debug!(%url, "deleting session");
        let response = self.http.delete(url).send().await.map_err(request_error)?;
        let _: Ack = decode(response).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> TermResult<T> {
        let url = self.endpoint(segments)?;
        let response = self.http.get(url).send().await.map_err(request_error)?;
        decode(response).await
    }

    /// `<base>/api/<segments...>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> TermResult<Url> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| TermError::Api(format!("invalid server URL {}", self.base)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }
}

fn request_error(e: reqwest::Error) -> TermError {
    TermError::Api(format!("request failed: {e}"))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> TermResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| TermError::Api(format!("bad response body: {e}")));
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(match status {
        StatusCode::NOT_FOUND => TermError::SessionNotFound(message),
        _ => TermError::Api(format!("{status}: {message}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_respect_base_path() {
        let client = ControlClient::new("http://localhost:4001").unwrap();
        assert_eq!(
            client.endpoint(&["sessions"]).unwrap().as_str(),
            "http://localhost:4001/api/sessions"
        );

        let client = ControlClient::new("https://host/terminal/").unwrap();
        assert_eq!(
            client.endpoint(&["sessions", "abc"]).unwrap().as_str(),
            "https://host/terminal/api/sessions/abc"
        );
    }

    #[test]
    fn session_ids_are_escaped() {
        let client = ControlClient::new("http://h").unwrap();
        assert_eq!(
            client.endpoint(&["sessions", "a/b"]).unwrap().as_str(),
            "http://h/api/sessions/a%2Fb"
        );
    }

    #[test]
    fn rejects_garbage_urls() {
        assert!(ControlClient::new("not a url").is_err());
        assert!(ControlClient::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn channel_url_uses_base() {
        let client = ControlClient::new("http://localhost:4001/terminal").unwrap();
        assert_eq!(
            client.channel_url("s1").unwrap().as_str(),
            "ws://localhost:4001/terminal/ws?sessionId=s1"
        );
    }
}
