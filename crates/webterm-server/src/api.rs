//! Control API handlers: list, create and delete sessions.

use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;
use webterm_core::{Ack, ErrorBody, SessionSummary, TermError};

/// `GET /api/health`
pub async fn health() -> Json<Ack> {
    Json(Ack::OK)
}

/// `GET /api/sessions`
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.list().await)
}

/// `POST /api/sessions`
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<SessionSummary>, ApiError> {
    let session = state.registry.create().await?;
    Ok(Json(session.summary()))
}

/// `DELETE /api/sessions/:id`. Absent ids succeed too.
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Json<Ack> {
    state.registry.destroy(&id).await;
    Json(Ack::OK)
}

/// Maps a [`TermError`] onto an HTTP status and a JSON `{error, status}` body.
#[derive(Debug)]
pub struct ApiError(pub TermError);

impl From<TermError> for ApiError {
    fn from(err: TermError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TermError::Capacity(_) => StatusCode::SERVICE_UNAVAILABLE,
            TermError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            TermError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "control request failed");
        }

        let body = Json(ErrorBody {
            error: self.0.to_string(),
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_mapping() {
        let cases = [
            (TermError::Spawn("no shell".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (TermError::Capacity(5), StatusCode::SERVICE_UNAVAILABLE),
            (TermError::SessionNotFound("x".into()), StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }
}
