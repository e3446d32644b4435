use super::state::AppState;
use crate::error::SessionError;
use crate::session::Offer;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::InvalidOffer(_) => StatusCode::BAD_REQUEST,
            SessionError::RenegotiationConflict(_) => StatusCode::CONFLICT,
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::Connection(_) => StatusCode::BAD_GATEWAY,
            SessionError::DuplicateSession(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal invariant details stay in the log
        let message = match &self {
            SessionError::DuplicateSession(_) => "internal session error".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// POST /api/offer
/// Create a session from an offer, or renegotiate an existing one
pub async fn offer(
    State(state): State<AppState>,
    payload: Result<Json<Offer>, JsonRejection>,
) -> Result<impl IntoResponse, SessionError> {
    let Json(offer) = payload.map_err(|rejection| {
        warn!("Malformed offer: {}", rejection.body_text());
        SessionError::InvalidOffer(rejection.body_text())
    })?;

    match state.sessions.handle_offer(offer).await {
        Ok(answer) => Ok((StatusCode::OK, Json(answer))),
        Err(e) => {
            match &e {
                SessionError::InvalidOffer(_)
                | SessionError::RenegotiationConflict(_)
                | SessionError::ShuttingDown => warn!("Offer rejected: {}", e),
                _ => error!("Failed to handle offer: {}", e),
            }
            Err(e)
        }
    }
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.sessions.overview().await))
}

/// GET /api/providers
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.providers.as_ref().clone()))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
