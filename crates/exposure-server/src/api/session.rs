//! Session snapshot endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use exposure_core::SessionSnapshot;

use crate::state::AppState;

/// Creates the session router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_session))
        .route("/error", delete(clear_error))
}

/// Everything a client needs to render the current session.
#[utoipa::path(
    get,
    path = "/api/session",
    tag = "session",
    operation_id = "getSession",
    summary = "Get session snapshot",
    description = "Returns loading state, last error, countries, selection, \
        the last case delta and the scan session in one document.",
    responses(
        (status = 200, description = "Current snapshot", body = SessionSnapshot)
    )
)]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session().snapshot())
}

/// Dismiss the current error message.
#[utoipa::path(
    delete,
    path = "/api/session/error",
    tag = "session",
    operation_id = "clearError",
    summary = "Dismiss error message",
    responses(
        (status = 204, description = "Error cleared")
    )
)]
pub async fn clear_error(State(state): State<AppState>) -> StatusCode {
    state.session().clear_error();
    StatusCode::NO_CONTENT
}
