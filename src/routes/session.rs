use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Session Router Module
///
/// Endpoints bound to the caller's session cookie.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        // GET /api/session
        // Who is signed in. 401 with a localized notice when nobody is.
        .route("/api/session", get(handlers::get_session))
        // POST /api/session/logout?area=admin|client
        // Drops the session locally and at the backend.
        .route("/api/session/logout", post(handlers::logout))
}
