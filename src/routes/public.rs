use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that never require a session. The navigation endpoint runs the
/// gate itself and reports the decision instead of enforcing it.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/navigate
        // Gate decision for a client-side route change.
        .route("/api/navigate", post(handlers::navigate))
        // POST /api/session/login
        // Login form proxy; passes the backend's session cookie through.
        .route("/api/session/login", post(handlers::login))
}
