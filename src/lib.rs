use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod i18n;
pub mod models;
pub mod route_table;
pub mod session;

// Routing split by how the gate applies (public API, session API, gated pages).
pub mod routes;
use routes::{portal, public, session as session_routes};

use auth::{Credential, RequestLocale};
use models::Decision;

// --- Public Re-exports ---

pub use backend::{BackendState, HttpSessionBackend, MockSessionBackend, SessionBackend};
pub use config::AppConfig;
pub use gate::{SessionGate, authorize};
pub use route_table::RouteTable;
pub use session::SessionStore;

/// ApiDoc
///
/// OpenAPI document for the JSON API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::navigate, handlers::get_session, handlers::login, handlers::logout
    ),
    components(
        schemas(
            models::NavigationRequest, models::NavigationResponse, models::Decision,
            models::Phase, models::Area, models::Session, models::SessionResponse,
            models::LoginRequest, models::LoginResponse, models::LogoutResponse,
            i18n::Notice, i18n::NoticeLevel, i18n::MessageKey, i18n::Locale,
        )
    ),
    tags(
        (name = "portal-gate", description = "Session gate for the resource portal")
    )
)]
struct ApiDoc;

/// GateState
///
/// The shared gate handle handlers pull out of [`AppState`].
pub type GateState = Arc<SessionGate>;

/// AppState
///
/// Everything a request needs: the gate (which owns the session store and the
/// backend client) and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub gate: GateState,
    pub config: AppConfig,
}

impl AppState {
    /// Wires a gate over the portal route table with a fresh session store.
    pub fn new(config: AppConfig, backend: BackendState) -> Self {
        let store = Arc::new(SessionStore::new(config.session_ttl));
        let gate = SessionGate::new(RouteTable::portal(), store, backend, &config.session_cookie);
        Self {
            gate: Arc::new(gate),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for GateState {
    fn from_ref(app_state: &AppState) -> GateState {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// gate_middleware
///
/// Runs the session gate in front of every portal page. Authorized requests
/// continue to the page; the rest become a login redirect, the forbidden view,
/// or a `409` when a newer navigation from the same caller overtook this one.
pub async fn gate_middleware(
    State(gate): State<GateState>,
    credential: Credential,
    RequestLocale(locale): RequestLocale,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let outcome = gate.navigate(&path, &credential, locale).await;

    match outcome.decision {
        Some(Decision::Render) => next.run(request).await,
        Some(Decision::RedirectTo { location }) => {
            handlers::redirect_response(&location, outcome.notice.as_ref())
        }
        Some(Decision::Forbidden) => handlers::forbidden_page(locale),
        None => (StatusCode::CONFLICT, "navigation superseded").into_response(),
    }
}

/// create_router
///
/// Assembles the API routes, the gated portal, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(session_routes::session_routes());

    // Static files bypass the gate inside the portal service; only page loads
    // count as navigations.
    let base_router = api
        .with_state(state.clone())
        .fallback_service(portal::portal_service(state));

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for each request, tagged with the `x-request-id` so every log line of
/// a navigation can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
