use portal_gate::{
    AppState,
    backend::{BackendState, HttpSessionBackend},
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects the session backend client,
/// and serves the gate.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "portal_gate=debug,tower_http=info,axum=trace".into());

    // 3. Pretty logs locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Session backend client
    let backend = HttpSessionBackend::new(&config.backend_url, config.backend_timeout)
        .expect("FATAL: Failed to build the session backend HTTP client.");
    let backend = Arc::new(backend) as BackendState;
    tracing::info!(backend = %config.backend_url, "Session backend configured.");

    // 5. State, plus a sweeper that evicts idle sessions once per TTL.
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config, backend);

    let store = app_state.gate.store().clone();
    let sweep_every = app_state.config.session_ttl.max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let evicted = store.prune().await;
            if evicted > 0 {
                tracing::debug!(evicted, "pruned idle session cache entries");
            }
        }
    });

    // 6. Router and server
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the listen address. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
