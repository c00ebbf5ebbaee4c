use crate::{AppState, gate_middleware, handlers};
use axum::{Router, middleware};
use tower_http::services::{ServeDir, ServeFile};

/// Portal Router Module
///
/// Serves the portal's pages behind the session gate. With a configured SPA
/// build, files that exist (bundles, `favicon.ico`, `robots.txt`, ...) are
/// served as-is; every other path is a page load that passes the gate and
/// receives `index.html` so client-side routing takes over. Without a build a
/// bare shell is returned, also behind the gate.
pub fn portal_service(state: AppState) -> Router {
    let gated = |pages: Router<AppState>| -> Router {
        pages
            .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
            .with_state(state.clone())
    };

    match &state.config.static_dir {
        Some(dir) => {
            let index = gated(
                Router::new().fallback_service(ServeFile::new(dir.join("index.html"))),
            );
            // Directories are page routes, never listings or implicit index files.
            let files = ServeDir::new(dir)
                .append_index_html_on_directories(false)
                .fallback(index);
            Router::new().fallback_service(files)
        }
        None => gated(Router::new().fallback(handlers::portal_shell)),
    }
}
