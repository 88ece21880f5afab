use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{auth, handlers, state::AppState};

/// Assemble the full application router.
///
/// Upload and delete sit behind the bearer-token middleware; everything
/// else is public (matching the original surface, where reads are open).
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/file/{id}", delete(handlers::delete_file))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/", get(handlers::index))
        .route("/files", get(handlers::list_files))
        .route("/file/{id}", get(handlers::download_file))
        .route("/thumbnail/{id}", get(handlers::get_thumbnail))
        .route("/stats", get(handlers::get_stats))
        .route("/search", get(handlers::search_files))
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("ignoring invalid CORS origin: {o}");
                    None
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}
