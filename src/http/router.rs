//! Router configuration: routes, CORS, tracing and the preflight short-circuit.

use axum::{
    extract::Request,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the gateway router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // every response carries Access-Control-Allow-Origin: *
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::ws_upgrade))
        .route("/health", get(handlers::health))
        .route("/ais/snapshot", get(handlers::snapshot))
        .route("/rss", get(handlers::rss))
        .route("/opensky", get(handlers::opensky))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(preflight))
        .with_state(state)
}

/// Any OPTIONS request is answered with 204 before routing.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
                (ACCESS_CONTROL_ALLOW_HEADERS, "*"),
            ],
        )
            .into_response();
    }
    next.run(request).await
}
