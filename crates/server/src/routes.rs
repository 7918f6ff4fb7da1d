//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::http::{Method, header};
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        .route(
            "/v1/vaccinations",
            post(handlers::create_record).get(handlers::list_records),
        )
        .route("/v1/vaccinations/bulk", post(handlers::bulk_import))
        .route(
            "/v1/vaccinations/{cert_id}",
            get(handlers::get_record).delete(handlers::delete_record),
        )
        .route("/v1/dashboard", get(handlers::get_dashboard));

    let mut router = Router::new().merge(api_routes);

    // SECURITY: the metrics endpoint is unauthenticated; restrict it to the
    // Prometheus scraper at the network level.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    // The web UI is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Order of execution: TraceLayer -> CORS -> Auth -> Handler
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
