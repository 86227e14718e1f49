pub mod assignments;
pub mod drivers;
pub mod extract;
pub mod orders;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::error::AppError;
use crate::registry::{AssignmentFilter, OrderFilter};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(orders::router())
        .merge(assignments::router())
        .merge(drivers::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// The full application: API routes plus CORS, request tracing and the
/// optional single-page-app fallback.
pub fn app(state: Arc<AppState>, config: &Config) -> Router {
    let mut app = router(state);

    if let Some(dir) = &config.static_dir {
        let index = format!("{dir}/index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    app.layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, error = %err, "ignoring invalid cors origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    orders: usize,
    assignments: usize,
    drivers: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    let order_filter = OrderFilter::default();
    let assignment_filter = AssignmentFilter::default();
    let (orders, assignments, drivers) = tokio::try_join!(
        state.registry.find_orders(&order_filter),
        state.registry.find_assignments(&assignment_filter),
        state.registry.list_drivers(),
    )?;

    Ok(Json(HealthResponse {
        status: "ok",
        orders: orders.len(),
        assignments: assignments.len(),
        drivers: drivers.len(),
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
