use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;

use crate::api::rest::extract::{AppJson, AppPath};
use crate::engine::intake::{self, SchedulePickup};
use crate::engine::queries;
use crate::error::AppError;
use crate::models::order::{NewOrder, Order, OrderId};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/pending", get(list_pending))
        .route("/api/orders/scheduled", get(list_scheduled))
        .route("/api/orders/:order_id", get(get_order))
        .route("/api/orders/:order_id/schedule", patch(schedule_pickup))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewOrder>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = intake::create_order(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_pending(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(queries::list_unscheduled_pending_orders(&state).await?))
}

async fn list_scheduled(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(queries::list_scheduled_pending_orders(&state).await?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    AppPath(order_id): AppPath<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(queries::get_order(&state, order_id).await?))
}

async fn schedule_pickup(
    State(state): State<Arc<AppState>>,
    AppPath(order_id): AppPath<OrderId>,
    AppJson(payload): AppJson<SchedulePickup>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(intake::schedule_pickup(&state, order_id, payload).await?))
}
