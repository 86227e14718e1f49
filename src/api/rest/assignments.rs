use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::api::rest::extract::{AppJson, AppPath};
use crate::engine::assignment::{self, AssignOrderRequest};
use crate::engine::otp::{self, VerifyOtpRequest};
use crate::engine::queries;
use crate::engine::status::{self, UpdateStatusRequest};
use crate::error::AppError;
use crate::models::assignment::AssignedOrder;
use crate::models::order::OrderId;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/orders/assigned", get(list_assignments))
        .route("/api/orders/assign", post(assign_order))
        .route(
            "/api/orders/assigned/driver/:driver_id",
            get(list_driver_assignments),
        )
        .route("/api/orders/assigned/:order_id", get(get_assignment))
        .route("/api/orders/status", put(update_status))
        .route("/api/orders/verify-otp", post(verify_otp))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub message: &'static str,
    pub assigned_order: AssignedOrder,
}

async fn list_assignments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AssignedOrder>>, AppError> {
    Ok(Json(queries::list_active_assignments(&state).await?))
}

async fn assign_order(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<AssignOrderRequest>,
) -> Result<(StatusCode, Json<AssignResponse>), AppError> {
    let request = payload.validate()?;
    let assigned_order = assignment::assign_order(&state, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(AssignResponse {
            message: "Driver assigned successfully",
            assigned_order,
        }),
    ))
}

async fn list_driver_assignments(
    State(state): State<Arc<AppState>>,
    AppPath(driver_id): AppPath<String>,
) -> Result<Json<Vec<AssignedOrder>>, AppError> {
    Ok(Json(
        queries::list_assignments_for_driver(&state, &driver_id).await?,
    ))
}

async fn get_assignment(
    State(state): State<Arc<AppState>>,
    AppPath(order_id): AppPath<OrderId>,
) -> Result<Json<AssignedOrder>, AppError> {
    Ok(Json(queries::get_assignment(&state, order_id).await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let update = payload.validate()?;
    status::update_status(&state, update).await?;

    Ok(Json(MessageResponse {
        message: "Order status updated successfully",
    }))
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let check = payload.validate()?;
    otp::verify_otp(&state, check).await?;

    Ok(Json(MessageResponse {
        message: "OTP verified successfully",
    }))
}
