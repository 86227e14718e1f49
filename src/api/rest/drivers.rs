use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::api::rest::extract::AppJson;
use crate::engine::intake;
use crate::error::AppError;
use crate::models::driver::{Driver, NewDriver};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/drivers", post(register_driver).get(list_drivers))
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewDriver>,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    let driver = intake::register_driver(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>, AppError> {
    Ok(Json(intake::list_drivers(&state).await?))
}
