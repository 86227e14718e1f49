use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::models::assignment::AssignmentState;
use crate::models::driver::{Driver, NewDriver};
use crate::models::order::{NewOrder, Order, OrderId};
use crate::registry::{Change, Changeset};
use crate::state::AppState;

pub async fn create_order(state: &AppState, new: NewOrder) -> Result<Order, AppError> {
    if new.name.trim().is_empty() || new.email.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Customer name and email are required".to_string(),
        ));
    }
    if new.pickup_address.trim().is_empty() || new.drop_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Pickup and drop addresses are required".to_string(),
        ));
    }
    if !new.weight.is_finite() || new.weight <= 0.0 {
        return Err(AppError::BadRequest("Weight must be > 0".to_string()));
    }
    if new.pickup_time.is_some() && new.pickup_date.is_none() {
        return Err(AppError::BadRequest(
            "Pickup date is required when pickup time is set".to_string(),
        ));
    }

    let order = state.registry.insert_order(new).await?;
    info!(order_id = order.id, scheduled = order.is_scheduled(), "order received");
    Ok(order)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePickup {
    pub pickup_date: NaiveDate,
    pub pickup_time: NaiveTime,
}

/// Gives a pending, unassigned order its pickup slot.
pub async fn schedule_pickup(
    state: &AppState,
    order_id: OrderId,
    slot: SchedulePickup,
) -> Result<Order, AppError> {
    let order = state
        .registry
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let assignment = state.registry.find_assignment(order_id).await?;

    if AssignmentState::of(&order, assignment.as_ref()) != AssignmentState::Unassigned {
        return Err(AppError::InvalidTransition(
            "Only pending orders can be scheduled".to_string(),
        ));
    }

    state
        .registry
        .commit(Changeset::new().push(Change::SchedulePickup {
            order_id,
            pickup_date: slot.pickup_date,
            pickup_time: slot.pickup_time,
        }))
        .await?;

    info!(order_id, pickup_date = %slot.pickup_date, pickup_time = %slot.pickup_time, "pickup scheduled");

    state
        .registry
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

pub async fn register_driver(state: &AppState, new: NewDriver) -> Result<Driver, AppError> {
    let blank = [&new.user_id, &new.name, &new.phone_number, &new.email]
        .iter()
        .any(|field| field.trim().is_empty());
    if blank {
        return Err(AppError::BadRequest(
            "User ID, name, phone number, and email are required".to_string(),
        ));
    }

    let driver = state.registry.insert_driver(new).await?;
    info!(driver_user_id = %driver.user_id, "driver registered");
    Ok(driver)
}

pub async fn list_drivers(state: &AppState) -> Result<Vec<Driver>, AppError> {
    Ok(state.registry.list_drivers().await?)
}
