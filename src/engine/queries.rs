use crate::error::AppError;
use crate::models::assignment::AssignedOrder;
use crate::models::order::{DeliveryStatus, Order, OrderId, OrderStatus};
use crate::registry::{AssignmentFilter, OrderFilter};
use crate::state::AppState;

/// Fresh customer requests that have no pickup slot yet.
pub async fn list_unscheduled_pending_orders(state: &AppState) -> Result<Vec<Order>, AppError> {
    pending_orders(state, false).await
}

/// Pending requests with a confirmed pickup slot, waiting for a driver.
pub async fn list_scheduled_pending_orders(state: &AppState) -> Result<Vec<Order>, AppError> {
    pending_orders(state, true).await
}

async fn pending_orders(state: &AppState, scheduled: bool) -> Result<Vec<Order>, AppError> {
    let filter = OrderFilter {
        status: Some(OrderStatus::Pending),
        pickup_scheduled: Some(scheduled),
    };
    Ok(state.registry.find_orders(&filter).await?)
}

pub async fn get_order(state: &AppState, order_id: OrderId) -> Result<Order, AppError> {
    state
        .registry
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// Every assignment ever made; delivered ones are kept.
pub async fn list_active_assignments(state: &AppState) -> Result<Vec<AssignedOrder>, AppError> {
    let filter = AssignmentFilter {
        driver_id: None,
        statuses: DeliveryStatus::ALL.to_vec(),
    };
    Ok(state.registry.find_assignments(&filter).await?)
}

pub async fn list_assignments_for_driver(
    state: &AppState,
    driver_id: &str,
) -> Result<Vec<AssignedOrder>, AppError> {
    let filter = AssignmentFilter {
        driver_id: Some(driver_id.to_string()),
        statuses: Vec::new(),
    };
    let assignments = state.registry.find_assignments(&filter).await?;

    if assignments.is_empty() {
        return Err(AppError::NotFound(
            "No assigned orders found for this driver".to_string(),
        ));
    }

    Ok(assignments)
}

pub async fn get_assignment(state: &AppState, order_id: OrderId) -> Result<AssignedOrder, AppError> {
    state
        .registry
        .find_assignment(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}
