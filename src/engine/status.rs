use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::engine::{observe_latency, order_id_from_any, required};
use crate::error::AppError;
use crate::models::assignment::AssignmentState;
use crate::models::driver::{Availability, DriverKey};
use crate::models::order::{DeliveryStatus, OrderId, OrderStatus};
use crate::notify::{self, templates};
use crate::registry::{Change, Changeset};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[serde(default, deserialize_with = "order_id_from_any")]
    pub order_id: Option<OrderId>,
    pub status: Option<String>,
    pub driver_user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub order_id: OrderId,
    pub status: DeliveryStatus,
    pub driver_user_id: String,
}

impl UpdateStatusRequest {
    pub fn validate(self) -> Result<StatusUpdate, AppError> {
        let (Some(order_id), Some(status), Some(driver_user_id)) = (
            self.order_id.filter(|id| *id > 0),
            required(self.status),
            required(self.driver_user_id),
        ) else {
            return Err(AppError::BadRequest(
                "Order ID, status, and driver user ID are required".to_string(),
            ));
        };

        let status = status
            .parse::<DeliveryStatus>()
            .map_err(|_| AppError::BadRequest("Invalid status value".to_string()))?;

        Ok(StatusUpdate {
            order_id,
            status,
            driver_user_id,
        })
    }
}

/// Delivered is terminal and picked never goes back to active. Every other
/// move, including repeating the current status, is accepted.
pub fn check_transition(state: AssignmentState, target: DeliveryStatus) -> Result<(), AppError> {
    match (state, target) {
        (AssignmentState::Terminal, _) => Err(AppError::InvalidTransition(
            "Order is already delivered".to_string(),
        )),
        (AssignmentState::Active(DeliveryStatus::Picked), DeliveryStatus::Active) => Err(
            AppError::InvalidTransition("Cannot revert to active from picked".to_string()),
        ),
        _ => Ok(()),
    }
}

pub async fn update_status(state: &AppState, update: StatusUpdate) -> Result<(), AppError> {
    let start = Instant::now();
    let target = update.status;
    let result = apply_update(state, update).await;
    observe_latency(state, "update_status", start);

    let outcome = if result.is_ok() { "success" } else { "error" };
    state
        .metrics
        .status_updates_total
        .with_label_values(&[target.as_str(), outcome])
        .inc();

    result
}

async fn apply_update(state: &AppState, update: StatusUpdate) -> Result<(), AppError> {
    let (order, assignment) = tokio::try_join!(
        state.registry.find_order(update.order_id),
        state.registry.find_assignment(update.order_id),
    )?;

    let (Some(order), Some(assignment)) = (order, assignment) else {
        return Err(AppError::NotFound(
            "Order or assigned order not found".to_string(),
        ));
    };

    check_transition(AssignmentState::of(&order, Some(&assignment)), update.status)?;

    let mut changes = Changeset::new()
        .push(Change::UpdateOrderStatus {
            order_id: order.id,
            expected: order.status,
            status: OrderStatus::from(update.status),
            assigned_driver: None,
        })
        .push(Change::UpdateAssignmentStatus {
            order_id: order.id,
            status: update.status,
        });

    if update.status == DeliveryStatus::Delivered {
        match state
            .registry
            .find_driver(DriverKey::UserId(&update.driver_user_id))
            .await?
        {
            Some(driver) => {
                changes = changes.push(Change::SetDriverAvailability {
                    user_id: driver.user_id,
                    available: Availability::Available,
                });
            }
            None => debug!(
                order_id = order.id,
                driver_user_id = %update.driver_user_id,
                "driver record not found; delivery recorded without releasing driver"
            ),
        }
    }

    state.registry.commit(changes).await?;

    info!(
        order_id = order.id,
        from = %order.status,
        to = %update.status,
        "order status updated"
    );

    let batch = match update.status {
        DeliveryStatus::Active => Vec::new(),
        DeliveryStatus::Picked => match assignment.otp.as_ref() {
            Some(otp) => vec![templates::delivery_otp(&order, otp)],
            None => {
                warn!(order_id = order.id, "otp already consumed; skipping otp message");
                Vec::new()
            }
        },
        DeliveryStatus::Delivered => vec![templates::order_delivered(&order)],
    };

    notify::dispatch(state, batch).await
}
