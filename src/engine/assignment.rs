use std::time::Instant;

use serde::Deserialize;
use tracing::{error, info};

use crate::engine::{observe_latency, order_id_from_any, required};
use crate::error::AppError;
use crate::models::assignment::{AssignedOrder, AssignmentState, DriverRef, Otp};
use crate::models::driver::{Availability, DriverKey};
use crate::models::order::{OrderId, OrderStatus};
use crate::notify::{self, templates};
use crate::registry::{Change, Changeset};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignOrderRequest {
    #[serde(default, deserialize_with = "order_id_from_any")]
    pub order_id: Option<OrderId>,
    #[serde(alias = "userId")]
    pub driver_id: Option<String>,
    pub driver_name: Option<String>,
    pub driver_phone_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssignOrder {
    pub order_id: OrderId,
    pub driver: DriverRef,
}

impl AssignOrderRequest {
    pub fn validate(self) -> Result<AssignOrder, AppError> {
        let missing = || {
            AppError::BadRequest(
                "Order ID, driver ID, driver name, and driver phone number are required"
                    .to_string(),
            )
        };

        let order_id = self.order_id.filter(|id| *id > 0).ok_or_else(missing)?;
        let id = required(self.driver_id).ok_or_else(missing)?;
        let name = required(self.driver_name).ok_or_else(missing)?;
        let phone_number = required(self.driver_phone_number).ok_or_else(missing)?;

        Ok(AssignOrder {
            order_id,
            driver: DriverRef {
                id,
                name,
                phone_number,
            },
        })
    }
}

pub async fn assign_order(state: &AppState, request: AssignOrder) -> Result<AssignedOrder, AppError> {
    let start = Instant::now();
    let order_id = request.order_id;
    let result = assign(state, request).await;
    observe_latency(state, "assign", start);

    match &result {
        Ok(_) => state
            .metrics
            .assignments_total
            .with_label_values(&["success"])
            .inc(),
        Err(err) => {
            state
                .metrics
                .assignments_total
                .with_label_values(&["error"])
                .inc();
            error!(order_id, error = %err, "failed to assign order");
        }
    }

    result
}

async fn assign(state: &AppState, request: AssignOrder) -> Result<AssignedOrder, AppError> {
    let order = state
        .registry
        .find_order(request.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    let existing = state.registry.find_assignment(order.id).await?;
    if AssignmentState::of(&order, existing.as_ref()) != AssignmentState::Unassigned {
        return Err(AppError::Conflict("Order already assigned".to_string()));
    }

    // Checked before any write so a missing driver leaves nothing half-assigned.
    let driver = state
        .registry
        .find_driver(DriverKey::PhoneNumber(&request.driver.phone_number))
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".to_string()))?;

    let assignment = AssignedOrder::snapshot(&order, &request.driver, Otp::generate());

    let changes = Changeset::new()
        .push(Change::InsertAssignment(assignment.clone()))
        .push(Change::UpdateOrderStatus {
            order_id: order.id,
            expected: OrderStatus::Pending,
            status: OrderStatus::Active,
            assigned_driver: Some(request.driver.name.clone()),
        })
        .push(Change::SetDriverAvailability {
            user_id: driver.user_id.clone(),
            available: Availability::Assigned,
        });
    state.registry.commit(changes).await?;

    info!(
        order_id = order.id,
        driver_id = %request.driver.id,
        driver_user_id = %driver.user_id,
        "order assigned"
    );

    notify::dispatch(
        state,
        vec![
            templates::order_assigned(
                &order,
                &request.driver.name,
                &request.driver.phone_number,
            ),
            templates::driver_assigned(&assignment, &driver.email),
        ],
    )
    .await?;

    Ok(assignment)
}
