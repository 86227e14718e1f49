use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::order::{DeliveryStatus, Order, OrderId, OrderStatus};

const OTP_DIGITS: u32 = 4;

/// Single-use delivery confirmation code handed to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Otp(String);

impl Otp {
    pub fn generate() -> Self {
        let upper = 10u32.pow(OTP_DIGITS);
        let lower = upper / 10;
        let code = rand::thread_rng().gen_range(lower..upper);
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, provided: &str) -> bool {
        self.0 == provided
    }
}

impl From<&str> for Otp {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Otp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Driver-facing view of an order. The customer, address and package fields
/// are a snapshot taken at assignment time and are never re-synced; only
/// `status` and `otp` change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedOrder {
    pub order_id: OrderId,
    pub driver_id: String,
    pub driver_name: String,
    pub driver_phone_number: String,
    pub status: DeliveryStatus,
    pub otp: Option<Otp>,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub pickup_address: String,
    pub drop_address: String,
    pub content: String,
    pub weight: f64,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<NaiveTime>,
    pub drop_time: Option<NaiveTime>,
    pub receiver_name: String,
    pub receiver_phone_number: String,
    pub delivery_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: DateTime<Utc>,
}

impl AssignedOrder {
    pub fn snapshot(order: &Order, driver: &DriverRef, otp: Otp) -> Self {
        Self {
            order_id: order.id,
            driver_id: driver.id.clone(),
            driver_name: driver.name.clone(),
            driver_phone_number: driver.phone_number.clone(),
            status: DeliveryStatus::Active,
            otp: Some(otp),
            name: order.name.clone(),
            email: order.email.clone(),
            phone_number: order.phone_number.clone(),
            pickup_address: order.pickup_address.clone(),
            drop_address: order.drop_address.clone(),
            content: order.content.clone(),
            weight: order.weight,
            pickup_date: order.pickup_date,
            pickup_time: order.pickup_time,
            drop_time: order.drop_time,
            receiver_name: order.receiver_name.clone(),
            receiver_phone_number: order.receiver_phone_number.clone(),
            delivery_instructions: order.delivery_instructions.clone(),
            created_at: order.created_at,
            assigned_at: Utc::now(),
        }
    }
}

/// Driver identity as supplied by the dispatcher at assignment time.
#[derive(Debug, Clone)]
pub struct DriverRef {
    pub id: String,
    pub name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentState {
    Unassigned,
    Active(DeliveryStatus),
    Terminal,
}

impl AssignmentState {
    pub fn of(order: &Order, assignment: Option<&AssignedOrder>) -> Self {
        match (order.status, assignment) {
            (OrderStatus::Delivered, _) => AssignmentState::Terminal,
            (OrderStatus::Pending, None) => AssignmentState::Unassigned,
            (_, Some(assigned)) if assigned.status == DeliveryStatus::Delivered => {
                AssignmentState::Terminal
            }
            (_, Some(assigned)) => AssignmentState::Active(assigned.status),
            // An order that left pending without a driver record is treated as
            // assigned so it can never be double-booked.
            (OrderStatus::Active, None) => AssignmentState::Active(DeliveryStatus::Active),
            (OrderStatus::Picked, None) => AssignmentState::Active(DeliveryStatus::Picked),
        }
    }
}
