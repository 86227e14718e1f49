pub mod memory;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::models::assignment::{AssignedOrder, Otp};
use crate::models::driver::{Availability, Driver, DriverKey, NewDriver};
use crate::models::order::{DeliveryStatus, NewOrder, Order, OrderId, OrderStatus};

pub use memory::MemoryRegistry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{0}")]
    Missing(String),

    /// A precondition no longer holds because the record changed underneath.
    #[error("{0}")]
    Stale(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub pickup_scheduled: Option<bool>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|status| order.status == status)
            && self
                .pickup_scheduled
                .is_none_or(|scheduled| order.is_scheduled() == scheduled)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub driver_id: Option<String>,
    /// Empty means any status.
    pub statuses: Vec<DeliveryStatus>,
}

impl AssignmentFilter {
    pub fn matches(&self, assignment: &AssignedOrder) -> bool {
        self.driver_id
            .as_deref()
            .is_none_or(|driver_id| assignment.driver_id == driver_id)
            && (self.statuses.is_empty() || self.statuses.contains(&assignment.status))
    }
}

/// One guarded write. Each variant carries the state it expects to find.
#[derive(Debug, Clone)]
pub enum Change {
    InsertAssignment(AssignedOrder),
    UpdateOrderStatus {
        order_id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
        assigned_driver: Option<String>,
    },
    SchedulePickup {
        order_id: OrderId,
        pickup_date: NaiveDate,
        pickup_time: NaiveTime,
    },
    UpdateAssignmentStatus {
        order_id: OrderId,
        status: DeliveryStatus,
    },
    ConsumeOtp {
        order_id: OrderId,
        expected: Otp,
    },
    SetDriverAvailability {
        user_id: String,
        available: Availability,
    },
}

/// Writes that succeed or fail together.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    changes: Vec<Change>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

#[async_trait]
pub trait Registry: Send + Sync {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, RegistryError>;
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RegistryError>;
    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RegistryError>;

    async fn find_assignment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<AssignedOrder>, RegistryError>;
    async fn find_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<AssignedOrder>, RegistryError>;

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver, RegistryError>;
    async fn find_driver(&self, key: DriverKey<'_>) -> Result<Option<Driver>, RegistryError>;
    async fn list_drivers(&self) -> Result<Vec<Driver>, RegistryError>;

    /// Checks every change's precondition, then applies all of them. Nothing
    /// is written when any precondition fails.
    async fn commit(&self, changes: Changeset) -> Result<(), RegistryError>;
}
