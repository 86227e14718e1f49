use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::models::assignment::AssignedOrder;
use crate::models::driver::{Availability, Driver, DriverKey, NewDriver};
use crate::models::order::{NewOrder, Order, OrderId, OrderStatus};
use crate::registry::{AssignmentFilter, Change, Changeset, OrderFilter, Registry, RegistryError};

pub struct MemoryRegistry {
    orders: DashMap<OrderId, Order>,
    assignments: DashMap<OrderId, AssignedOrder>,
    drivers: DashMap<String, Driver>,
    next_order_id: AtomicI64,
    // Serializes multi-record writes; reads go straight to the maps.
    write_gate: Mutex<()>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            assignments: DashMap::new(),
            drivers: DashMap::new(),
            next_order_id: AtomicI64::new(1),
            write_gate: Mutex::new(()),
        }
    }

    fn check(&self, change: &Change) -> Result<(), RegistryError> {
        match change {
            Change::InsertAssignment(assignment) => {
                if !self.orders.contains_key(&assignment.order_id) {
                    return Err(missing_order(assignment.order_id));
                }
                if self.assignments.contains_key(&assignment.order_id) {
                    return Err(RegistryError::Duplicate("Order already assigned".to_string()));
                }
            }
            Change::UpdateOrderStatus {
                order_id, expected, ..
            } => {
                let order = self
                    .orders
                    .get(order_id)
                    .ok_or_else(|| missing_order(*order_id))?;
                if order.status != *expected {
                    return Err(RegistryError::Stale(format!(
                        "Order {order_id} is {}, expected {expected}",
                        order.status
                    )));
                }
            }
            Change::SchedulePickup { order_id, .. } => {
                let order = self
                    .orders
                    .get(order_id)
                    .ok_or_else(|| missing_order(*order_id))?;
                if order.status != OrderStatus::Pending {
                    return Err(RegistryError::Stale(format!(
                        "Order {order_id} is no longer pending"
                    )));
                }
            }
            Change::UpdateAssignmentStatus { order_id, .. } => {
                if !self.assignments.contains_key(order_id) {
                    return Err(missing_assignment(*order_id));
                }
            }
            Change::ConsumeOtp { order_id, expected } => {
                let assignment = self
                    .assignments
                    .get(order_id)
                    .ok_or_else(|| missing_assignment(*order_id))?;
                if assignment.otp.as_ref() != Some(expected) {
                    return Err(RegistryError::Stale("OTP already consumed".to_string()));
                }
            }
            Change::SetDriverAvailability { user_id, .. } => {
                if !self.drivers.contains_key(user_id) {
                    return Err(RegistryError::Missing(format!("Driver {user_id} not found")));
                }
            }
        }

        Ok(())
    }

    // Only called after `check` passed for the whole changeset under the gate.
    fn apply(&self, change: Change) {
        match change {
            Change::InsertAssignment(assignment) => {
                self.assignments.insert(assignment.order_id, assignment);
            }
            Change::UpdateOrderStatus {
                order_id,
                status,
                assigned_driver,
                ..
            } => {
                if let Some(mut order) = self.orders.get_mut(&order_id) {
                    order.status = status;
                    if assigned_driver.is_some() {
                        order.assigned_driver = assigned_driver;
                    }
                }
            }
            Change::SchedulePickup {
                order_id,
                pickup_date,
                pickup_time,
            } => {
                if let Some(mut order) = self.orders.get_mut(&order_id) {
                    order.pickup_date = Some(pickup_date);
                    order.pickup_time = Some(pickup_time);
                }
            }
            Change::UpdateAssignmentStatus { order_id, status } => {
                if let Some(mut assignment) = self.assignments.get_mut(&order_id) {
                    assignment.status = status;
                }
            }
            Change::ConsumeOtp { order_id, .. } => {
                if let Some(mut assignment) = self.assignments.get_mut(&order_id) {
                    assignment.otp = None;
                }
            }
            Change::SetDriverAvailability { user_id, available } => {
                if let Some(mut driver) = self.drivers.get_mut(&user_id) {
                    driver.available = available;
                    driver.updated_at = Utc::now();
                }
            }
        }
    }

    fn lock_writes(&self) -> Result<std::sync::MutexGuard<'_, ()>, RegistryError> {
        self.write_gate
            .lock()
            .map_err(|_| RegistryError::Unavailable("write gate poisoned".to_string()))
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_order(order_id: OrderId) -> RegistryError {
    RegistryError::Missing(format!("Order {order_id} not found"))
}

fn missing_assignment(order_id: OrderId) -> RegistryError {
    RegistryError::Missing(format!("Assigned order {order_id} not found"))
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn insert_order(&self, new: NewOrder) -> Result<Order, RegistryError> {
        let order = Order {
            id: self.next_order_id.fetch_add(1, Ordering::Relaxed),
            name: new.name,
            email: new.email,
            phone_number: new.phone_number,
            pickup_address: new.pickup_address,
            drop_address: new.drop_address,
            pickup_date: new.pickup_date,
            pickup_time: new.pickup_time,
            drop_time: new.drop_time,
            content: new.content,
            weight: new.weight,
            receiver_name: new.receiver_name,
            receiver_phone_number: new.receiver_phone_number,
            delivery_instructions: new.delivery_instructions,
            status: OrderStatus::Pending,
            assigned_driver: None,
            created_at: Utc::now(),
        };

        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RegistryError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RegistryError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.id);
        Ok(orders)
    }

    async fn find_assignment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<AssignedOrder>, RegistryError> {
        Ok(self
            .assignments
            .get(&order_id)
            .map(|entry| entry.value().clone()))
    }

    async fn find_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<AssignedOrder>, RegistryError> {
        let mut assignments: Vec<AssignedOrder> = self
            .assignments
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        assignments.sort_by_key(|assignment| assignment.order_id);
        Ok(assignments)
    }

    async fn insert_driver(&self, new: NewDriver) -> Result<Driver, RegistryError> {
        let _gate = self.lock_writes()?;

        let phone_taken = self
            .drivers
            .iter()
            .any(|entry| entry.value().phone_number == new.phone_number);
        if phone_taken || self.drivers.contains_key(&new.user_id) {
            return Err(RegistryError::Duplicate(format!(
                "Driver {} already registered",
                new.user_id
            )));
        }

        let driver = Driver {
            user_id: new.user_id,
            name: new.name,
            phone_number: new.phone_number,
            email: new.email,
            available: Availability::Available,
            updated_at: Utc::now(),
        };

        self.drivers.insert(driver.user_id.clone(), driver.clone());
        Ok(driver)
    }

    async fn find_driver(&self, key: DriverKey<'_>) -> Result<Option<Driver>, RegistryError> {
        let driver = match key {
            DriverKey::UserId(user_id) => self.drivers.get(user_id).map(|entry| entry.value().clone()),
            DriverKey::PhoneNumber(_) => self
                .drivers
                .iter()
                .find(|entry| key.matches(entry.value()))
                .map(|entry| entry.value().clone()),
        };
        Ok(driver)
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, RegistryError> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(drivers)
    }

    async fn commit(&self, changes: Changeset) -> Result<(), RegistryError> {
        let _gate = self.lock_writes()?;

        for change in changes.changes() {
            self.check(change)?;
        }
        for change in changes.into_changes() {
            self.apply(change);
        }

        Ok(())
    }
}
