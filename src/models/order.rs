use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub type OrderId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Active,
    Picked,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Active => "active",
            OrderStatus::Picked => "picked",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The post-assignment statuses a driver may move an order through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Active,
    Picked,
    Delivered,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 3] = [
        DeliveryStatus::Active,
        DeliveryStatus::Picked,
        DeliveryStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        OrderStatus::from(*self).as_str()
    }
}

impl From<DeliveryStatus> for OrderStatus {
    fn from(status: DeliveryStatus) -> Self {
        match status {
            DeliveryStatus::Active => OrderStatus::Active,
            DeliveryStatus::Picked => OrderStatus::Picked,
            DeliveryStatus::Delivered => OrderStatus::Delivered,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DeliveryStatus::Active),
            "picked" => Ok(DeliveryStatus::Picked),
            "delivered" => Ok(DeliveryStatus::Delivered),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub pickup_address: String,
    pub drop_address: String,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<NaiveTime>,
    pub drop_time: Option<NaiveTime>,
    pub content: String,
    pub weight: f64,
    pub receiver_name: String,
    pub receiver_phone_number: String,
    pub delivery_instructions: Option<String>,
    pub status: OrderStatus,
    pub assigned_driver: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_scheduled(&self) -> bool {
        self.pickup_time.is_some()
    }
}

/// Customer-submitted order details; the registry allocates the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub pickup_address: String,
    pub drop_address: String,
    #[serde(default)]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default)]
    pub pickup_time: Option<NaiveTime>,
    #[serde(default)]
    pub drop_time: Option<NaiveTime>,
    pub content: String,
    pub weight: f64,
    pub receiver_name: String,
    pub receiver_phone_number: String,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
}
