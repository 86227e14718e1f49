use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Assigned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub user_id: String,
    pub name: String,
    pub phone_number: String,
    pub email: String,
    pub available: Availability,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDriver {
    pub user_id: String,
    pub name: String,
    pub phone_number: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy)]
pub enum DriverKey<'a> {
    UserId(&'a str),
    PhoneNumber(&'a str),
}

impl DriverKey<'_> {
    pub fn matches(&self, driver: &Driver) -> bool {
        match self {
            DriverKey::UserId(id) => driver.user_id == *id,
            DriverKey::PhoneNumber(phone) => driver.phone_number == *phone,
        }
    }
}
