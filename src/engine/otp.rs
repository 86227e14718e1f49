use std::time::Instant;

use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::{observe_latency, order_id_from_any, text_from_any};
use crate::error::AppError;
use crate::models::order::OrderId;
use crate::registry::{Change, Changeset, RegistryError};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[serde(default, deserialize_with = "order_id_from_any")]
    pub order_id: Option<OrderId>,
    #[serde(default, deserialize_with = "text_from_any")]
    pub provided_otp: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OtpCheck {
    pub order_id: OrderId,
    pub provided_otp: String,
}

impl VerifyOtpRequest {
    pub fn validate(self) -> Result<OtpCheck, AppError> {
        let provided_otp = self.provided_otp.filter(|otp| !otp.is_empty());
        match (self.order_id.filter(|id| *id > 0), provided_otp) {
            (Some(order_id), Some(provided_otp)) => Ok(OtpCheck {
                order_id,
                provided_otp,
            }),
            _ => Err(AppError::BadRequest(
                "Order ID and OTP are required".to_string(),
            )),
        }
    }
}

/// Consumes the order's OTP when it matches. Does not change the order status.
pub async fn verify_otp(state: &AppState, check: OtpCheck) -> Result<(), AppError> {
    let start = Instant::now();
    let result = consume(state, &check).await;
    observe_latency(state, "verify_otp", start);

    let outcome = match &result {
        Ok(()) => "verified",
        Err(AppError::BadRequest(_)) => "rejected",
        Err(_) => "error",
    };
    state
        .metrics
        .otp_verifications_total
        .with_label_values(&[outcome])
        .inc();

    result
}

async fn consume(state: &AppState, check: &OtpCheck) -> Result<(), AppError> {
    let assignment = state
        .registry
        .find_assignment(check.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Assigned order not found".to_string()))?;

    let invalid = || AppError::BadRequest("Invalid OTP".to_string());

    let Some(expected) = assignment
        .otp
        .filter(|otp| otp.matches(&check.provided_otp))
    else {
        warn!(order_id = check.order_id, "otp mismatch");
        return Err(invalid());
    };

    let changes = Changeset::new().push(Change::ConsumeOtp {
        order_id: check.order_id,
        expected,
    });
    match state.registry.commit(changes).await {
        Ok(()) => {}
        // Someone else consumed it between our read and the commit.
        Err(RegistryError::Stale(_)) => return Err(invalid()),
        Err(err) => return Err(err.into()),
    }

    info!(order_id = check.order_id, "otp verified");
    Ok(())
}
