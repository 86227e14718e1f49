pub mod outbox;
pub mod templates;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NotificationMode;
use crate::error::AppError;
use crate::notify::outbox::enqueue_notification;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier rejected message to {recipient}: {reason}")]
    Rejected { recipient: String, reason: String },

    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderAssigned,
    DriverAssigned,
    DeliveryOtp,
    OrderDelivered,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderAssigned => "order_assigned",
            NotificationKind::DriverAssigned => "driver_assigned",
            NotificationKind::DeliveryOtp => "delivery_otp",
            NotificationKind::OrderDelivered => "order_delivered",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes every message to the log instead of a mail transport.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            notification_id = %notification.id,
            kind = notification.kind.as_str(),
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification sent"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory. Can be switched into a failing mode, or
/// told to reject a fixed number of upcoming sends.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
    fail_next: AtomicUsize,
    attempts: AtomicUsize,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Every call to `send`, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let scheduled_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if scheduled_failure || self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                recipient: notification.recipient.clone(),
                reason: "notifier switched to failing".to_string(),
            });
        }

        self.sent
            .lock()
            .map_err(|_| NotifyError::Unavailable("sent log poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Hands messages to the notifier after state has been committed. In inline
/// mode the first failure is returned; the committed state is not undone.
pub async fn dispatch(state: &AppState, batch: Vec<Notification>) -> Result<(), AppError> {
    for notification in batch {
        let outcome = match state.notification_mode {
            NotificationMode::Inline => state
                .notifier
                .send(&notification)
                .await
                .map_err(AppError::from),
            NotificationMode::Outbox => enqueue_notification(state, notification.clone()).await,
        };

        if let Err(err) = outcome {
            state
                .metrics
                .notifications_total
                .with_label_values(&["failed"])
                .inc();
            state.metrics.partial_failures_total.inc();
            warn!(
                notification_id = %notification.id,
                kind = notification.kind.as_str(),
                error = %err,
                "state committed but notification failed"
            );
            return Err(err);
        }

        if state.notification_mode == NotificationMode::Inline {
            state
                .metrics
                .notifications_total
                .with_label_values(&["sent"])
                .inc();
        }
    }

    Ok(())
}
