use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::NotificationConfig;
use crate::error::AppError;
use crate::notify::Notification;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Linear: the n-th retry waits n * backoff.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl From<&NotificationConfig> for RetryPolicy {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff,
        }
    }
}

pub async fn enqueue_notification(
    state: &AppState,
    notification: Notification,
) -> Result<(), AppError> {
    // Counted before the send so the worker's decrement never runs first.
    state.metrics.notifications_in_queue.inc();

    if let Err(err) = state.outbox_tx.send(notification).await {
        state.metrics.notifications_in_queue.dec();
        return Err(AppError::Internal(format!(
            "notification queue send failed: {err}"
        )));
    }

    Ok(())
}

pub async fn run_notification_worker(
    state: Arc<AppState>,
    mut outbox_rx: mpsc::Receiver<Notification>,
    policy: RetryPolicy,
) {
    info!("notification worker started");

    while let Some(notification) = outbox_rx.recv().await {
        state.metrics.notifications_in_queue.dec();

        let outcome = if deliver(&state, &notification, policy).await {
            "sent"
        } else {
            "failed"
        };
        state
            .metrics
            .notifications_total
            .with_label_values(&[outcome])
            .inc();
    }

    warn!("notification worker stopped: queue channel closed");
}

async fn deliver(state: &AppState, notification: &Notification, policy: RetryPolicy) -> bool {
    for attempt in 1..=policy.max_attempts {
        match state.notifier.send(notification).await {
            Ok(()) => return true,
            Err(err) if attempt < policy.max_attempts => {
                warn!(
                    notification_id = %notification.id,
                    attempt,
                    error = %err,
                    "notification attempt failed; retrying"
                );
                sleep(policy.delay_for(attempt)).await;
            }
            Err(err) => {
                error!(
                    notification_id = %notification.id,
                    kind = notification.kind.as_str(),
                    recipient = %notification.recipient,
                    attempts = attempt,
                    error = %err,
                    "notification dropped after final attempt"
                );
            }
        }
    }

    false
}
