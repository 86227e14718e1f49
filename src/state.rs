use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{NotificationConfig, NotificationMode};
use crate::notify::{Notification, Notifier};
use crate::observability::metrics::Metrics;
use crate::registry::Registry;

pub struct AppState {
    pub registry: Arc<dyn Registry>,
    pub notifier: Arc<dyn Notifier>,
    pub notification_mode: NotificationMode,
    pub outbox_tx: mpsc::Sender<Notification>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn Registry>,
        notifier: Arc<dyn Notifier>,
        notifications: &NotificationConfig,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let (outbox_tx, outbox_rx) = mpsc::channel(notifications.queue_size.max(1));

        (
            Self {
                registry,
                notifier,
                notification_mode: notifications.mode,
                outbox_tx,
                metrics: Metrics::new(),
            },
            outbox_rx,
        )
    }
}
