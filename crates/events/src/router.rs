//! Event-to-notification routing service.
//!
//! [`NotificationRouter`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and sends one notification per recipient of every [`BusinessEvent`]. It
//! stops when the bus is dropped or the cancellation token fires.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::BusinessEvent;
use crate::dispatcher::NotificationDispatcher;

/// Background service that fans business events out to recipients.
pub struct NotificationRouter {
    dispatcher: Arc<NotificationDispatcher>,
}

/// Per-event result counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteReport {
    pub delivered: usize,
    pub failed: usize,
}

impl NotificationRouter {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Run the routing loop until the channel closes or `cancel` fires.
    pub async fn run(
        &self,
        mut receiver: broadcast::Receiver<BusinessEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification router cancelled");
                    break;
                }
                received = receiver.recv() => received,
            };

            match received {
                Ok(event) => {
                    self.route(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Notification router lagged, some events were not routed"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Send the notification for one event to each of its recipients.
    pub async fn route(&self, event: &BusinessEvent) -> RouteReport {
        let Some(first) = event.recipients.first() else {
            tracing::debug!(event = event.kind.name(), "Event has no recipients");
            return RouteReport::default();
        };

        let request = event.kind.to_request(*first);
        let results = self
            .dispatcher
            .send_to_multiple(&event.recipients, &request)
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        let report = RouteReport {
            delivered: results.len() - failed,
            failed,
        };
        tracing::debug!(
            event = event.kind.name(),
            delivered = report.delivered,
            failed = report.failed,
            "Event routed"
        );
        report
    }
}
