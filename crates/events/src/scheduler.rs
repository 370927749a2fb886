//! Periodic queue draining and retention cleanup.
//!
//! [`MaintenanceScheduler`] runs two `tokio::time::interval` loops in one
//! task: every `batch_interval` it drains the delivery queue, and every
//! `cleanup_interval` it deletes read notifications and sent jobs older than
//! `retention_days`. Both stop when the [`CancellationToken`] fires.

use std::sync::Arc;

use emporia_db::{DeliveryQueue, NotificationStore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::NotifyConfig;
use crate::worker::QueueWorker;

/// Rows removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub notifications: u64,
    pub jobs: u64,
}

/// Background service for scheduled batches and cleanup.
pub struct MaintenanceScheduler {
    worker: Arc<QueueWorker>,
    notifications: Arc<dyn NotificationStore>,
    queue: Arc<dyn DeliveryQueue>,
    config: NotifyConfig,
}

impl MaintenanceScheduler {
    pub fn new(
        worker: Arc<QueueWorker>,
        notifications: Arc<dyn NotificationStore>,
        queue: Arc<dyn DeliveryQueue>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            worker,
            notifications,
            queue,
            config,
        }
    }

    /// Run until `cancel` is triggered. A tick still in progress finishes first.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            batch_size = self.config.batch_size,
            batch_interval_secs = self.config.batch_interval.as_secs(),
            cleanup_interval_secs = self.config.cleanup_interval.as_secs(),
            retention_days = self.config.retention_days,
            "Notification maintenance started"
        );

        let mut batch = tokio::time::interval(self.config.batch_interval);
        batch.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cleanup = tokio::time::interval(self.config.cleanup_interval);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification maintenance stopping");
                    break;
                }
                _ = batch.tick() => {
                    if let Err(e) = self.worker.run_batch(self.config.batch_size).await {
                        tracing::error!(error = %e, "Scheduled delivery batch failed");
                    }
                }
                _ = cleanup.tick() => {
                    self.cleanup().await;
                }
            }
        }
    }

    /// Delete old read notifications and old sent jobs. Each half runs even
    /// if the other fails.
    pub async fn cleanup(&self) -> CleanupReport {
        let days = self.config.retention_days;
        let mut report = CleanupReport::default();

        match self.notifications.delete_old_read(days).await {
            Ok(deleted) => report.notifications = deleted,
            Err(e) => tracing::error!(error = %e, "Notification retention: cleanup failed"),
        }
        match self.queue.delete_old_sent(days).await {
            Ok(deleted) => report.jobs = deleted,
            Err(e) => tracing::error!(error = %e, "Delivery job retention: cleanup failed"),
        }

        if report.notifications > 0 || report.jobs > 0 {
            tracing::info!(
                notifications = report.notifications,
                jobs = report.jobs,
                "Retention: purged old rows"
            );
        } else {
            tracing::debug!("Retention: no rows to purge");
        }
        report
    }
}
