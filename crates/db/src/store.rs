//! Store interfaces consumed by the dispatcher and the queue worker.
//!
//! Each trait has a PostgreSQL implementation in [`crate::repositories`] and
//! an in-process one in [`crate::memory`].

use async_trait::async_trait;
use emporia_core::channels::Channel;
use emporia_core::notification::{NotificationType, UserRef};
use emporia_core::types::DbId;

use crate::error::StoreResult;
use crate::models::delivery_job::{DeliveryJob, NewDeliveryJob, QueueStats};
use crate::models::notification::{
    NewNotification, Notification, NotificationFilter, NotificationStats,
};
use crate::models::preference::{ChannelSettings, NotificationPreference, UpdatePreference};

/// Per-user, per-type channel toggles.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// The stored row, if any.
    async fn get(
        &self,
        user: UserRef,
        notification_type: NotificationType,
    ) -> StoreResult<Option<NotificationPreference>>;

    async fn list_for_user(&self, user: UserRef) -> StoreResult<Vec<NotificationPreference>>;

    /// Upsert. A new row starts from [`ChannelSettings::default`] with the
    /// provided flags applied; an existing row has only the provided flags
    /// overwritten.
    async fn update(
        &self,
        user: UserRef,
        notification_type: NotificationType,
        update: &UpdatePreference,
    ) -> StoreResult<NotificationPreference>;

    /// Seed an all-enabled row for every notification type the user lacks.
    /// Existing rows are left alone. Returns the number of rows created.
    async fn initialize_defaults(&self, user: UserRef) -> StoreResult<u64>;

    /// Effective settings: the stored row, or all channels enabled.
    async fn settings(
        &self,
        user: UserRef,
        notification_type: NotificationType,
    ) -> StoreResult<ChannelSettings> {
        Ok(self
            .get(user, notification_type)
            .await?
            .map(|p| p.settings)
            .unwrap_or_default())
    }

    async fn is_enabled(
        &self,
        user: UserRef,
        notification_type: NotificationType,
        channel: Channel,
    ) -> StoreResult<bool> {
        Ok(self.settings(user, notification_type).await?.allows(channel))
    }
}

/// Durable in-app notifications and their read state.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, new: &NewNotification) -> StoreResult<DbId>;

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Notification>>;

    /// Ordered by priority (highest first), then newest first.
    async fn get_by_user(
        &self,
        user: UserRef,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>>;

    async fn unread_count(&self, user: UserRef) -> StoreResult<i64>;

    /// Notifications created within the last 24 hours, newest first.
    async fn recent(&self, user: UserRef, limit: i64) -> StoreResult<Vec<Notification>>;

    async fn stats(&self, user: UserRef) -> StoreResult<NotificationStats>;

    /// Returns `false` when the row is missing or already read.
    async fn mark_as_read(&self, id: DbId) -> StoreResult<bool>;

    async fn mark_as_unread(&self, id: DbId) -> StoreResult<bool>;

    /// Returns the number of rows that changed.
    async fn mark_all_as_read(&self, user: UserRef) -> StoreResult<u64>;

    async fn delete(&self, id: DbId) -> StoreResult<bool>;

    async fn delete_all_read(&self, user: UserRef) -> StoreResult<u64>;

    /// Delete read notifications whose `read_at` is older than `days_old` days.
    async fn delete_old_read(&self, days_old: i32) -> StoreResult<u64>;
}

/// Outbound email job queue.
///
/// `claim_batch` is a filtered read, not a lock: two consumers may claim the
/// same job, and delivery is at-least-once.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn enqueue(&self, new: &NewDeliveryJob) -> StoreResult<DbId>;

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<DeliveryJob>>;

    /// Pending, due and under the attempt cap. Ordered by priority (highest
    /// first), then oldest first.
    async fn claim_batch(&self, limit: i64) -> StoreResult<Vec<DeliveryJob>>;

    async fn mark_sent(&self, id: DbId) -> StoreResult<()>;

    /// Record a failed attempt without changing status. Returns the new count.
    async fn increment_attempts(&self, id: DbId, error: &str) -> StoreResult<i32>;

    async fn mark_failed(&self, id: DbId, error: &str) -> StoreResult<()>;

    /// Move a job back to pending while attempts remain. Attempts are kept.
    async fn retry(&self, id: DbId) -> StoreResult<bool>;

    /// Administrative requeue with attempts zeroed.
    async fn reset(&self, id: DbId) -> StoreResult<()>;

    /// Failed jobs and exhausted pending ones, newest update first.
    async fn get_failed(&self, limit: i64) -> StoreResult<Vec<DeliveryJob>>;

    async fn stats(&self) -> StoreResult<QueueStats>;

    async fn delete_old_sent(&self, days_old: i32) -> StoreResult<u64>;
}
