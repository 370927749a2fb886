//! Repository for the `notifications` table.

use async_trait::async_trait;
use emporia_core::notification::{Priority, UserRef};
use emporia_core::types::DbId;
use sqlx::PgPool;

use crate::error::StoreResult;
use crate::models::notification::{
    NewNotification, Notification, NotificationFilter, NotificationStats, RECENT_WINDOW_HOURS,
};
use crate::store::NotificationStore;

/// Column list for `notifications` queries.
const COLUMNS: &str = "id, user_id, user_type, notification_type, title, message, data, \
    action_url, priority, is_read, read_at, created_at";

/// PostgreSQL-backed [`NotificationStore`].
#[derive(Clone)]
pub struct NotificationRepo {
    pool: PgPool,
}

impl NotificationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepo {
    async fn create(&self, new: &NewNotification) -> StoreResult<DbId> {
        let id = sqlx::query_scalar(
            "INSERT INTO notifications \
                (user_id, user_type, notification_type, title, message, data, action_url, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(new.recipient.user_id)
        .bind(new.recipient.user_type.as_str())
        .bind(new.notification_type.as_str())
        .bind(&new.title)
        .bind(&new.message)
        .bind(&new.data)
        .bind(&new.action_url)
        .bind(new.priority.rank())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Notification>> {
        let query = format!("SELECT {COLUMNS} FROM notifications WHERE id = $1");
        let row = sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_by_user(
        &self,
        user: UserRef,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE user_id = $1 AND user_type = $2 \
               AND ($3::bool IS NULL OR is_read = $3) \
               AND ($4::text IS NULL OR notification_type = $4) \
               AND ($5::smallint IS NULL OR priority = $5) \
             ORDER BY priority DESC, created_at DESC, id DESC \
             LIMIT $6 OFFSET $7"
        );
        let rows = sqlx::query_as::<_, Notification>(&query)
            .bind(user.user_id)
            .bind(user.user_type.as_str())
            .bind(filter.is_read)
            .bind(filter.notification_type.map(|t| t.as_str()))
            .bind(filter.priority.map(Priority::rank))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn unread_count(&self, user: UserRef) -> StoreResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE user_id = $1 AND user_type = $2 AND is_read = false",
        )
        .bind(user.user_id)
        .bind(user.user_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    async fn recent(&self, user: UserRef, limit: i64) -> StoreResult<Vec<Notification>> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE user_id = $1 AND user_type = $2 \
               AND created_at >= NOW() - make_interval(hours => $3) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4"
        );
        let rows = sqlx::query_as::<_, Notification>(&query)
            .bind(user.user_id)
            .bind(user.user_type.as_str())
            .bind(RECENT_WINDOW_HOURS as i32)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn stats(&self, user: UserRef) -> StoreResult<NotificationStats> {
        let (total, unread, urgent_unread): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE is_read = false), \
                    COUNT(*) FILTER (WHERE is_read = false AND priority = $3) \
             FROM notifications \
             WHERE user_id = $1 AND user_type = $2",
        )
        .bind(user.user_id)
        .bind(user.user_type.as_str())
        .bind(Priority::Urgent.rank())
        .fetch_one(&self.pool)
        .await?;
        Ok(NotificationStats {
            total,
            unread,
            read: total - unread,
            urgent_unread,
        })
    }

    async fn mark_as_read(&self, id: DbId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_read = true, read_at = NOW() \
             WHERE id = $1 AND is_read = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_as_unread(&self, id: DbId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_read = false, read_at = NULL \
             WHERE id = $1 AND is_read = true",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_as_read(&self, user: UserRef) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_read = true, read_at = NOW() \
             WHERE user_id = $1 AND user_type = $2 AND is_read = false",
        )
        .bind(user.user_id)
        .bind(user.user_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: DbId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_read(&self, user: UserRef) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE user_id = $1 AND user_type = $2 AND is_read = true",
        )
        .bind(user.user_id)
        .bind(user.user_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_old_read(&self, days_old: i32) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE is_read = true AND read_at < NOW() - make_interval(days => $1)",
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
