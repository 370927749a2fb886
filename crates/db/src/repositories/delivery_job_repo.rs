//! Repository for the `delivery_jobs` table.
//!
//! Each state change is a single guarded `UPDATE`. When the guard rejects a
//! row, [`DeliveryJobRepo::explain_miss`] looks the job up once more to tell a
//! missing id apart from a forbidden transition.

use async_trait::async_trait;
use emporia_core::types::DbId;
use sqlx::PgPool;

use crate::error::{StoreError, StoreResult};
use crate::models::delivery_job::{DeliveryJob, NewDeliveryJob, QueueStats, STATUS_SENT};
use crate::store::DeliveryQueue;

/// Column list for `delivery_jobs` queries.
const COLUMNS: &str = "id, notification_id, recipient_email, recipient_name, subject, \
    template_name, template_data, body_html, priority, status, attempts, max_attempts, \
    last_error, scheduled_at, sent_at, created_at, updated_at";

const ENTITY: &str = "Delivery job";

/// PostgreSQL-backed [`DeliveryQueue`].
#[derive(Clone)]
pub struct DeliveryJobRepo {
    pool: PgPool,
}

impl DeliveryJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn explain_miss(&self, id: DbId, action: &'static str) -> StoreError {
        let status: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM delivery_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        match status {
            Ok(Some(s)) if s == STATUS_SENT => StoreError::InvalidTransition {
                id,
                status: STATUS_SENT,
                action,
            },
            Ok(_) => StoreError::NotFound { entity: ENTITY, id },
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl DeliveryQueue for DeliveryJobRepo {
    async fn enqueue(&self, new: &NewDeliveryJob) -> StoreResult<DbId> {
        let (template_name, template_data, body_html) = new.body.to_columns();
        let id = sqlx::query_scalar(
            "INSERT INTO delivery_jobs \
                (notification_id, recipient_email, recipient_name, subject, template_name, \
                 template_data, body_html, priority, max_attempts, scheduled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id",
        )
        .bind(new.notification_id)
        .bind(&new.recipient_email)
        .bind(&new.recipient_name)
        .bind(&new.subject)
        .bind(template_name)
        .bind(template_data)
        .bind(body_html)
        .bind(new.priority.rank())
        .bind(new.max_attempts)
        .bind(new.scheduled_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<DeliveryJob>> {
        let query = format!("SELECT {COLUMNS} FROM delivery_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, DeliveryJob>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn claim_batch(&self, limit: i64) -> StoreResult<Vec<DeliveryJob>> {
        let query = format!(
            "SELECT {COLUMNS} FROM delivery_jobs \
             WHERE status = 'pending' \
               AND attempts < max_attempts \
               AND (scheduled_at IS NULL OR scheduled_at <= NOW()) \
             ORDER BY priority DESC, created_at ASC, id ASC \
             LIMIT $1"
        );
        let rows = sqlx::query_as::<_, DeliveryJob>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn mark_sent(&self, id: DbId) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE delivery_jobs \
             SET status = 'sent', sent_at = COALESCE(sent_at, NOW()), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }

    async fn increment_attempts(&self, id: DbId, error: &str) -> StoreResult<i32> {
        let attempts: Option<i32> = sqlx::query_scalar(
            "UPDATE delivery_jobs \
             SET attempts = attempts + 1, last_error = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING attempts",
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;
        attempts.ok_or(StoreError::NotFound { entity: ENTITY, id })
    }

    async fn mark_failed(&self, id: DbId, error: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE delivery_jobs \
             SET status = 'failed', attempts = attempts + 1, last_error = $2, updated_at = NOW() \
             WHERE id = $1 AND status <> 'sent'",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.explain_miss(id, "marked failed").await);
        }
        Ok(())
    }

    async fn retry(&self, id: DbId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE delivery_jobs \
             SET status = 'pending', last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND status <> 'sent' AND attempts < max_attempts",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reset(&self, id: DbId) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE delivery_jobs \
             SET status = 'pending', attempts = 0, last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND status <> 'sent'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.explain_miss(id, "reset").await);
        }
        Ok(())
    }

    async fn get_failed(&self, limit: i64) -> StoreResult<Vec<DeliveryJob>> {
        let query = format!(
            "SELECT {COLUMNS} FROM delivery_jobs \
             WHERE status = 'failed' \
                OR (status = 'pending' AND attempts >= max_attempts) \
             ORDER BY updated_at DESC, id DESC \
             LIMIT $1"
        );
        let rows = sqlx::query_as::<_, DeliveryJob>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn stats(&self) -> StoreResult<QueueStats> {
        let (total, pending, sent, failed, exhausted): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT COUNT(*), \
                        COUNT(*) FILTER (WHERE status = 'pending'), \
                        COUNT(*) FILTER (WHERE status = 'sent'), \
                        COUNT(*) FILTER (WHERE status = 'failed'), \
                        COUNT(*) FILTER (WHERE status = 'pending' AND attempts >= max_attempts) \
                 FROM delivery_jobs",
            )
            .fetch_one(&self.pool)
            .await?;
        Ok(QueueStats {
            total,
            pending,
            sent,
            failed,
            exhausted,
        })
    }

    async fn delete_old_sent(&self, days_old: i32) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM delivery_jobs \
             WHERE status = 'sent' AND sent_at < NOW() - make_interval(days => $1)",
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
