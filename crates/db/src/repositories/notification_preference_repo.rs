//! Repository for the `notification_preferences` table.

use async_trait::async_trait;
use emporia_core::notification::{NotificationType, UserRef};
use sqlx::PgPool;

use crate::error::StoreResult;
use crate::models::preference::{NotificationPreference, UpdatePreference};
use crate::store::PreferenceStore;

/// Column list for `notification_preferences` queries.
const COLUMNS: &str = "id, user_id, user_type, notification_type, in_app_enabled, \
    email_enabled, sms_enabled, created_at, updated_at";

/// PostgreSQL-backed [`PreferenceStore`].
#[derive(Clone)]
pub struct NotificationPreferenceRepo {
    pool: PgPool,
}

impl NotificationPreferenceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for NotificationPreferenceRepo {
    async fn get(
        &self,
        user: UserRef,
        notification_type: NotificationType,
    ) -> StoreResult<Option<NotificationPreference>> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_preferences \
             WHERE user_id = $1 AND user_type = $2 AND notification_type = $3"
        );
        let row = sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(user.user_id)
            .bind(user.user_type.as_str())
            .bind(notification_type.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_for_user(&self, user: UserRef) -> StoreResult<Vec<NotificationPreference>> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_preferences \
             WHERE user_id = $1 AND user_type = $2 \
             ORDER BY notification_type"
        );
        let rows = sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(user.user_id)
            .bind(user.user_type.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Uses `COALESCE` so only fields that are `Some` overwrite the stored row;
    /// a fresh row falls back to the all-enabled column defaults.
    async fn update(
        &self,
        user: UserRef,
        notification_type: NotificationType,
        update: &UpdatePreference,
    ) -> StoreResult<NotificationPreference> {
        let query = format!(
            "INSERT INTO notification_preferences \
                (user_id, user_type, notification_type, in_app_enabled, email_enabled, sms_enabled) \
             VALUES ($1, $2, $3, COALESCE($4, true), COALESCE($5, true), COALESCE($6, true)) \
             ON CONFLICT (user_id, user_type, notification_type) DO UPDATE SET \
                in_app_enabled = COALESCE($4, notification_preferences.in_app_enabled), \
                email_enabled = COALESCE($5, notification_preferences.email_enabled), \
                sms_enabled = COALESCE($6, notification_preferences.sms_enabled), \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(user.user_id)
            .bind(user.user_type.as_str())
            .bind(notification_type.as_str())
            .bind(update.in_app_enabled)
            .bind(update.email_enabled)
            .bind(update.sms_enabled)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn initialize_defaults(&self, user: UserRef) -> StoreResult<u64> {
        let types: Vec<&str> = NotificationType::ALL.iter().map(|t| t.as_str()).collect();
        let result = sqlx::query(
            "INSERT INTO notification_preferences (user_id, user_type, notification_type) \
             SELECT $1, $2, t FROM UNNEST($3::text[]) AS t \
             ON CONFLICT (user_id, user_type, notification_type) DO NOTHING",
        )
        .bind(user.user_id)
        .bind(user.user_type.as_str())
        .bind(&types)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
