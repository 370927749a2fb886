//! Notification entity models and DTOs.

use chrono::Duration;
use emporia_core::notification::{NotificationType, Priority, UserRef, UserType};
use emporia_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use super::{decode_error, parse_column};

/// How far back [`NotificationStore::recent`](crate::store::NotificationStore::recent) looks.
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Default page size for inbox queries.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// A row from the `notifications` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub user_type: UserType,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub action_url: Option<String>,
    pub priority: Priority,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Notification {
    pub fn recipient(&self) -> UserRef {
        UserRef::new(self.user_id, self.user_type)
    }

    pub(crate) fn from_new(id: DbId, new: &NewNotification, now: Timestamp) -> Self {
        Self {
            id,
            user_id: new.recipient.user_id,
            user_type: new.recipient.user_type,
            notification_type: new.notification_type,
            title: new.title.clone(),
            message: new.message.clone(),
            data: new.data.clone(),
            action_url: new.action_url.clone(),
            priority: new.priority,
            is_read: false,
            read_at: None,
            created_at: now,
        }
    }

    /// Set the read state. Returns `false` if it was already read.
    pub(crate) fn mark_read(&mut self, now: Timestamp) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(now);
        true
    }

    /// Clear the read state. Returns `false` if it was already unread.
    pub(crate) fn mark_unread(&mut self) -> bool {
        if !self.is_read {
            return false;
        }
        self.is_read = false;
        self.read_at = None;
        true
    }

    pub(crate) fn is_recent(&self, now: Timestamp) -> bool {
        self.created_at >= now - Duration::hours(RECENT_WINDOW_HOURS)
    }
}

impl<'r> FromRow<'r, PgRow> for Notification {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let priority: i16 = row.try_get("priority")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            user_type: parse_column(row, "user_type")?,
            notification_type: parse_column(row, "notification_type")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            data: row.try_get("data")?,
            action_url: row.try_get("action_url")?,
            priority: Priority::from_rank(priority).map_err(|e| decode_error("priority", e))?,
            is_read: row.try_get("is_read")?,
            read_at: row.try_get("read_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// DTO for creating a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub recipient: UserRef,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
    pub action_url: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl NewNotification {
    pub fn new(
        recipient: UserRef,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            notification_type,
            title: title.into(),
            message: message.into(),
            data: empty_object(),
            action_url: None,
            priority: Priority::Normal,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Inbox query filters. `None` fields do not constrain the result.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
    pub notification_type: Option<NotificationType>,
    pub priority: Option<Priority>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for NotificationFilter {
    fn default() -> Self {
        Self {
            is_read: None,
            notification_type: None,
            priority: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl NotificationFilter {
    pub fn unread() -> Self {
        Self {
            is_read: Some(false),
            ..Default::default()
        }
    }

    pub(crate) fn matches(&self, n: &Notification) -> bool {
        self.is_read.map_or(true, |r| n.is_read == r)
            && self.notification_type.map_or(true, |t| n.notification_type == t)
            && self.priority.map_or(true, |p| n.priority == p)
    }
}

/// Read-only inbox aggregates for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub total: i64,
    pub unread: i64,
    pub read: i64,
    pub urgent_unread: i64,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample() -> Notification {
        let new = NewNotification::new(UserRef::client(1), NotificationType::Order, "t", "m");
        Notification::from_new(1, &new, Utc::now())
    }

    #[test]
    fn new_notification_starts_unread() {
        let n = sample();
        assert!(!n.is_read);
        assert!(n.read_at.is_none());
        assert!(n.data.is_object());
    }

    #[test]
    fn mark_read_is_idempotent_and_keeps_first_timestamp() {
        let mut n = sample();
        let first = Utc::now();
        assert!(n.mark_read(first));
        assert!(!n.mark_read(first + Duration::minutes(5)));
        assert_eq!(n.read_at, Some(first));
    }

    #[test]
    fn filter_combines_fields() {
        let mut n = sample();
        n.priority = Priority::Urgent;

        assert!(NotificationFilter::default().matches(&n));
        assert!(NotificationFilter::unread().matches(&n));

        let by_type = NotificationFilter {
            notification_type: Some(NotificationType::Payment),
            ..Default::default()
        };
        assert!(!by_type.matches(&n));

        let by_priority = NotificationFilter {
            priority: Some(Priority::Urgent),
            is_read: Some(false),
            ..Default::default()
        };
        assert!(by_priority.matches(&n));
    }

    #[test]
    fn serializes_type_field_name() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "order");
        assert_eq!(json["user_type"], "client");
        assert_eq!(json["priority"], "normal");
    }
}
