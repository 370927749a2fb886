//! Delivery queue models.
//!
//! A [`DeliveryJob`] is one queued attempt to deliver a notification's email
//! channel. Its lifecycle is modelled by [`DeliveryState`]:
//!
//! ```text
//!            mark_sent                       (terminal)
//! Pending ─────────────► Sent { sent_at }
//!    │  ▲
//!    │  │ retry (attempts < max) / reset
//!    ▼  │
//!  Failed
//! ```
//!
//! `state`, `attempts` and `last_error` are private: they only change through
//! the transition methods (in-memory store) or the matching SQL statements
//! (PostgreSQL repository).

use emporia_core::notification::Priority;
use emporia_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use super::decode_error;
use crate::error::StoreError;

/// Attempts allowed before a job becomes a dead letter.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Status column values.
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_FAILED: &str = "failed";

// ---------------------------------------------------------------------------
// DeliveryBody
// ---------------------------------------------------------------------------

/// What gets rendered into the outbound HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryBody {
    /// Render `name` through the template renderer with `data`.
    Template {
        name: String,
        data: serde_json::Value,
    },
    /// Pre-rendered HTML, wrapped in the default layout at send time.
    Raw { html: String },
}

impl DeliveryBody {
    pub fn template(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self::Template {
            name: name.into(),
            data,
        }
    }

    pub fn raw(html: impl Into<String>) -> Self {
        Self::Raw { html: html.into() }
    }

    /// Split into `(template_name, template_data, body_html)` column values.
    pub(crate) fn to_columns(&self) -> (Option<&str>, serde_json::Value, Option<&str>) {
        match self {
            DeliveryBody::Template { name, data } => (Some(name.as_str()), data.clone(), None),
            DeliveryBody::Raw { html } => (
                None,
                serde_json::Value::Object(Default::default()),
                Some(html.as_str()),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// DeliveryState
// ---------------------------------------------------------------------------

/// Lifecycle state of a delivery job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryState {
    Pending,
    Sent { sent_at: Timestamp },
    Failed,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pending => STATUS_PENDING,
            DeliveryState::Sent { .. } => STATUS_SENT,
            DeliveryState::Failed => STATUS_FAILED,
        }
    }

    pub fn sent_at(&self) -> Option<Timestamp> {
        match self {
            DeliveryState::Sent { sent_at } => Some(*sent_at),
            _ => None,
        }
    }

    fn from_columns(status: &str, sent_at: Option<Timestamp>) -> Option<Self> {
        match (status, sent_at) {
            (STATUS_PENDING, None) => Some(DeliveryState::Pending),
            (STATUS_SENT, Some(sent_at)) => Some(DeliveryState::Sent { sent_at }),
            (STATUS_FAILED, None) => Some(DeliveryState::Failed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DeliveryJob
// ---------------------------------------------------------------------------

/// A row from the `delivery_jobs` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryJob {
    pub id: DbId,
    /// Correlation back-reference to the anchoring notification.
    pub notification_id: DbId,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: DeliveryBody,
    pub priority: Priority,
    pub max_attempts: i32,
    pub scheduled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    #[serde(flatten)]
    state: DeliveryState,
    attempts: i32,
    last_error: Option<String>,
    updated_at: Timestamp,
}

impl DeliveryJob {
    pub fn state(&self) -> DeliveryState {
        self.state
    }

    pub fn attempts(&self) -> i32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn is_pending(&self) -> bool {
        self.state == DeliveryState::Pending
    }

    /// Pending with every attempt used: stuck until marked failed or reset.
    pub fn is_exhausted(&self) -> bool {
        self.is_pending() && self.attempts >= self.max_attempts
    }

    /// The dead-letter view: failed, or exhausted while still pending.
    pub fn is_dead_letter(&self) -> bool {
        self.state == DeliveryState::Failed || self.is_exhausted()
    }

    /// Eligible for `claim_batch` at `now`.
    pub fn is_claimable(&self, now: Timestamp) -> bool {
        self.is_pending()
            && self.attempts < self.max_attempts
            && self.scheduled_at.map_or(true, |at| at <= now)
    }

    pub(crate) fn from_new(id: DbId, new: &NewDeliveryJob, now: Timestamp) -> Self {
        Self {
            id,
            notification_id: new.notification_id,
            recipient_email: new.recipient_email.clone(),
            recipient_name: new.recipient_name.clone(),
            subject: new.subject.clone(),
            body: new.body.clone(),
            priority: new.priority,
            max_attempts: new.max_attempts,
            scheduled_at: new.scheduled_at,
            created_at: now,
            state: DeliveryState::Pending,
            attempts: 0,
            last_error: None,
            updated_at: now,
        }
    }

    /// Pending/Failed → Sent. Marking an already sent job keeps its first `sent_at`.
    pub(crate) fn mark_sent(&mut self, now: Timestamp) {
        if self.state.sent_at().is_some() {
            return;
        }
        self.state = DeliveryState::Sent { sent_at: now };
        self.updated_at = now;
    }

    /// Count a failed attempt without changing state. Returns the new count.
    pub(crate) fn record_attempt(&mut self, error: &str, now: Timestamp) -> i32 {
        self.attempts += 1;
        self.last_error = Some(error.to_string());
        self.updated_at = now;
        self.attempts
    }

    /// Pending → Failed, counting one more attempt.
    pub(crate) fn mark_failed(&mut self, error: &str, now: Timestamp) -> Result<(), StoreError> {
        self.guard_not_sent("marked failed")?;
        self.state = DeliveryState::Failed;
        self.record_attempt(error, now);
        Ok(())
    }

    /// Requeue without penalty. Only when attempts remain.
    pub(crate) fn retry(&mut self, now: Timestamp) -> bool {
        if self.state.sent_at().is_some() || self.attempts >= self.max_attempts {
            return false;
        }
        self.state = DeliveryState::Pending;
        self.last_error = None;
        self.updated_at = now;
        true
    }

    /// Administrative requeue with a fresh attempt budget.
    pub(crate) fn reset(&mut self, now: Timestamp) -> Result<(), StoreError> {
        self.guard_not_sent("reset")?;
        self.state = DeliveryState::Pending;
        self.attempts = 0;
        self.last_error = None;
        self.updated_at = now;
        Ok(())
    }

    fn guard_not_sent(&self, action: &'static str) -> Result<(), StoreError> {
        if self.state.sent_at().is_some() {
            return Err(StoreError::InvalidTransition {
                id: self.id,
                status: STATUS_SENT,
                action,
            });
        }
        Ok(())
    }
}

impl<'r> FromRow<'r, PgRow> for DeliveryJob {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let template_name: Option<String> = row.try_get("template_name")?;
        let body_html: Option<String> = row.try_get("body_html")?;
        let body = match (template_name, body_html) {
            (Some(name), _) => DeliveryBody::Template {
                name,
                data: row.try_get("template_data")?,
            },
            (None, Some(html)) => DeliveryBody::Raw { html },
            (None, None) => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "body_html".to_string(),
                    source: "delivery job has neither template nor body".into(),
                })
            }
        };

        let status: String = row.try_get("status")?;
        let sent_at: Option<Timestamp> = row.try_get("sent_at")?;
        let state = DeliveryState::from_columns(&status, sent_at).ok_or_else(|| {
            sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: format!("inconsistent status {status:?} / sent_at {sent_at:?}").into(),
            }
        })?;

        let priority: i16 = row.try_get("priority")?;
        Ok(Self {
            id: row.try_get("id")?,
            notification_id: row.try_get("notification_id")?,
            recipient_email: row.try_get("recipient_email")?,
            recipient_name: row.try_get("recipient_name")?,
            subject: row.try_get("subject")?,
            body,
            priority: Priority::from_rank(priority).map_err(|e| decode_error("priority", e))?,
            max_attempts: row.try_get("max_attempts")?,
            scheduled_at: row.try_get("scheduled_at")?,
            created_at: row.try_get("created_at")?,
            state,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

// ---------------------------------------------------------------------------
// NewDeliveryJob
// ---------------------------------------------------------------------------

/// DTO for enqueueing a delivery job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDeliveryJob {
    pub notification_id: DbId,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: DeliveryBody,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// `None` means eligible immediately.
    pub scheduled_at: Option<Timestamp>,
}

fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}

impl NewDeliveryJob {
    pub fn new(
        notification_id: DbId,
        recipient_email: impl Into<String>,
        subject: impl Into<String>,
        body: DeliveryBody,
    ) -> Self {
        Self {
            notification_id,
            recipient_email: recipient_email.into(),
            recipient_name: None,
            subject: subject.into(),
            body,
            priority: Priority::Normal,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            scheduled_at: None,
        }
    }

    pub fn with_recipient_name(mut self, name: impl Into<String>) -> Self {
        self.recipient_name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn scheduled_at(mut self, at: Timestamp) -> Self {
        self.scheduled_at = Some(at);
        self
    }
}

/// Queue-wide counters for operational alerting.
///
/// `pending` counts every pending row; `exhausted` is the subset of those
/// that can no longer be claimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: i64,
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub exhausted: i64,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::*;

    fn job() -> DeliveryJob {
        let new = NewDeliveryJob::new(
            1,
            "owner@example.com",
            "New order",
            DeliveryBody::raw("<p>hi</p>"),
        );
        DeliveryJob::from_new(10, &new, Utc::now())
    }

    #[test]
    fn new_job_is_pending_and_claimable() {
        let job = job();
        assert_eq!(job.state(), DeliveryState::Pending);
        assert_eq!(job.attempts(), 0);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(job.is_claimable(Utc::now()));
    }

    #[test]
    fn future_schedule_is_not_claimable_until_due() {
        let now = Utc::now();
        let mut job = job();
        job.scheduled_at = Some(now + Duration::hours(1));
        assert!(!job.is_claimable(now));
        assert!(job.is_claimable(now + Duration::hours(1)));
    }

    #[test]
    fn exhausted_job_stays_pending_but_unclaimable() {
        let now = Utc::now();
        let mut job = job();
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            job.record_attempt("smtp down", now);
        }
        assert!(job.is_pending());
        assert!(job.is_exhausted());
        assert!(job.is_dead_letter());
        assert!(!job.is_claimable(now));
        assert_eq!(job.last_error(), Some("smtp down"));
    }

    #[test]
    fn sent_job_cannot_be_failed_or_reset() {
        let now = Utc::now();
        let mut job = job();
        job.mark_sent(now);
        assert_eq!(job.state().sent_at(), Some(now));

        assert_matches!(
            job.mark_failed("late error", now),
            Err(StoreError::InvalidTransition { action: "marked failed", .. })
        );
        assert_matches!(job.reset(now), Err(StoreError::InvalidTransition { .. }));
        assert!(!job.retry(now));
    }

    #[test]
    fn mark_sent_twice_keeps_first_timestamp() {
        let first = Utc::now();
        let mut job = job();
        job.mark_sent(first);
        job.mark_sent(first + Duration::seconds(30));
        assert_eq!(job.state().sent_at(), Some(first));
    }

    #[test]
    fn retry_does_not_refund_attempts() {
        let now = Utc::now();
        let mut job = job();
        job.mark_failed("bounce", now).unwrap();
        assert_eq!(job.attempts(), 1);

        assert!(job.retry(now));
        assert!(job.is_pending());
        assert_eq!(job.attempts(), 1);
        assert!(job.last_error().is_none());
    }

    #[test]
    fn retry_refused_once_attempts_are_spent() {
        let now = Utc::now();
        let mut job = job();
        job.record_attempt("a", now);
        job.record_attempt("b", now);
        job.mark_failed("c", now).unwrap();
        assert!(!job.retry(now));
        assert_eq!(job.state(), DeliveryState::Failed);

        job.reset(now).unwrap();
        assert!(job.is_claimable(now));
        assert_eq!(job.attempts(), 0);
    }

    #[test]
    fn state_round_trips_through_columns() {
        let now = Utc::now();
        assert_eq!(
            DeliveryState::from_columns(STATUS_SENT, Some(now)),
            Some(DeliveryState::Sent { sent_at: now })
        );
        assert_eq!(DeliveryState::from_columns(STATUS_SENT, None), None);
        assert_eq!(DeliveryState::from_columns(STATUS_PENDING, Some(now)), None);
    }
}
