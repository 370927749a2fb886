//! Turns a notification request into an in-app row and, when wanted, a
//! queued email.
//!
//! Flow for [`NotificationDispatcher::send`]:
//!
//! 1. Look up in-app and email enablement for `(user, type)`.
//! 2. In-app enabled: create the notification.
//! 3. Email is attempted when it is enabled and a notification was created,
//!    or when the priority is high/urgent regardless of preferences. An
//!    escalated send creates the notification if step 2 did not, because
//!    every job references one.
//! 4. The recipient comes from the [`DirectoryRegistry`]. No address or a
//!    failed lookup skips email without touching the in-app result.
//! 5. The job is enqueued with the type's template.
//! 6. High/urgent jobs are processed inline; their outcome never fails `send`.

use std::sync::Arc;

use emporia_core::channels::Channel;
use emporia_core::notification::{NotificationType, Priority, UserRef};
use emporia_core::types::DbId;
use emporia_db::models::delivery_job::{DeliveryBody, NewDeliveryJob};
use emporia_db::models::notification::NewNotification;
use emporia_db::{DeliveryQueue, NotificationStore, PreferenceStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::NotifyConfig;
use crate::directory::{DirectoryRegistry, Recipient};
use crate::error::NotifyResult;
use crate::worker::QueueWorker;

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// A notification to send to one user.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub recipient: UserRef,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
    pub action_url: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl SendRequest {
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
            data: None,
            action_url: None,
            priority: Priority::Normal,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
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

    /// The same request addressed to someone else.
    pub fn for_recipient(&self, recipient: UserRef) -> Self {
        Self {
            recipient,
            ..self.clone()
        }
    }

    fn to_notification(&self) -> NewNotification {
        let mut new = NewNotification::new(
            self.recipient,
            self.notification_type,
            self.title.clone(),
            self.message.clone(),
        )
        .with_priority(self.priority);
        if let Some(data) = &self.data {
            new = new.with_data(data.clone());
        }
        if let Some(url) = &self.action_url {
            new = new.with_action_url(url.clone());
        }
        new
    }
}

/// Per-channel result of one `send`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    /// The in-app channel was enabled and a notification was stored for it.
    pub in_app: bool,
    /// An email job was enqueued.
    pub email: bool,
    /// The stored notification, if any (also set when only escalation created it).
    pub notification_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// NotificationDispatcher
// ---------------------------------------------------------------------------

/// Entry point for sending notifications.
pub struct NotificationDispatcher {
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
    queue: Arc<dyn DeliveryQueue>,
    directory: DirectoryRegistry,
    worker: Arc<QueueWorker>,
    config: NotifyConfig,
}

impl NotificationDispatcher {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
        queue: Arc<dyn DeliveryQueue>,
        directory: DirectoryRegistry,
        worker: Arc<QueueWorker>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            preferences,
            notifications,
            queue,
            directory,
            worker,
            config,
        }
    }

    /// Send one notification. Only storage failures are errors.
    pub async fn send(&self, request: &SendRequest) -> NotifyResult<SendOutcome> {
        let user = request.recipient;
        let notification_type = request.notification_type;

        let in_app_enabled = self
            .preferences
            .is_enabled(user, notification_type, Channel::InApp)
            .await?;
        let email_enabled = self
            .preferences
            .is_enabled(user, notification_type, Channel::Email)
            .await?;

        let mut outcome = SendOutcome::default();
        if in_app_enabled {
            let id = self.notifications.create(&request.to_notification()).await?;
            outcome.in_app = true;
            outcome.notification_id = Some(id);
        }

        let escalated = request.priority.is_escalated();
        let wants_email = (email_enabled && outcome.notification_id.is_some()) || escalated;
        if !wants_email {
            return Ok(outcome);
        }

        let notification_id = match outcome.notification_id {
            Some(id) => id,
            None => {
                let id = self.notifications.create(&request.to_notification()).await?;
                outcome.notification_id = Some(id);
                id
            }
        };

        let Some(recipient) = self.recipient(user).await else {
            return Ok(outcome);
        };

        let job_id = self
            .queue
            .enqueue(&self.delivery_job(request, notification_id, &recipient))
            .await?;
        outcome.email = true;
        tracing::info!(
            user = %user,
            notification_id,
            job_id,
            priority = %request.priority,
            "Email queued"
        );

        if escalated {
            self.deliver_now(job_id).await;
        }
        Ok(outcome)
    }

    /// `send` once per user. Results are independent and in input order.
    pub async fn send_to_multiple(
        &self,
        users: &[UserRef],
        request: &SendRequest,
    ) -> Vec<NotifyResult<SendOutcome>> {
        let mut results = Vec::with_capacity(users.len());
        for &user in users {
            let result = self.send(&request.for_recipient(user)).await;
            if let Err(e) = &result {
                tracing::error!(user = %user, error = %e, "Failed to send notification");
            }
            results.push(result);
        }
        results
    }

    async fn recipient(&self, user: UserRef) -> Option<Recipient> {
        match self.directory.resolve(user).await {
            Ok(Some(recipient)) => Some(recipient),
            Ok(None) => {
                tracing::warn!(user = %user, "No email address on file, skipping email");
                None
            }
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Recipient lookup failed, skipping email");
                None
            }
        }
    }

    fn delivery_job(
        &self,
        request: &SendRequest,
        notification_id: DbId,
        recipient: &Recipient,
    ) -> NewDeliveryJob {
        let mut job = NewDeliveryJob::new(
            notification_id,
            recipient.email.clone(),
            request.title.clone(),
            DeliveryBody::template(
                request.notification_type.template_name(),
                self.template_data(request, recipient),
            ),
        )
        .with_priority(request.priority)
        .with_max_attempts(self.config.max_attempts);
        if let Some(name) = &recipient.name {
            job = job.with_recipient_name(name.clone());
        }
        job
    }

    /// Request data merged with the fields every template and the fallback
    /// layout read. The fixed fields win over same-named request data.
    fn template_data(&self, request: &SendRequest, recipient: &Recipient) -> Value {
        let mut data = match &request.data {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let fixed = json!({
            "title": request.title,
            "message": request.message,
            "action_url": request.action_url.as_deref().map(|u| self.config.absolute_url(u)),
            "recipient_name": recipient.name,
            "notification_type": request.notification_type,
            "priority": request.priority,
        });
        if let Value::Object(fixed) = fixed {
            data.extend(fixed);
        }
        Value::Object(data)
    }

    async fn deliver_now(&self, job_id: DbId) {
        let job = match self.queue.find_by_id(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id, "Escalated job vanished before inline delivery");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to load escalated job");
                return;
            }
        };
        if let Err(e) = self.worker.process_one(&job).await {
            tracing::error!(job_id, error = %e, "Inline delivery bookkeeping failed");
        }
    }
}
