//! Delivery queue consumer.
//!
//! [`QueueWorker::run_batch`] claims eligible jobs and delivers each one;
//! [`QueueWorker::process_one`] does the same for a single job and is what the
//! dispatcher calls inline for escalated notifications.
//!
//! A failed delivery (render or transport) counts one attempt. When attempts
//! reach the job's cap the job is marked failed with the same error, which
//! counts one more attempt: a dead job records `max_attempts + 1`.

use std::sync::Arc;

use emporia_db::models::delivery_job::{DeliveryBody, DeliveryJob};
use emporia_db::{DeliveryQueue, StoreResult};
use serde::Serialize;

use crate::delivery::MailTransport;
use crate::render::{fallback_html, render_layout, RenderError, TemplateRenderer};

/// Default number of jobs claimed per batch.
pub const DEFAULT_BATCH_SIZE: i64 = 50;

/// What happened to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Sent,
    /// Delivery failed; the job stays pending for another attempt.
    Retrying { attempts: i32 },
    /// Delivery failed and the attempt budget is spent.
    Failed,
}

impl JobOutcome {
    pub fn is_sent(self) -> bool {
        self == JobOutcome::Sent
    }
}

/// Counters for one `run_batch` call. `failed` includes jobs left for retry
/// and jobs whose bookkeeping hit a store error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Renders and delivers queued email jobs.
pub struct QueueWorker {
    queue: Arc<dyn DeliveryQueue>,
    transport: Arc<dyn MailTransport>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn DeliveryQueue>,
        transport: Arc<dyn MailTransport>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            queue,
            transport,
            renderer,
        }
    }

    /// Claim up to `limit` jobs and process them in claim order.
    ///
    /// Store errors on an individual job are logged and the batch moves on;
    /// only a failing claim aborts the batch.
    pub async fn run_batch(&self, limit: i64) -> StoreResult<BatchReport> {
        let jobs = self.queue.claim_batch(limit).await?;
        let mut report = BatchReport::default();

        for job in &jobs {
            report.processed += 1;
            match self.process_one(job).await {
                Ok(JobOutcome::Sent) => report.sent += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(job_id = job.id, error = %e, "Failed to record delivery result");
                }
            }
        }

        if report.processed > 0 {
            tracing::info!(
                processed = report.processed,
                sent = report.sent,
                failed = report.failed,
                "Delivery batch complete"
            );
        } else {
            tracing::debug!("Delivery batch: nothing to send");
        }
        Ok(report)
    }

    /// Render, deliver and record the result for one job.
    pub async fn process_one(&self, job: &DeliveryJob) -> StoreResult<JobOutcome> {
        let delivered = match self.render(job) {
            Ok(html) => self
                .transport
                .deliver(
                    &job.recipient_email,
                    job.recipient_name.as_deref(),
                    &job.subject,
                    &html,
                )
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let error = match delivered {
            Ok(()) => {
                self.queue.mark_sent(job.id).await?;
                tracing::info!(
                    job_id = job.id,
                    notification_id = job.notification_id,
                    "Delivery job sent"
                );
                return Ok(JobOutcome::Sent);
            }
            Err(error) => error,
        };

        let attempts = self.queue.increment_attempts(job.id, &error).await?;
        if attempts >= job.max_attempts {
            self.queue.mark_failed(job.id, &error).await?;
            tracing::error!(
                job_id = job.id,
                notification_id = job.notification_id,
                attempts,
                error = %error,
                "Delivery job exhausted its attempts"
            );
            return Ok(JobOutcome::Failed);
        }

        tracing::warn!(
            job_id = job.id,
            attempts,
            max_attempts = job.max_attempts,
            error = %error,
            "Delivery attempt failed, will retry"
        );
        Ok(JobOutcome::Retrying { attempts })
    }

    fn render(&self, job: &DeliveryJob) -> Result<String, RenderError> {
        match &job.body {
            DeliveryBody::Template { name, data } => match self.renderer.render(name, data) {
                Err(RenderError::TemplateNotFound(_)) => {
                    tracing::debug!(job_id = job.id, template = %name, "Template missing, using fallback layout");
                    Ok(fallback_html(data))
                }
                other => other,
            },
            DeliveryBody::Raw { html } => Ok(render_layout(&job.subject, html, None)),
        }
    }
}
