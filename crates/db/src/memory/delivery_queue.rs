use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use emporia_core::clock::{Clock, SystemClock};
use emporia_core::types::DbId;

use super::{retention_cutoff, to_usize, Table};
use crate::error::{StoreError, StoreResult};
use crate::models::delivery_job::{DeliveryJob, DeliveryState, NewDeliveryJob, QueueStats};
use crate::store::DeliveryQueue;

const ENTITY: &str = "Delivery job";

/// In-memory [`DeliveryQueue`].
pub struct InMemoryDeliveryQueue {
    table: Table<DeliveryJob>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDeliveryQueue {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Table::default(),
            clock,
        }
    }

    /// Run `f` against one job under the write lock.
    fn update<T>(
        &self,
        id: DbId,
        f: impl FnOnce(&mut DeliveryJob) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut rows = self.table.write();
        let job = rows
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: ENTITY, id })?;
        f(job)
    }
}

impl Default for InMemoryDeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    async fn enqueue(&self, new: &NewDeliveryJob) -> StoreResult<DbId> {
        let id = self.table.next_id();
        let job = DeliveryJob::from_new(id, new, self.clock.now());
        self.table.write().insert(id, job);
        Ok(id)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<DeliveryJob>> {
        Ok(self.table.read().get(&id).cloned())
    }

    async fn claim_batch(&self, limit: i64) -> StoreResult<Vec<DeliveryJob>> {
        let now = self.clock.now();
        let mut jobs: Vec<_> = self
            .table
            .read()
            .values()
            .filter(|j| j.is_claimable(now))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| (Reverse(j.priority), j.created_at, j.id));
        jobs.truncate(to_usize(limit));
        Ok(jobs)
    }

    async fn mark_sent(&self, id: DbId) -> StoreResult<()> {
        let now = self.clock.now();
        self.update(id, |job| {
            job.mark_sent(now);
            Ok(())
        })
    }

    async fn increment_attempts(&self, id: DbId, error: &str) -> StoreResult<i32> {
        let now = self.clock.now();
        self.update(id, |job| Ok(job.record_attempt(error, now)))
    }

    async fn mark_failed(&self, id: DbId, error: &str) -> StoreResult<()> {
        let now = self.clock.now();
        self.update(id, |job| job.mark_failed(error, now))
    }

    async fn retry(&self, id: DbId) -> StoreResult<bool> {
        let now = self.clock.now();
        let mut rows = self.table.write();
        Ok(rows.get_mut(&id).is_some_and(|job| job.retry(now)))
    }

    async fn reset(&self, id: DbId) -> StoreResult<()> {
        let now = self.clock.now();
        self.update(id, |job| job.reset(now))
    }

    async fn get_failed(&self, limit: i64) -> StoreResult<Vec<DeliveryJob>> {
        let mut jobs: Vec<_> = self
            .table
            .read()
            .values()
            .filter(|j| j.is_dead_letter())
            .cloned()
            .collect();
        jobs.sort_by_key(|j| Reverse((j.updated_at(), j.id)));
        jobs.truncate(to_usize(limit));
        Ok(jobs)
    }

    async fn stats(&self) -> StoreResult<QueueStats> {
        let rows = self.table.read();
        let mut stats = QueueStats {
            total: rows.len() as i64,
            ..Default::default()
        };
        for job in rows.values() {
            match job.state() {
                DeliveryState::Pending => stats.pending += 1,
                DeliveryState::Sent { .. } => stats.sent += 1,
                DeliveryState::Failed => stats.failed += 1,
            }
            if job.is_exhausted() {
                stats.exhausted += 1;
            }
        }
        Ok(stats)
    }

    async fn delete_old_sent(&self, days_old: i32) -> StoreResult<u64> {
        let Some(cutoff) = retention_cutoff(self.clock.now(), days_old) else {
            return Ok(0);
        };
        let mut rows = self.table.write();
        let before = rows.len();
        rows.retain(|_, j| !j.state().sent_at().is_some_and(|at| at < cutoff));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;
    use emporia_core::clock::ManualClock;
    use emporia_core::notification::Priority;

    use super::*;
    use crate::models::delivery_job::DeliveryBody;

    fn queue() -> (Arc<ManualClock>, InMemoryDeliveryQueue) {
        let clock = Arc::new(ManualClock::starting_now());
        let queue = InMemoryDeliveryQueue::with_clock(clock.clone());
        (clock, queue)
    }

    fn job(priority: Priority) -> NewDeliveryJob {
        NewDeliveryJob::new(1, "a@example.com", "Subject", DeliveryBody::raw("<p>x</p>"))
            .with_priority(priority)
    }

    #[tokio::test]
    async fn claim_orders_by_priority_then_fifo() {
        let (clock, queue) = queue();
        let normal_old = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        clock.advance(Duration::seconds(1));
        let urgent = queue.enqueue(&job(Priority::Urgent)).await.unwrap();
        clock.advance(Duration::seconds(1));
        let normal_new = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        let low = queue.enqueue(&job(Priority::Low)).await.unwrap();

        let ids: Vec<_> = queue
            .claim_batch(10)
            .await
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec![urgent, normal_old, normal_new, low]);

        let capped = queue.claim_batch(2).await.unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn claim_is_a_read_not_a_lock() {
        let (_, queue) = queue();
        queue.enqueue(&job(Priority::Normal)).await.unwrap();
        assert_eq!(queue.claim_batch(10).await.unwrap().len(), 1);
        assert_eq!(queue.claim_batch(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scheduled_jobs_wait_until_due() {
        let (clock, queue) = queue();
        let due = clock.now() + Duration::minutes(10);
        queue
            .enqueue(&job(Priority::Normal).scheduled_at(due))
            .await
            .unwrap();

        assert!(queue.claim_batch(10).await.unwrap().is_empty());
        clock.advance(Duration::minutes(10));
        assert_eq!(queue.claim_batch(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_pending_job_is_dead_lettered_not_claimed() {
        let (_, queue) = queue();
        let id = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        for expected in 1..=3 {
            assert_eq!(queue.increment_attempts(id, "timeout").await.unwrap(), expected);
        }

        assert!(queue.claim_batch(10).await.unwrap().is_empty());
        let failed = queue.get_failed(10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].is_pending());

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.exhausted, 1);
    }

    #[tokio::test]
    async fn mark_failed_counts_an_attempt() {
        let (_, queue) = queue();
        let id = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        queue.mark_failed(id, "bounced").await.unwrap();

        let job = queue.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.state(), DeliveryState::Failed);
        assert_eq!(job.attempts(), 1);
        assert_eq!(job.last_error(), Some("bounced"));
    }

    #[tokio::test]
    async fn retry_requeues_failed_job_without_resetting_attempts() {
        let (_, queue) = queue();
        let id = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        queue.mark_failed(id, "bounced").await.unwrap();

        assert!(queue.retry(id).await.unwrap());
        let job = queue.find_by_id(id).await.unwrap().unwrap();
        assert!(job.is_pending());
        assert_eq!(job.attempts(), 1);
        assert_eq!(queue.claim_batch(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retry_refuses_exhausted_job_but_reset_allows_it() {
        let (_, queue) = queue();
        let id = queue
            .enqueue(&job(Priority::Normal).with_max_attempts(1))
            .await
            .unwrap();
        queue.mark_failed(id, "bounced").await.unwrap();

        assert!(!queue.retry(id).await.unwrap());
        assert!(!queue.retry(999).await.unwrap());

        queue.reset(id).await.unwrap();
        let job = queue.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.attempts(), 0);
        assert!(job.last_error().is_none());
        assert_eq!(queue.claim_batch(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sent_job_is_terminal() {
        let (_, queue) = queue();
        let id = queue.enqueue(&job(Priority::High)).await.unwrap();
        queue.mark_sent(id).await.unwrap();

        assert!(queue.claim_batch(10).await.unwrap().is_empty());
        assert_matches!(
            queue.mark_failed(id, "late").await,
            Err(StoreError::InvalidTransition { id: failed_id, .. }) if failed_id == id
        );
        assert_matches!(queue.reset(id).await, Err(StoreError::InvalidTransition { .. }));
        assert!(!queue.retry(id).await.unwrap());
        assert_eq!(queue.stats().await.unwrap().sent, 1);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let (_, queue) = queue();
        assert_matches!(
            queue.mark_sent(77).await,
            Err(StoreError::NotFound { id: 77, .. })
        );
        assert_matches!(
            queue.increment_attempts(77, "x").await,
            Err(StoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn delete_old_sent_keeps_recent_and_unsent() {
        let (clock, queue) = queue();
        let old = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        let failed = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        queue.mark_sent(old).await.unwrap();
        queue.mark_failed(failed, "x").await.unwrap();

        clock.advance(Duration::days(31));
        let fresh = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        queue.mark_sent(fresh).await.unwrap();

        assert_eq!(queue.delete_old_sent(30).await.unwrap(), 1);
        assert!(queue.find_by_id(old).await.unwrap().is_none());
        assert!(queue.find_by_id(failed).await.unwrap().is_some());
        assert!(queue.find_by_id(fresh).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_old_sent_with_out_of_range_window_deletes_nothing() {
        let (clock, queue) = queue();
        let sent = queue.enqueue(&job(Priority::Normal)).await.unwrap();
        queue.mark_sent(sent).await.unwrap();
        clock.advance(Duration::days(31));

        assert_eq!(queue.delete_old_sent(i32::MAX).await.unwrap(), 0);
        assert_eq!(queue.delete_old_sent(i32::MIN).await.unwrap(), 0);
        assert!(queue.find_by_id(sent).await.unwrap().is_some());
    }
}
