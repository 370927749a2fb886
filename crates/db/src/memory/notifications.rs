use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use emporia_core::clock::{Clock, SystemClock};
use emporia_core::notification::{Priority, UserRef};
use emporia_core::types::DbId;

use super::{retention_cutoff, to_usize, Table};
use crate::error::StoreResult;
use crate::models::notification::{
    NewNotification, Notification, NotificationFilter, NotificationStats,
};
use crate::store::NotificationStore;

/// In-memory [`NotificationStore`].
pub struct InMemoryNotificationStore {
    table: Table<Notification>,
    clock: Arc<dyn Clock>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Table::default(),
            clock,
        }
    }

    fn for_user(&self, user: UserRef) -> Vec<Notification> {
        self.table
            .read()
            .values()
            .filter(|n| n.recipient() == user)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, new: &NewNotification) -> StoreResult<DbId> {
        let id = self.table.next_id();
        let row = Notification::from_new(id, new, self.clock.now());
        self.table.write().insert(id, row);
        Ok(id)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<Notification>> {
        Ok(self.table.read().get(&id).cloned())
    }

    async fn get_by_user(
        &self,
        user: UserRef,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>> {
        let mut rows: Vec<_> = self
            .for_user(user)
            .into_iter()
            .filter(|n| filter.matches(n))
            .collect();
        rows.sort_by_key(|n| Reverse((n.priority, n.created_at, n.id)));
        Ok(rows
            .into_iter()
            .skip(to_usize(filter.offset))
            .take(to_usize(filter.limit))
            .collect())
    }

    async fn unread_count(&self, user: UserRef) -> StoreResult<i64> {
        let rows = self.table.read();
        Ok(rows
            .values()
            .filter(|n| n.recipient() == user && !n.is_read)
            .count() as i64)
    }

    async fn recent(&self, user: UserRef, limit: i64) -> StoreResult<Vec<Notification>> {
        let now = self.clock.now();
        let mut rows: Vec<_> = self
            .for_user(user)
            .into_iter()
            .filter(|n| n.is_recent(now))
            .collect();
        rows.sort_by_key(|n| Reverse((n.created_at, n.id)));
        rows.truncate(to_usize(limit));
        Ok(rows)
    }

    async fn stats(&self, user: UserRef) -> StoreResult<NotificationStats> {
        let rows = self.for_user(user);
        let total = rows.len() as i64;
        let unread = rows.iter().filter(|n| !n.is_read).count() as i64;
        let urgent_unread = rows
            .iter()
            .filter(|n| !n.is_read && n.priority == Priority::Urgent)
            .count() as i64;
        Ok(NotificationStats {
            total,
            unread,
            read: total - unread,
            urgent_unread,
        })
    }

    async fn mark_as_read(&self, id: DbId) -> StoreResult<bool> {
        let now = self.clock.now();
        Ok(self
            .table
            .write()
            .get_mut(&id)
            .is_some_and(|n| n.mark_read(now)))
    }

    async fn mark_as_unread(&self, id: DbId) -> StoreResult<bool> {
        Ok(self
            .table
            .write()
            .get_mut(&id)
            .is_some_and(|n| n.mark_unread()))
    }

    async fn mark_all_as_read(&self, user: UserRef) -> StoreResult<u64> {
        let now = self.clock.now();
        let mut rows = self.table.write();
        let mut changed = 0;
        for n in rows.values_mut().filter(|n| n.recipient() == user) {
            if n.mark_read(now) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, id: DbId) -> StoreResult<bool> {
        Ok(self.table.write().remove(&id).is_some())
    }

    async fn delete_all_read(&self, user: UserRef) -> StoreResult<u64> {
        let mut rows = self.table.write();
        let before = rows.len();
        rows.retain(|_, n| !(n.recipient() == user && n.is_read));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_old_read(&self, days_old: i32) -> StoreResult<u64> {
        let Some(cutoff) = retention_cutoff(self.clock.now(), days_old) else {
            return Ok(0);
        };
        let mut rows = self.table.write();
        let before = rows.len();
        rows.retain(|_, n| !(n.is_read && n.read_at.is_some_and(|at| at < cutoff)));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use emporia_core::clock::ManualClock;
    use emporia_core::notification::NotificationType;

    use super::*;

    fn store() -> (Arc<ManualClock>, InMemoryNotificationStore) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = InMemoryNotificationStore::with_clock(clock.clone());
        (clock, store)
    }

    fn order(user: UserRef, priority: Priority) -> NewNotification {
        NewNotification::new(user, NotificationType::Order, "New order", "Order #1")
            .with_priority(priority)
    }

    #[tokio::test]
    async fn inbox_orders_by_priority_then_newest() {
        let (clock, store) = store();
        let user = UserRef::client(1);

        let low = store.create(&order(user, Priority::Low)).await.unwrap();
        clock.advance(Duration::minutes(1));
        let urgent = store.create(&order(user, Priority::Urgent)).await.unwrap();
        clock.advance(Duration::minutes(1));
        let newer_low = store.create(&order(user, Priority::Low)).await.unwrap();

        let ids: Vec<_> = store
            .get_by_user(user, &NotificationFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![urgent, newer_low, low]);
    }

    #[tokio::test]
    async fn inbox_is_scoped_to_user_identity() {
        let (_, store) = store();
        store.create(&order(UserRef::client(1), Priority::Normal)).await.unwrap();
        store.create(&order(UserRef::customer(1), Priority::Normal)).await.unwrap();

        let rows = store
            .get_by_user(UserRef::client(1), &NotificationFilter::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.unread_count(UserRef::customer(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pagination_applies_after_ordering() {
        let (clock, store) = store();
        let user = UserRef::admin(9);
        for _ in 0..5 {
            store.create(&order(user, Priority::Normal)).await.unwrap();
            clock.advance(Duration::seconds(1));
        }
        let page = store
            .get_by_user(
                user,
                &NotificationFilter {
                    limit: 2,
                    offset: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ids: Vec<_> = page.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![4, 3]);
    }

    #[tokio::test]
    async fn mark_all_as_read_keeps_earlier_read_at() {
        let (clock, store) = store();
        let user = UserRef::client(3);
        let first = store.create(&order(user, Priority::Normal)).await.unwrap();
        store.create(&order(user, Priority::Normal)).await.unwrap();

        assert!(store.mark_as_read(first).await.unwrap());
        let first_read_at = store.find_by_id(first).await.unwrap().unwrap().read_at;

        clock.advance(Duration::hours(1));
        assert_eq!(store.mark_all_as_read(user).await.unwrap(), 1);
        assert_eq!(store.mark_all_as_read(user).await.unwrap(), 0);
        assert_eq!(
            store.find_by_id(first).await.unwrap().unwrap().read_at,
            first_read_at
        );
        assert_eq!(store.unread_count(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_unknown_id_reports_false() {
        let (_, store) = store();
        assert!(!store.mark_as_read(404).await.unwrap());
        assert!(!store.mark_as_unread(404).await.unwrap());
        assert!(!store.delete(404).await.unwrap());
    }

    #[tokio::test]
    async fn recent_excludes_older_than_a_day() {
        let (clock, store) = store();
        let user = UserRef::client(1);
        store.create(&order(user, Priority::Normal)).await.unwrap();
        clock.advance(Duration::hours(25));
        let fresh = store.create(&order(user, Priority::Normal)).await.unwrap();

        let recent = store.recent(user, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, fresh);
    }

    #[tokio::test]
    async fn stats_count_urgent_unread() {
        let (_, store) = store();
        let user = UserRef::client(1);
        let a = store.create(&order(user, Priority::Urgent)).await.unwrap();
        store.create(&order(user, Priority::Urgent)).await.unwrap();
        store.create(&order(user, Priority::Low)).await.unwrap();
        store.mark_as_read(a).await.unwrap();

        let stats = store.stats(user).await.unwrap();
        assert_eq!(
            stats,
            NotificationStats {
                total: 3,
                unread: 2,
                read: 1,
                urgent_unread: 1,
            }
        );
    }

    #[tokio::test]
    async fn delete_old_read_uses_read_at_and_skips_unread() {
        let (clock, store) = store();
        let user = UserRef::client(1);
        let old_read = store.create(&order(user, Priority::Normal)).await.unwrap();
        let old_unread = store.create(&order(user, Priority::Normal)).await.unwrap();
        store.mark_as_read(old_read).await.unwrap();

        clock.advance(Duration::days(31));
        let fresh_read = store.create(&order(user, Priority::Normal)).await.unwrap();
        store.mark_as_read(fresh_read).await.unwrap();

        assert_eq!(store.delete_old_read(30).await.unwrap(), 1);
        assert!(store.find_by_id(old_read).await.unwrap().is_none());
        assert!(store.find_by_id(old_unread).await.unwrap().is_some());
        assert!(store.find_by_id(fresh_read).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_old_read_with_out_of_range_window_deletes_nothing() {
        let (clock, store) = store();
        let user = UserRef::client(1);
        let read = store.create(&order(user, Priority::Normal)).await.unwrap();
        store.mark_as_read(read).await.unwrap();
        clock.advance(Duration::days(31));

        assert_eq!(store.delete_old_read(i32::MAX).await.unwrap(), 0);
        assert_eq!(store.delete_old_read(i32::MIN).await.unwrap(), 0);
        assert!(store.find_by_id(read).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_all_read_leaves_unread() {
        let (_, store) = store();
        let user = UserRef::client(1);
        let read = store.create(&order(user, Priority::Normal)).await.unwrap();
        store.create(&order(user, Priority::Normal)).await.unwrap();
        store.mark_as_read(read).await.unwrap();

        assert_eq!(store.delete_all_read(user).await.unwrap(), 1);
        assert_eq!(store.stats(user).await.unwrap().total, 1);
    }
}
