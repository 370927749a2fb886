use std::sync::Arc;

use async_trait::async_trait;
use emporia_core::clock::{Clock, SystemClock};
use emporia_core::notification::{NotificationType, UserRef};

use super::Table;
use crate::error::StoreResult;
use crate::models::preference::{ChannelSettings, NotificationPreference, UpdatePreference};
use crate::store::PreferenceStore;

/// In-memory [`PreferenceStore`]. Enforces the `(user, type)` uniqueness the
/// table's unique constraint gives the PostgreSQL store.
pub struct InMemoryPreferenceStore {
    table: Table<NotificationPreference>,
    clock: Arc<dyn Clock>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Table::default(),
            clock,
        }
    }

    fn default_row(
        &self,
        user: UserRef,
        notification_type: NotificationType,
    ) -> NotificationPreference {
        let now = self.clock.now();
        NotificationPreference {
            id: self.table.next_id(),
            user_id: user.user_id,
            user_type: user.user_type,
            notification_type,
            settings: ChannelSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for InMemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn same_key(p: &NotificationPreference, user: UserRef, notification_type: NotificationType) -> bool {
    p.recipient() == user && p.notification_type == notification_type
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(
        &self,
        user: UserRef,
        notification_type: NotificationType,
    ) -> StoreResult<Option<NotificationPreference>> {
        Ok(self
            .table
            .read()
            .values()
            .find(|p| same_key(p, user, notification_type))
            .cloned())
    }

    async fn list_for_user(&self, user: UserRef) -> StoreResult<Vec<NotificationPreference>> {
        let mut rows: Vec<_> = self
            .table
            .read()
            .values()
            .filter(|p| p.recipient() == user)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.notification_type.as_str());
        Ok(rows)
    }

    async fn update(
        &self,
        user: UserRef,
        notification_type: NotificationType,
        update: &UpdatePreference,
    ) -> StoreResult<NotificationPreference> {
        let now = self.clock.now();
        let mut rows = self.table.write();
        if let Some(row) = rows
            .values_mut()
            .find(|p| same_key(p, user, notification_type))
        {
            row.settings.apply(update);
            row.updated_at = now;
            return Ok(row.clone());
        }

        let mut row = self.default_row(user, notification_type);
        row.settings.apply(update);
        rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn initialize_defaults(&self, user: UserRef) -> StoreResult<u64> {
        let mut rows = self.table.write();
        let mut created = 0;
        for notification_type in NotificationType::ALL {
            if rows.values().any(|p| same_key(p, user, notification_type)) {
                continue;
            }
            let row = self.default_row(user, notification_type);
            rows.insert(row.id, row);
            created += 1;
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use emporia_core::channels::Channel;

    use super::*;

    #[tokio::test]
    async fn missing_row_is_fail_open() {
        let store = InMemoryPreferenceStore::new();
        let user = UserRef::client(1);
        for channel in Channel::ALL {
            assert!(store
                .is_enabled(user, NotificationType::Order, channel)
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn update_creates_then_patches() {
        let store = InMemoryPreferenceStore::new();
        let user = UserRef::client(1);

        let created = store
            .update(
                user,
                NotificationType::Order,
                &UpdatePreference::channel(Channel::Email, false),
            )
            .await
            .unwrap();
        assert!(created.settings.in_app_enabled);
        assert!(!created.settings.email_enabled);

        let patched = store
            .update(
                user,
                NotificationType::Order,
                &UpdatePreference::channel(Channel::InApp, false),
            )
            .await
            .unwrap();
        assert_eq!(patched.id, created.id);
        assert!(!patched.settings.in_app_enabled);
        assert!(!patched.settings.email_enabled);
        assert!(patched.settings.sms_enabled);

        assert!(!store
            .is_enabled(user, NotificationType::Order, Channel::Email)
            .await
            .unwrap());
        assert!(store
            .is_enabled(user, NotificationType::Payment, Channel::Email)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn preferences_are_scoped_by_user_type() {
        let store = InMemoryPreferenceStore::new();
        store
            .update(
                UserRef::client(5),
                NotificationType::Store,
                &UpdatePreference::channel(Channel::InApp, false),
            )
            .await
            .unwrap();
        assert!(store
            .is_enabled(UserRef::admin(5), NotificationType::Store, Channel::InApp)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn initialize_defaults_is_idempotent_and_keeps_overrides() {
        let store = InMemoryPreferenceStore::new();
        let user = UserRef::customer(2);
        store
            .update(
                user,
                NotificationType::Customer,
                &UpdatePreference::channel(Channel::Email, false),
            )
            .await
            .unwrap();

        let created = store.initialize_defaults(user).await.unwrap();
        assert_eq!(created as usize, NotificationType::ALL.len() - 1);
        assert_eq!(store.initialize_defaults(user).await.unwrap(), 0);

        let rows = store.list_for_user(user).await.unwrap();
        assert_eq!(rows.len(), NotificationType::ALL.len());
        assert!(!store
            .is_enabled(user, NotificationType::Customer, Channel::Email)
            .await
            .unwrap());
    }
}
