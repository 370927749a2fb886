//! In-process store implementations for tests and local development.
//!
//! Each store keeps its rows in a [`Table`] and reads time from an injected
//! [`Clock`](emporia_core::clock::Clock), so retention windows and schedules
//! can be driven deterministically with a `ManualClock`.

mod delivery_queue;
mod notifications;
mod preferences;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Duration;
use emporia_core::types::{DbId, Timestamp};

pub use delivery_queue::InMemoryDeliveryQueue;
pub use notifications::InMemoryNotificationStore;
pub use preferences::InMemoryPreferenceStore;

/// Rows keyed by a monotonically assigned id.
///
/// Locks are held for one operation and never across an `.await`. A poisoned
/// lock is recovered rather than propagated: every mutation leaves the map
/// consistent before it can panic.
#[derive(Debug)]
pub(crate) struct Table<T> {
    rows: RwLock<BTreeMap<DbId, T>>,
    next_id: AtomicI64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl<T> Table<T> {
    pub(crate) fn next_id(&self) -> DbId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BTreeMap<DbId, T>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<DbId, T>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clamp a SQL-style `LIMIT`/`OFFSET` value to a usize.
pub(crate) fn to_usize(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Start of a `days_old` retention window ending at `now`. `None` when the
/// cutoff falls outside the representable range, in which case nothing is old
/// enough to delete.
fn retention_cutoff(now: Timestamp, days_old: i32) -> Option<Timestamp> {
    Duration::try_days(i64::from(days_old)).and_then(|window| now.checked_sub_signed(window))
}
