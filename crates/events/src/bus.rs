//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`BusinessEvent`]s. It is
//! shared via `Arc<EventBus>`; the [`NotificationRouter`](crate::router::NotificationRouter)
//! subscribes and turns each event into notifications.

use chrono::{DateTime, Utc};
use emporia_core::notification::UserRef;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::dispatcher::SendRequest;
use crate::shortcuts::{
    CustomerRegistered, LowStock, NotificationEvent, OrderPlaced, PaymentReceived,
    StorePublished, SystemUpdate,
};

// ---------------------------------------------------------------------------
// BusinessEvent
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    OrderPlaced(OrderPlaced),
    LowStock(LowStock),
    PaymentReceived(PaymentReceived),
    StorePublished(StorePublished),
    CustomerRegistered(CustomerRegistered),
    SystemUpdate(SystemUpdate),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::OrderPlaced(_) => "order.placed",
            EventKind::LowStock(_) => "product.low_stock",
            EventKind::PaymentReceived(_) => "payment.received",
            EventKind::StorePublished(_) => "store.published",
            EventKind::CustomerRegistered(_) => "customer.registered",
            EventKind::SystemUpdate(_) => "system.update",
        }
    }

    pub fn to_request(&self, recipient: UserRef) -> SendRequest {
        match self {
            EventKind::OrderPlaced(e) => e.to_request(recipient),
            EventKind::LowStock(e) => e.to_request(recipient),
            EventKind::PaymentReceived(e) => e.to_request(recipient),
            EventKind::StorePublished(e) => e.to_request(recipient),
            EventKind::CustomerRegistered(e) => e.to_request(recipient),
            EventKind::SystemUpdate(e) => e.to_request(recipient),
        }
    }
}

/// A business event together with the users it concerns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessEvent {
    pub kind: EventKind,
    pub recipients: Vec<UserRef>,
    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl BusinessEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            recipients: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn to(mut self, recipient: UserRef) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn to_all(mut self, recipients: impl IntoIterator<Item = UserRef>) -> Self {
        self.recipients.extend(recipients);
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<BusinessEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Returns how many
    /// subscribers received it; with none the event is dropped.
    pub fn publish(&self, event: BusinessEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusinessEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
