//! Ready-made notifications for common business events.
//!
//! Each event type formats its own title, message, action link and priority
//! via [`NotificationEvent::to_request`]. The dispatcher methods at the bottom
//! are thin wrappers over [`NotificationDispatcher::send`].

use emporia_core::notification::{NotificationType, Priority, UserRef};
use emporia_core::types::DbId;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::dispatcher::{NotificationDispatcher, SendOutcome, SendRequest};
use crate::error::NotifyResult;

/// Something that can be turned into a notification for a recipient.
pub trait NotificationEvent {
    fn to_request(&self, recipient: UserRef) -> SendRequest;
}

/// Format minor units as `12.34 USD`.
pub fn format_money(amount_cents: i64, currency: &str) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let cents = amount_cents.unsigned_abs();
    format!("{sign}{}.{:02} {currency}", cents / 100, cents % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: DbId,
    pub order_number: String,
    pub customer_name: String,
    pub total_cents: i64,
    pub currency: String,
}

impl NotificationEvent for OrderPlaced {
    fn to_request(&self, recipient: UserRef) -> SendRequest {
        let total = format_money(self.total_cents, &self.currency);
        SendRequest::new(
            recipient,
            NotificationType::Order,
            format!("New order #{}", self.order_number),
            format!("{} placed an order for {total}.", self.customer_name),
        )
        .with_data(json!({
            "order_id": self.order_id,
            "order_number": self.order_number,
            "customer_name": self.customer_name,
            "total": total,
        }))
        .with_action_url(format!("/orders/{}", self.order_id))
        .with_priority(Priority::High)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStock {
    pub product_id: DbId,
    pub product_name: String,
    pub stock: i64,
}

impl NotificationEvent for LowStock {
    fn to_request(&self, recipient: UserRef) -> SendRequest {
        SendRequest::new(
            recipient,
            NotificationType::Product,
            format!("Low stock: {}", self.product_name),
            format!(
                "Only {} left in stock for {}. Restock soon to avoid missed sales.",
                self.stock, self.product_name
            ),
        )
        .with_data(json!({
            "product_id": self.product_id,
            "product_name": self.product_name,
            "stock": self.stock,
        }))
        .with_action_url(format!("/products/{}", self.product_id))
        .with_priority(Priority::High)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceived {
    pub order_id: DbId,
    pub order_number: String,
    pub amount_cents: i64,
    pub currency: String,
}

impl NotificationEvent for PaymentReceived {
    fn to_request(&self, recipient: UserRef) -> SendRequest {
        let amount = format_money(self.amount_cents, &self.currency);
        SendRequest::new(
            recipient,
            NotificationType::Payment,
            "Payment received",
            format!("Payment of {amount} received for order #{}.", self.order_number),
        )
        .with_data(json!({
            "order_id": self.order_id,
            "order_number": self.order_number,
            "amount": amount,
        }))
        .with_action_url(format!("/orders/{}", self.order_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePublished {
    pub store_id: DbId,
    pub store_name: String,
    pub store_url: String,
}

impl NotificationEvent for StorePublished {
    fn to_request(&self, recipient: UserRef) -> SendRequest {
        SendRequest::new(
            recipient,
            NotificationType::Store,
            "Your store is live",
            format!("{} has been published.", self.store_name),
        )
        .with_data(json!({
            "store_id": self.store_id,
            "store_name": self.store_name,
            "store_url": self.store_url,
        }))
        .with_action_url(format!("/stores/{}", self.store_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRegistered {
    pub customer_id: DbId,
    pub customer_name: String,
    pub customer_email: String,
}

impl NotificationEvent for CustomerRegistered {
    fn to_request(&self, recipient: UserRef) -> SendRequest {
        SendRequest::new(
            recipient,
            NotificationType::Customer,
            "New customer",
            format!("{} created an account.", self.customer_name),
        )
        .with_data(json!({
            "customer_id": self.customer_id,
            "customer_name": self.customer_name,
            "customer_email": self.customer_email,
        }))
        .with_action_url(format!("/customers/{}", self.customer_id))
        .with_priority(Priority::Low)
    }
}

/// Platform announcement; the caller picks the priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemUpdate {
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl NotificationEvent for SystemUpdate {
    fn to_request(&self, recipient: UserRef) -> SendRequest {
        let mut request = SendRequest::new(
            recipient,
            NotificationType::System,
            self.title.clone(),
            self.message.clone(),
        )
        .with_priority(self.priority);
        if let Some(url) = &self.action_url {
            request = request.with_action_url(url.clone());
        }
        request
    }
}

impl NotificationDispatcher {
    pub async fn notify(
        &self,
        recipient: UserRef,
        event: &impl NotificationEvent,
    ) -> NotifyResult<SendOutcome> {
        self.send(&event.to_request(recipient)).await
    }

    pub async fn order_placed(
        &self,
        recipient: UserRef,
        event: &OrderPlaced,
    ) -> NotifyResult<SendOutcome> {
        self.notify(recipient, event).await
    }

    pub async fn low_stock(&self, recipient: UserRef, event: &LowStock) -> NotifyResult<SendOutcome> {
        self.notify(recipient, event).await
    }

    pub async fn payment_received(
        &self,
        recipient: UserRef,
        event: &PaymentReceived,
    ) -> NotifyResult<SendOutcome> {
        self.notify(recipient, event).await
    }

    pub async fn store_published(
        &self,
        recipient: UserRef,
        event: &StorePublished,
    ) -> NotifyResult<SendOutcome> {
        self.notify(recipient, event).await
    }

    pub async fn customer_registered(
        &self,
        recipient: UserRef,
        event: &CustomerRegistered,
    ) -> NotifyResult<SendOutcome> {
        self.notify(recipient, event).await
    }

    pub async fn system_update(
        &self,
        recipient: UserRef,
        event: &SystemUpdate,
    ) -> NotifyResult<SendOutcome> {
        self.notify(recipient, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(4200, "USD"), "42.00 USD");
        assert_eq!(format_money(5, "EUR"), "0.05 EUR");
        assert_eq!(format_money(-150, "USD"), "-1.50 USD");
    }

    #[test]
    fn shortcut_priorities() {
        let user = UserRef::client(1);
        let order = OrderPlaced {
            order_id: 1,
            order_number: "1001".into(),
            customer_name: "Jane".into(),
            total_cents: 4200,
            currency: "USD".into(),
        };
        let low_stock = LowStock {
            product_id: 2,
            product_name: "Mug".into(),
            stock: 3,
        };
        let payment = PaymentReceived {
            order_id: 1,
            order_number: "1001".into(),
            amount_cents: 4200,
            currency: "USD".into(),
        };
        let store = StorePublished {
            store_id: 4,
            store_name: "Jane's".into(),
            store_url: "https://janes.example.com".into(),
        };
        let customer = CustomerRegistered {
            customer_id: 5,
            customer_name: "Bob".into(),
            customer_email: "bob@example.com".into(),
        };
        let system = SystemUpdate {
            title: "Maintenance".into(),
            message: "Tonight".into(),
            action_url: None,
            priority: Priority::Urgent,
        };

        assert_eq!(order.to_request(user).priority, Priority::High);
        assert_eq!(low_stock.to_request(user).priority, Priority::High);
        assert_eq!(payment.to_request(user).priority, Priority::Normal);
        assert_eq!(store.to_request(user).priority, Priority::Normal);
        assert_eq!(customer.to_request(user).priority, Priority::Low);
        assert_eq!(system.to_request(user).priority, Priority::Urgent);
    }

    #[test]
    fn order_placed_formats_title_message_and_link() {
        let request = OrderPlaced {
            order_id: 77,
            order_number: "A-77".into(),
            customer_name: "Jane Doe".into(),
            total_cents: 12_345,
            currency: "USD".into(),
        }
        .to_request(UserRef::client(9));

        assert_eq!(request.recipient, UserRef::client(9));
        assert_eq!(request.notification_type, NotificationType::Order);
        assert_eq!(request.title, "New order #A-77");
        assert_eq!(request.message, "Jane Doe placed an order for 123.45 USD.");
        assert_eq!(request.action_url.as_deref(), Some("/orders/77"));
        assert_eq!(request.data.unwrap()["total"], "123.45 USD");
    }
}
