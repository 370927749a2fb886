//! Recording transport for tests and local runs without SMTP.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{MailTransport, TransportError};

/// A message accepted by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Default)]
struct State {
    sent: Vec<SentEmail>,
    attempts: usize,
    scripted: VecDeque<String>,
    always_fail: Option<String>,
    rejected: HashSet<String>,
}

/// Captures every delivered message and fails on demand.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<State>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every delivery fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let transport = Self::new();
        transport.lock().always_fail = Some(message.into());
        transport
    }

    /// Fail the next delivery with `message`. Calls queue up in order.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().scripted.push_back(message.into());
    }

    /// Refuse every message addressed to `email`.
    pub fn reject(&self, email: impl Into<String>) {
        self.lock().rejected.insert(email.into());
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.lock().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    /// Deliveries attempted, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    pub fn was_sent_to(&self, email: &str) -> bool {
        self.lock().sent.iter().any(|m| m.to_email == email)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn deliver(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        subject: &str,
        html: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.attempts += 1;

        if let Some(message) = &state.always_fail {
            return Err(TransportError::Rejected(message.clone()));
        }
        if let Some(message) = state.scripted.pop_front() {
            return Err(TransportError::Rejected(message));
        }
        if state.rejected.contains(to_email) {
            return Err(TransportError::Rejected(format!("mailbox unavailable: {to_email}")));
        }

        state.sent.push(SentEmail {
            to_email: to_email.to_string(),
            to_name: to_name.map(str::to_string),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_successful_sends() {
        let transport = MockTransport::new();
        transport
            .deliver("a@example.com", Some("A"), "Hello", "<p>x</p>")
            .await
            .unwrap();

        assert!(transport.was_sent_to("a@example.com"));
        assert_eq!(transport.sent()[0].to_name.as_deref(), Some("A"));
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let transport = MockTransport::new();
        transport.fail_next("first");
        transport.fail_next("second");

        let e1 = transport.deliver("a@example.com", None, "s", "b").await;
        let e2 = transport.deliver("a@example.com", None, "s", "b").await;
        assert_eq!(e1.unwrap_err().to_string(), "Delivery rejected: first");
        assert_eq!(e2.unwrap_err().to_string(), "Delivery rejected: second");
        assert!(transport.deliver("a@example.com", None, "s", "b").await.is_ok());
        assert_eq!(transport.attempts(), 3);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn rejected_address_never_succeeds() {
        let transport = MockTransport::new();
        transport.reject("bounce@example.com");
        assert!(transport
            .deliver("bounce@example.com", None, "s", "b")
            .await
            .is_err());
        assert!(transport.deliver("ok@example.com", None, "s", "b").await.is_ok());
    }

    #[tokio::test]
    async fn failing_transport_fails_everything() {
        let transport = MockTransport::failing("smtp down");
        assert!(transport.deliver("a@example.com", None, "s", "b").await.is_err());
        assert_eq!(transport.sent_count(), 0);
    }
}
