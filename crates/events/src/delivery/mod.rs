//! Outbound mail transports.
//!
//! [`MailTransport`] is the only capability the queue worker needs to hand a
//! rendered message to the outside world. [`email::SmtpTransport`] sends via
//! SMTP; [`mock::MockTransport`] records messages for tests.

pub mod email;
pub mod mock;

use async_trait::async_trait;

pub use email::{EmailConfig, SmtpTransport};
pub use mock::{MockTransport, SentEmail};

/// Error type for mail delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// No SMTP server is configured (`SMTP_HOST` unset).
    #[error("SMTP transport not configured: set SMTP_HOST")]
    NotConfigured,

    /// The transport refused the message.
    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// Sends one rendered HTML email.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        subject: &str,
        html: &str,
    ) -> Result<(), TransportError>;
}
