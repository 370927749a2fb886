//! Email delivery via SMTP.
//!
//! [`SmtpTransport`] wraps the `lettre` async SMTP transport. Configuration is
//! loaded from environment variables; if `SMTP_HOST` is not set,
//! [`EmailConfig::from_env`] returns `None` and [`SmtpTransport::from_env`]
//! fails with [`TransportError::NotConfigured`].

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{MailTransport, TransportError};
use crate::config::env_or;

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@emporia.local";

/// Default display name for the sender.
const DEFAULT_FROM_NAME: &str = "Emporia";

/// Default per-message SMTP timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the SMTP transport.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Display name paired with `from_address`.
    pub from_name: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
    /// Upper bound on a single SMTP exchange.
    pub timeout: Duration,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured.
    ///
    /// | Variable            | Required | Default                 |
    /// |---------------------|----------|-------------------------|
    /// | `SMTP_HOST`         | yes      |                         |
    /// | `SMTP_PORT`         | no       | `587`                   |
    /// | `SMTP_FROM`         | no       | `noreply@emporia.local` |
    /// | `SMTP_FROM_NAME`    | no       | `Emporia`               |
    /// | `SMTP_USER`         | no       |                         |
    /// | `SMTP_PASSWORD`     | no       |                         |
    /// | `SMTP_TIMEOUT_SECS` | no       | `10`                    |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: env_or("SMTP_PORT", DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            from_name: std::env::var("SMTP_FROM_NAME")
                .unwrap_or_else(|_| DEFAULT_FROM_NAME.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            timeout: Duration::from_secs(env_or("SMTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
        })
    }
}

// ---------------------------------------------------------------------------
// SmtpTransport
// ---------------------------------------------------------------------------

/// Sends HTML notification emails via SMTP.
pub struct SmtpTransport {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Build the mailer once; connections are pooled by `lettre`.
    pub fn new(config: &EmailConfig) -> Result<Self, TransportError> {
        let from = Mailbox::new(
            Some(config.from_name.clone()),
            config.from_address.parse()?,
        );

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .timeout(Some(config.timeout));

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            from,
            mailer: builder.build(),
        })
    }

    /// Build from [`EmailConfig::from_env`]. A process that delivers email
    /// cannot run without a server, so a missing `SMTP_HOST` is an error.
    pub fn from_env() -> Result<Self, TransportError> {
        let config = EmailConfig::from_env().ok_or(TransportError::NotConfigured)?;
        let transport = Self::new(&config)?;
        tracing::info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            "SMTP transport configured"
        );
        Ok(transport)
    }
}

/// Assemble an HTML message. Split out so the MIME build is testable offline.
pub(crate) fn build_message(
    from: Mailbox,
    to_email: &str,
    to_name: Option<&str>,
    subject: &str,
    html: &str,
) -> Result<Message, TransportError> {
    let to = Mailbox::new(to_name.map(str::to_string), to_email.parse()?);
    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html.to_string())
        .map_err(|e| TransportError::Build(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        subject: &str,
        html: &str,
    ) -> Result<(), TransportError> {
        let message = build_message(self.from.clone(), to_email, to_name, subject, html)?;
        self.mailer.send(message).await?;
        tracing::info!(to = to_email, subject, "Notification email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sender() -> Mailbox {
        Mailbox::new(Some("Emporia".into()), "noreply@emporia.local".parse().unwrap())
    }

    #[test]
    fn from_env_returns_none_without_smtp_host() {
        std::env::remove_var("SMTP_HOST");
        assert!(EmailConfig::from_env().is_none());
    }

    #[test]
    fn transport_from_env_requires_smtp_host() {
        std::env::remove_var("SMTP_HOST");
        let err = SmtpTransport::from_env().err();
        assert_matches!(err, Some(TransportError::NotConfigured));
    }

    #[test]
    fn builds_html_message_with_display_name() {
        let message = build_message(
            sender(),
            "owner@example.com",
            Some("Store Owner"),
            "New order",
            "<p>hi</p>",
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: New order"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("owner@example.com"));
    }

    #[test]
    fn bad_recipient_is_an_address_error() {
        let err = build_message(sender(), "not-an-email", None, "s", "b").unwrap_err();
        assert_matches!(err, TransportError::Address(_));
        assert!(err.to_string().contains("Email address parse error"));
    }

    #[test]
    fn transport_error_display_build() {
        let err = TransportError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }
}
