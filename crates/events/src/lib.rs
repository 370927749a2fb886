//! Emporia notification delivery.
//!
//! - [`NotificationDispatcher`]: preference-aware send of an in-app row plus
//!   an optional queued email, delivered inline for high/urgent priorities.
//! - [`QueueWorker`]: claims queued jobs, renders and delivers them, records
//!   retries and dead letters.
//! - [`MaintenanceScheduler`]: periodic queue drains and retention cleanup.
//! - [`EventBus`] / [`NotificationRouter`]: in-process business events turned
//!   into notifications.
//! - [`delivery`], [`render`], [`directory`]: the mail transport, template
//!   and address-lookup seams.

pub mod bus;
pub mod config;
pub mod delivery;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod render;
pub mod router;
pub mod scheduler;
pub mod shortcuts;
pub mod worker;

pub use bus::{BusinessEvent, EventBus, EventKind};
pub use config::NotifyConfig;
pub use delivery::{EmailConfig, MailTransport, MockTransport, SmtpTransport, TransportError};
pub use directory::{DirectoryRegistry, PgUserDirectory, Recipient, StaticDirectory, UserDirectory};
pub use dispatcher::{NotificationDispatcher, SendOutcome, SendRequest};
pub use error::{NotifyError, NotifyResult};
pub use render::{HandlebarsRenderer, RenderError, TemplateRenderer};
pub use router::NotificationRouter;
pub use scheduler::MaintenanceScheduler;
pub use worker::{BatchReport, JobOutcome, QueueWorker};
