//! PostgreSQL implementations of the store traits.

pub mod delivery_job_repo;
pub mod notification_preference_repo;
pub mod notification_repo;

pub use delivery_job_repo::DeliveryJobRepo;
pub use notification_preference_repo::NotificationPreferenceRepo;
pub use notification_repo::NotificationRepo;
