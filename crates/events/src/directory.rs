//! Resolves a user identity to an email recipient.
//!
//! Admins, clients and customers live in separate identity namespaces.
//! [`DirectoryRegistry`] holds one [`UserDirectory`] per [`UserType`] and picks
//! the right one with an exhaustive match, so a new user type cannot be added
//! without deciding where its addresses come from.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use emporia_core::notification::{UserRef, UserType};
use emporia_core::types::DbId;
use emporia_db::DbPool;
use sqlx::Row;

/// Error type for directory lookups.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Directory database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Where an email for a user goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// One identity namespace. `Ok(None)` means no such user or no email on file.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_email(&self, user_id: DbId) -> Result<Option<Recipient>, DirectoryError>;
}

// ---------------------------------------------------------------------------
// DirectoryRegistry
// ---------------------------------------------------------------------------

/// One directory per user type.
#[derive(Clone)]
pub struct DirectoryRegistry {
    admins: Arc<dyn UserDirectory>,
    clients: Arc<dyn UserDirectory>,
    customers: Arc<dyn UserDirectory>,
}

impl DirectoryRegistry {
    pub fn new(
        admins: Arc<dyn UserDirectory>,
        clients: Arc<dyn UserDirectory>,
        customers: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            admins,
            clients,
            customers,
        }
    }

    /// Directories backed by the `admins`, `clients` and `customers` tables.
    pub fn postgres(pool: DbPool) -> Self {
        Self::new(
            Arc::new(PgUserDirectory::new(pool.clone(), UserType::Admin)),
            Arc::new(PgUserDirectory::new(pool.clone(), UserType::Client)),
            Arc::new(PgUserDirectory::new(pool, UserType::Customer)),
        )
    }

    /// Use the same directory for every user type.
    pub fn uniform(directory: Arc<dyn UserDirectory>) -> Self {
        Self::new(directory.clone(), directory.clone(), directory)
    }

    pub fn directory_for(&self, user_type: UserType) -> &dyn UserDirectory {
        match user_type {
            UserType::Admin => self.admins.as_ref(),
            UserType::Client => self.clients.as_ref(),
            UserType::Customer => self.customers.as_ref(),
        }
    }

    pub async fn resolve(&self, user: UserRef) -> Result<Option<Recipient>, DirectoryError> {
        self.directory_for(user.user_type)
            .resolve_email(user.user_id)
            .await
    }
}

// ---------------------------------------------------------------------------
// PgUserDirectory
// ---------------------------------------------------------------------------

/// Reads recipients from the platform's user tables.
pub struct PgUserDirectory {
    pool: DbPool,
    user_type: UserType,
}

impl PgUserDirectory {
    pub fn new(pool: DbPool, user_type: UserType) -> Self {
        Self { pool, user_type }
    }

    fn query(&self) -> &'static str {
        match self.user_type {
            UserType::Admin => "SELECT email, name FROM admins WHERE id = $1",
            UserType::Client => "SELECT email, name FROM clients WHERE id = $1",
            UserType::Customer => {
                "SELECT email, \
                        NULLIF(TRIM(CONCAT_WS(' ', first_name, last_name)), '') AS name \
                 FROM customers WHERE id = $1"
            }
        }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn resolve_email(&self, user_id: DbId) -> Result<Option<Recipient>, DirectoryError> {
        let row = sqlx::query(self.query())
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let email: Option<String> = row.try_get("email")?;
        let name: Option<String> = row.try_get("name")?;
        Ok(email
            .filter(|e| !e.trim().is_empty())
            .map(|email| Recipient { email, name }))
    }
}

// ---------------------------------------------------------------------------
// StaticDirectory
// ---------------------------------------------------------------------------

/// Fixed in-memory directory for tests and local runs.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    recipients: HashMap<DbId, Recipient>,
    failing: HashSet<DbId>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, user_id: DbId, recipient: Recipient) -> Self {
        self.recipients.insert(user_id, recipient);
        self
    }

    /// Make lookups for `user_id` return an error.
    pub fn with_failure(mut self, user_id: DbId) -> Self {
        self.failing.insert(user_id);
        self
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn resolve_email(&self, user_id: DbId) -> Result<Option<Recipient>, DirectoryError> {
        if self.failing.contains(&user_id) {
            return Err(DirectoryError::Unavailable(format!(
                "lookup failed for user {user_id}"
            )));
        }
        Ok(self.recipients.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn registry_dispatches_on_user_type() {
        let registry = DirectoryRegistry::new(
            Arc::new(StaticDirectory::new().with(1, Recipient::new("admin@example.com"))),
            Arc::new(StaticDirectory::new().with(1, Recipient::new("client@example.com"))),
            Arc::new(StaticDirectory::new()),
        );

        let admin = registry.resolve(UserRef::admin(1)).await.unwrap().unwrap();
        let client = registry.resolve(UserRef::client(1)).await.unwrap().unwrap();
        assert_eq!(admin.email, "admin@example.com");
        assert_eq!(client.email, "client@example.com");
        assert!(registry.resolve(UserRef::customer(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn static_directory_scripts_failures() {
        let directory = StaticDirectory::new()
            .with(1, Recipient::new("a@example.com").with_name("A"))
            .with_failure(2);
        assert_eq!(
            directory.resolve_email(1).await.unwrap().unwrap().name.as_deref(),
            Some("A")
        );
        assert_matches!(
            directory.resolve_email(2).await,
            Err(DirectoryError::Unavailable(_))
        );
    }
}
