//! Closed variants describing who a notification is for, what it is about,
//! and how urgent it is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// UserType
// ---------------------------------------------------------------------------

/// Identity namespace a user id belongs to.
///
/// Admin, client and customer ids are allocated independently, so a bare
/// user id is meaningless without its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Admin,
    Client,
    Customer,
}

impl UserType {
    pub const ALL: [UserType; 3] = [UserType::Admin, UserType::Client, UserType::Customer];

    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::Client => "client",
            UserType::Customer => "customer",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserType::Admin),
            "client" => Ok(UserType::Client),
            "customer" => Ok(UserType::Customer),
            other => Err(CoreError::unknown("user type", other)),
        }
    }
}

/// A fully qualified recipient identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: DbId,
    pub user_type: UserType,
}

impl UserRef {
    pub const fn new(user_id: DbId, user_type: UserType) -> Self {
        Self { user_id, user_type }
    }

    pub const fn admin(user_id: DbId) -> Self {
        Self::new(user_id, UserType::Admin)
    }

    pub const fn client(user_id: DbId) -> Self {
        Self::new(user_id, UserType::Client)
    }

    pub const fn customer(user_id: DbId) -> Self {
        Self::new(user_id, UserType::Customer)
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user_type, self.user_id)
    }
}

// ---------------------------------------------------------------------------
// NotificationType
// ---------------------------------------------------------------------------

/// Template rendered when no per-type template is registered.
pub const GENERIC_TEMPLATE: &str = "generic_notification";

/// Category tag of a notification; also the key preferences are stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Order,
    Product,
    System,
    Store,
    Payment,
    Customer,
}

impl NotificationType {
    pub const ALL: [NotificationType; 6] = [
        NotificationType::Order,
        NotificationType::Product,
        NotificationType::System,
        NotificationType::Store,
        NotificationType::Payment,
        NotificationType::Customer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Order => "order",
            NotificationType::Product => "product",
            NotificationType::System => "system",
            NotificationType::Store => "store",
            NotificationType::Payment => "payment",
            NotificationType::Customer => "customer",
        }
    }

    /// Email template used for this category.
    pub fn template_name(self) -> &'static str {
        match self {
            NotificationType::Order => "order_notification",
            NotificationType::Product => "product_notification",
            NotificationType::System => "system_notification",
            NotificationType::Store => "store_notification",
            NotificationType::Payment => "payment_notification",
            NotificationType::Customer => "customer_notification",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::unknown("notification type", s))
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Urgency of a notification or delivery job.
///
/// Variants are declared in ascending order so `Ord` matches urgency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Numeric rank persisted in SMALLINT columns (`low = 0` .. `urgent = 3`).
    pub fn rank(self) -> i16 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
        }
    }

    pub fn from_rank(rank: i16) -> Result<Self, CoreError> {
        match rank {
            0 => Ok(Priority::Low),
            1 => Ok(Priority::Normal),
            2 => Ok(Priority::High),
            3 => Ok(Priority::Urgent),
            other => Err(CoreError::Validation(format!(
                "priority rank out of range: {other}"
            ))),
        }
    }

    /// High and urgent events always attempt email and drain their job inline.
    pub fn is_escalated(self) -> bool {
        self >= Priority::High
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(CoreError::unknown("priority", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn priority_order_matches_urgency() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn only_high_and_urgent_escalate() {
        assert!(!Priority::Low.is_escalated());
        assert!(!Priority::Normal.is_escalated());
        assert!(Priority::High.is_escalated());
        assert!(Priority::Urgent.is_escalated());
    }

    #[test]
    fn priority_rank_is_monotonic_and_reversible() {
        for p in [Priority::Low, Priority::Normal, Priority::High, Priority::Urgent] {
            assert_eq!(Priority::from_rank(p.rank()).unwrap(), p);
        }
        assert_matches!(Priority::from_rank(9), Err(CoreError::Validation(_)));
    }

    #[test]
    fn notification_type_parses_every_variant() {
        for t in NotificationType::ALL {
            assert_eq!(t.as_str().parse::<NotificationType>().unwrap(), t);
        }
        assert_matches!(
            "refund".parse::<NotificationType>(),
            Err(CoreError::UnknownVariant { kind: "notification type", .. })
        );
    }

    #[test]
    fn user_type_serializes_snake_case() {
        let json = serde_json::to_string(&UserType::Customer).unwrap();
        assert_eq!(json, "\"customer\"");
        assert_eq!("client".parse::<UserType>().unwrap(), UserType::Client);
    }

    #[test]
    fn user_ref_display_includes_namespace() {
        assert_eq!(UserRef::client(7).to_string(), "client:7");
    }
}
