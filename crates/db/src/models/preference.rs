//! Notification preference models and DTOs.

use emporia_core::channels::Channel;
use emporia_core::notification::{NotificationType, UserRef, UserType};
use emporia_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use super::parse_column;

/// Per-channel on/off flags for one (user, notification type).
///
/// `Default` is every channel enabled. This is the fail-open contract: a user
/// without a stored preference receives every channel, so newly added
/// notification types ship "on" until the user opts out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub in_app_enabled: bool,
    pub email_enabled: bool,
    pub sms_enabled: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            in_app_enabled: true,
            email_enabled: true,
            sms_enabled: true,
        }
    }
}

impl ChannelSettings {
    pub fn allows(&self, channel: Channel) -> bool {
        match channel {
            Channel::InApp => self.in_app_enabled,
            Channel::Email => self.email_enabled,
            Channel::Sms => self.sms_enabled,
        }
    }

    /// Overwrite only the flags that are `Some` in `update`.
    pub fn apply(&mut self, update: &UpdatePreference) {
        if let Some(v) = update.in_app_enabled {
            self.in_app_enabled = v;
        }
        if let Some(v) = update.email_enabled {
            self.email_enabled = v;
        }
        if let Some(v) = update.sms_enabled {
            self.sms_enabled = v;
        }
    }
}

/// A row from the `notification_preferences` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPreference {
    pub id: DbId,
    pub user_id: DbId,
    pub user_type: UserType,
    pub notification_type: NotificationType,
    #[serde(flatten)]
    pub settings: ChannelSettings,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl NotificationPreference {
    pub fn recipient(&self) -> UserRef {
        UserRef::new(self.user_id, self.user_type)
    }
}

impl<'r> FromRow<'r, PgRow> for NotificationPreference {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            user_type: parse_column(row, "user_type")?,
            notification_type: parse_column(row, "notification_type")?,
            settings: ChannelSettings {
                in_app_enabled: row.try_get("in_app_enabled")?,
                email_enabled: row.try_get("email_enabled")?,
                sms_enabled: row.try_get("sms_enabled")?,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// DTO for updating a notification preference. `None` leaves a flag as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePreference {
    pub in_app_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
    pub sms_enabled: Option<bool>,
}

impl UpdatePreference {
    pub fn channel(channel: Channel, enabled: bool) -> Self {
        let mut update = Self::default();
        match channel {
            Channel::InApp => update.in_app_enabled = Some(enabled),
            Channel::Email => update.email_enabled = Some(enabled),
            Channel::Sms => update.sms_enabled = Some(enabled),
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_enable_every_channel() {
        let settings = ChannelSettings::default();
        for channel in Channel::ALL {
            assert!(settings.allows(channel), "{channel} should default on");
        }
    }

    #[test]
    fn apply_patches_only_provided_fields() {
        let mut settings = ChannelSettings::default();
        settings.apply(&UpdatePreference {
            email_enabled: Some(false),
            ..Default::default()
        });
        assert!(settings.in_app_enabled);
        assert!(!settings.email_enabled);
        assert!(settings.sms_enabled);

        settings.apply(&UpdatePreference::channel(Channel::InApp, false));
        assert!(!settings.in_app_enabled);
        assert!(!settings.email_enabled);
    }
}
