//! Delivery channels a notification preference can toggle.
//!
//! The string constants match the values used in logs and in the
//! `notification_preferences` column names (`<channel>_enabled`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// In-app notification stored for the notification bell UI.
pub const CHANNEL_IN_APP: &str = "in_app";

/// Email notification delivered through the delivery queue.
pub const CHANNEL_EMAIL: &str = "email";

/// SMS notification. Reserved: preferences carry the flag, nothing delivers it.
pub const CHANNEL_SMS: &str = "sms";

/// A delivery medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
    Sms,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::InApp, Channel::Email, Channel::Sms];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::InApp => CHANNEL_IN_APP,
            Channel::Email => CHANNEL_EMAIL,
            Channel::Sms => CHANNEL_SMS,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            CHANNEL_IN_APP => Ok(Channel::InApp),
            CHANNEL_EMAIL => Ok(Channel::Email),
            CHANNEL_SMS => Ok(Channel::Sms),
            other => Err(CoreError::unknown("channel", other)),
        }
    }
}
