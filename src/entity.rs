//! Persisted subscriber records and their partial updates.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// One monitoring request.
///
/// Field names on disk follow the registration form (`personalNumber`, `categoryCode`,
/// `centerId`, ...), so records written by the management API load unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: String,
    #[serde(rename = "personalNumber")]
    pub subject_key: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(rename = "categoryCode")]
    pub watch_category: u32,
    #[serde(rename = "categoryName", default)]
    pub category_label: String,
    #[serde(rename = "centerId")]
    pub watch_location: u32,
    #[serde(rename = "centerName", default)]
    pub location_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    #[serde(rename = "lastChecked", default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notified: bool,
    /// Registration records name this `notifiedDate`.
    #[serde(default, alias = "notifiedDate")]
    pub notified_for_occurrence: Option<String>,
}

impl Subscriber {
    /// Creates a fresh, never-checked subscriber.
    pub fn new(
        id: impl Into<String>,
        subject_key: impl Into<String>,
        watch_category: u32,
        watch_location: u32,
    ) -> Self {
        Self {
            id: id.into(),
            subject_key: subject_key.into(),
            watch_category,
            watch_location,
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_telegram(mut self, chat_id: impl Into<String>) -> Self {
        self.telegram_chat_id = Some(chat_id.into());
        self
    }

    /// Contact methods configured for this subscriber, email first.
    pub fn contact_methods(&self) -> Vec<ContactMethod> {
        let mut methods = Vec::with_capacity(2);
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            methods.push(ContactMethod::Email(email.to_string()));
        }
        if let Some(chat_id) = self.telegram_chat_id.as_deref().filter(|c| !c.is_empty()) {
            methods.push(ContactMethod::Telegram(chat_id.to_string()));
        }
        methods
    }
}

/// Delivery channel kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Telegram,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Telegram => write!(f, "telegram"),
        }
    }
}

/// A single place a subscriber can be reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContactMethod {
    Email(String),
    Telegram(String),
}

impl ContactMethod {
    pub fn channel(&self) -> Channel {
        match self {
            ContactMethod::Email(_) => Channel::Email,
            ContactMethod::Telegram(_) => Channel::Telegram,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            ContactMethod::Email(address) => address,
            ContactMethod::Telegram(chat_id) => chat_id,
        }
    }
}

/// Notification state a patch moves a subscriber into.
///
/// `notified` and `notified_for_occurrence` are always written together through this
/// type, so a notified subscriber always carries its occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotificationState {
    Notified { occurrence: String },
    Cleared,
}

/// Partial update applied by [`crate::repository::SubscriberStore::update`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscriberPatch {
    pub last_checked_at: Option<DateTime<Utc>>,
    pub notification: Option<NotificationState>,
}

impl SubscriberPatch {
    pub fn checked_at(at: DateTime<Utc>) -> Self {
        Self {
            last_checked_at: Some(at),
            notification: None,
        }
    }

    pub fn notified(occurrence: impl Into<String>) -> Self {
        Self {
            last_checked_at: None,
            notification: Some(NotificationState::Notified {
                occurrence: occurrence.into(),
            }),
        }
    }

    pub fn cleared() -> Self {
        Self {
            last_checked_at: None,
            notification: Some(NotificationState::Cleared),
        }
    }

    pub fn apply(&self, subscriber: &mut Subscriber) {
        if let Some(at) = self.last_checked_at {
            subscriber.last_checked_at = Some(at);
        }
        match &self.notification {
            Some(NotificationState::Notified { occurrence }) => {
                subscriber.notified = true;
                subscriber.notified_for_occurrence = Some(occurrence.clone());
            }
            Some(NotificationState::Cleared) => {
                subscriber.notified = false;
                subscriber.notified_for_occurrence = None;
            }
            None => {}
        }
    }
}
