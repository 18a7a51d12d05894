//! Notification delivery over email and Telegram.
//!
//! [`ChannelDispatcher`] renders one message per slot and hands it to the notifier
//! registered for each of the subscriber's contact methods. A channel that fails, or that
//! is not configured, is reported as unsuccessful and never stops the others.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use log::debug;
use log::info;
use log::warn;

use crate::config::Config;
use crate::entity::Channel;
use crate::entity::ContactMethod;
use crate::notifier::email_notifier::EmailNotifier;
use crate::notifier::error::NotifyError;
use crate::notifier::message_builder::MessageBuilder;
use crate::notifier::telegram_notifier::TelegramNotifier;
use crate::service::Slot;

pub mod email_notifier;
pub mod error;
pub mod message_builder;
pub mod telegram_notifier;

/// A rendered notification ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    /// HTML body used by email.
    pub html_body: String,
    /// Markdown body used by chat channels.
    pub text: String,
}

/// One delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub channel: Channel,
    pub success: bool,
}

/// Delivers slot notifications to a subscriber's contact methods.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Attempts every contact method and reports one outcome per method. Never fails.
    async fn deliver(&self, contacts: &[ContactMethod], slot: &Slot) -> Vec<DeliveryOutcome>;
}

pub struct ChannelDispatcher {
    notifiers: HashMap<Channel, Box<dyn Notifier>>,
    messages: MessageBuilder,
}

impl ChannelDispatcher {
    pub fn new(messages: MessageBuilder) -> Self {
        Self {
            notifiers: HashMap::new(),
            messages,
        }
    }

    /// Registers `notifier`, replacing any notifier for the same channel.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.insert(notifier.channel(), notifier);
        self
    }

    /// Builds a dispatcher with every channel the configuration enables.
    pub fn from_config(config: &Config) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::new(MessageBuilder::new()?);

        match &config.email {
            Some(email) => {
                dispatcher = dispatcher.with_notifier(Box::new(EmailNotifier::from_config(email)?));
                info!("Email notifications enabled via {}.", email.smtp_host);
            }
            None => warn!("Email not configured. Email notifications are disabled."),
        }
        match &config.telegram_bot_token {
            Some(token) => {
                dispatcher = dispatcher.with_notifier(Box::new(TelegramNotifier::new(token)?));
                info!("Telegram notifications enabled.");
            }
            None => warn!("Telegram bot token not configured. Telegram notifications are disabled."),
        }

        Ok(dispatcher)
    }

    async fn deliver_one(&self, contact: &ContactMethod, notification: &Notification) -> DeliveryOutcome {
        let channel = contact.channel();
        let Some(notifier) = self.notifiers.get(&channel) else {
            warn!("No {channel} notifier configured. Message not sent.");
            return DeliveryOutcome {
                channel,
                success: false,
            };
        };

        let start = Instant::now();
        let success = match notifier.send(contact.recipient(), notification).await {
            Ok(()) => {
                debug!(
                    "Delivered {channel} notification in {}ms.",
                    start.elapsed().as_millis()
                );
                true
            }
            Err(e) => {
                warn!("Failed to deliver {channel} notification: {e}");
                false
            }
        };
        DeliveryOutcome { channel, success }
    }
}

#[async_trait]
impl NotificationDispatcher for ChannelDispatcher {
    async fn deliver(&self, contacts: &[ContactMethod], slot: &Slot) -> Vec<DeliveryOutcome> {
        let notification = match self.messages.build(slot) {
            Ok(notification) => notification,
            Err(e) => {
                warn!("Failed to render notification: {e}");
                return contacts
                    .iter()
                    .map(|c| DeliveryOutcome {
                        channel: c.channel(),
                        success: false,
                    })
                    .collect();
            }
        };

        join_all(
            contacts
                .iter()
                .map(|contact| self.deliver_one(contact, &notification)),
        )
        .await
    }
}
