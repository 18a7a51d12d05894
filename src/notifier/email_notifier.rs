//! SMTP email channel via `lettre`.

use async_trait::async_trait;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;

use crate::config::EmailConfig;
use crate::entity::Channel;
use crate::notifier::Notification;
use crate::notifier::Notifier;
use crate::notifier::error::NotifyError;

const SENDER_NAME: &str = "Exam Watch";

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// Port 465 uses implicit TLS, every other port STARTTLS.
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        let address = config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;
        let from = Mailbox::new(Some(SENDER_NAME.to_string()), address);

        let builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| NotifyError::Config(e.to_string()))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::InvalidRecipient {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(notification.html_body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        Ok(())
    }
}
