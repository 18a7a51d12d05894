//! Telegram Bot API channel.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use wreq::Client;
use wreq::header::CONTENT_TYPE;

use crate::entity::Channel;
use crate::notifier::Notification;
use crate::notifier::Notifier;
use crate::notifier::error::NotifyError;

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_url: TELEGRAM_API_URL.to_string(),
            token: token.into(),
        })
    }

    /// Points the notifier at another Bot API host.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&SendMessage {
            chat_id: recipient,
            text: &notification.text,
            parse_mode: "Markdown",
        })
        .map_err(|e| NotifyError::Http(e.to_string()))?;

        let request = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_url, self.token))
            .header(CONTENT_TYPE, "application/json")
            .body(payload);

        let call = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, NotifyError>((status, body))
        };
        let (status, body) = tokio::time::timeout(SEND_TIMEOUT, call)
            .await
            .map_err(|_| NotifyError::Timeout)??;

        if !(200..300).contains(&status) {
            return Err(NotifyError::Rejected {
                status,
                message: body,
            });
        }
        Ok(())
    }
}
