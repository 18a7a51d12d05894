#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Channel rejected the message (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Invalid recipient `{recipient}`: {reason}")]
    InvalidRecipient { recipient: String, reason: String },

    #[error("Template rendering failed: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Delivery timed out.")]
    Timeout,
}

impl From<wreq::Error> for NotifyError {
    fn from(e: wreq::Error) -> Self {
        NotifyError::Http(e.to_string())
    }
}
