#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration error: {msg}")]
    ConfigurationError { msg: String },

    #[error("Invalid value \"{value}\" for config key \"{key}\": {reason}")]
    InvalidConfig {
        key: String,
        value: String,
        reason: String,
    },
}

impl AppError {
    pub fn invalid_config(key: &str, value: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
