use std::time::Duration;

/// Outcome of a failed upstream call.
///
/// Rate limiting is kept apart from every other failure so callers can react to it
/// without inspecting status codes.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Upstream service is rate limiting requests.")]
    RateLimited,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UpstreamError {
    #[error("Request to {endpoint} timed out after {after:?}.")]
    Timeout { endpoint: String, after: Duration },

    #[error("Upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Failed to parse response from {endpoint}: {source}")]
    InvalidResponse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

impl From<wreq::Error> for UpstreamError {
    fn from(e: wreq::Error) -> Self {
        UpstreamError::Network {
            message: e.to_string(),
        }
    }
}
