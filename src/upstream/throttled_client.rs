//! HTTP client that spaces out every call made to the upstream service.

use std::time::Duration;
use std::time::Instant;

use governor::Quota;
use governor::RateLimiter;
use governor::clock::QuantaClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use log::debug;
use log::warn;
use serde::de::DeserializeOwned;
use wreq::Client;
use wreq::header::HeaderMap;
use wreq::header::HeaderValue;
use wreq::header::USER_AGENT;

use crate::upstream::Endpoint;
use crate::upstream::error::ClientError;
use crate::upstream::error::UpstreamError;

const MAX_ERROR_BODY: usize = 200;

/// Throttled access to the upstream service.
///
/// One instance is shared by every caller in the process. The limiter admits one call
/// per `min_interval`; admission is an atomic compare-and-swap inside `governor`, so
/// concurrent callers queue up instead of slipping through together.
pub struct ThrottledClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    min_interval: Duration,
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, QuantaClock>>,
}

impl ThrottledClient {
    pub fn new(
        base_url: impl Into<String>,
        min_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("exam-watch/", env!("CARGO_PKG_VERSION"))),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| UpstreamError::ClientBuild {
                message: e.to_string(),
            })?;

        // A zero interval yields no quota, which means no throttling at all.
        let limiter = Quota::with_period(min_interval).map(RateLimiter::direct);

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            min_interval,
            limiter,
        })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next call is allowed and claims the slot.
    async fn throttle(&self, endpoint: Endpoint) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        let start = Instant::now();
        limiter.until_ready().await;
        let waited = start.elapsed();
        if waited >= Duration::from_millis(1) {
            debug!("Throttled {endpoint} call for {waited:?}.");
        }
    }

    /// Issues one throttled GET to `endpoint` and decodes the JSON body.
    ///
    /// HTTP 429 becomes [`ClientError::RateLimited`] and is never retried here.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        self.throttle(endpoint).await;

        let url = format!("{}{}", self.base_url, endpoint.path());
        debug!("Making request to: {url} {params:?}");
        let request = self.client.get(&url).query(params);

        let call = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, UpstreamError>((status, body))
        };
        let (status, body) = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Request to {endpoint} timed out after {:?}.", self.timeout);
                return Err(UpstreamError::Timeout {
                    endpoint: endpoint.to_string(),
                    after: self.timeout,
                }
                .into());
            }
        };

        if status == 429 {
            warn!("Rate limited by upstream on {endpoint}.");
            return Err(ClientError::RateLimited);
        }
        if !(200..300).contains(&status) {
            warn!("Upstream error on {endpoint}: HTTP {status}.");
            return Err(UpstreamError::Http {
                status,
                message: truncate(&body, MAX_ERROR_BODY),
            }
            .into());
        }

        serde_json::from_str(&body).map_err(|source| {
            UpstreamError::InvalidResponse {
                endpoint: endpoint.to_string(),
                source,
            }
            .into()
        })
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
