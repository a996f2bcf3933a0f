//! Shared HTTP fetch helper used by every upstream client.
//!
//! Each call gets a fixed timeout and an optional cancellation token, and
//! resolves to a typed `Result<T, FetchError>` instead of ad hoc error strings.

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::error::FetchError;

/// Thin wrapper over a `reqwest::Client` with uniform timeout and error mapping.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` with `query` parameters and decode the JSON body as `T`.
    ///
    /// Never hangs: the call either completes, times out, or is cancelled.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        let start = Instant::now();
        let request = self.client.get(url).query(query);

        let work = async {
            let response = request.send().await.map_err(|e| self.map_send_error(url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response.json::<T>().await.map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, work) => match outcome {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }),
            },
        };

        match &result {
            Ok(_) => debug!(
                url,
                duration_ms = start.elapsed().as_millis() as u64,
                "Upstream fetch completed"
            ),
            Err(FetchError::Cancelled) => debug!(url, "Upstream fetch cancelled"),
            Err(e) => warn!(url, error = %e, "Upstream fetch failed"),
        }
        result
    }

    fn map_send_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}
