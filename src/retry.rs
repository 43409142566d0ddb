use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("contribot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("gave up after {attempts} attempt(s)")]
    Exhausted { attempts: u32 },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Bounds every outbound request: how often it is tried, how long each try
/// may take, and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Same timeout, a single attempt.
    pub fn once(&self) -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
            timeout: self.timeout,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::ZERO,
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client that applies a [`RetryPolicy`] to every request it sends.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    http: Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(policy.timeout)
            .build()?;

        Ok(Self { http, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            http: self.http.clone(),
            policy,
        }
    }

    /// Sends the request produced by `build` until it returns a 2xx status or
    /// the attempt budget is spent. Non-2xx statuses, transport errors and
    /// timeouts all count as failed attempts.
    pub async fn send<F>(&self, label: &str, build: F) -> Result<Response, FetchError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let request = build(&self.http).timeout(self.policy.timeout);

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("{} succeeded on attempt {}", label, attempt);
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    warn!(
                        "Attempt {} failed for {}: {}, Response: {}",
                        attempt, label, status, body
                    );
                }
                Err(e) => {
                    warn!("Attempt {} failed for {}: {}", attempt, label, e);
                }
            }

            if attempt < attempts && !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        Err(FetchError::Exhausted { attempts })
    }
}
