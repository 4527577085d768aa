use std::time::Duration;

use tracing::warn;

use crate::RemoteError;

/// Configuration for retry behaviour on idempotent GET requests.
pub struct RetryConfig {
    pub max_retries: usize,
    pub delays: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delays: vec![1, 2, 4],
        }
    }
}

/// Retry an HTTP GET with exponential backoff.
///
/// Retries on network errors and 5xx responses. Returns immediately on
/// success or 4xx. Mutating requests must not go through here; the upstream
/// tracker does not guarantee create/update idempotency.
pub async fn retry_get(
    client: &reqwest::Client,
    url: &str,
    auth_token: Option<&str>,
    config: &RetryConfig,
) -> Result<reqwest::Response, RemoteError> {
    let max_attempts = config.max_retries + 1;

    for attempt in 0..max_attempts {
        let mut req = client.get(url);
        if let Some(token) = auth_token {
            req = req.bearer_auth(token);
        }

        match req.send().await {
            Ok(resp) if resp.status().is_server_error() => {
                if attempt < config.delays.len() {
                    let status = resp.status();
                    warn!(
                        "GET attempt {}/{} failed (HTTP {}), retrying in {}s…",
                        attempt + 1,
                        max_attempts,
                        status,
                        config.delays[attempt],
                    );
                    tokio::time::sleep(Duration::from_secs(config.delays[attempt])).await;
                } else {
                    return Ok(resp);
                }
            }
            Ok(resp) => return Ok(resp),
            Err(e) => {
                if attempt < config.delays.len() {
                    warn!(
                        "GET attempt {}/{} failed ({}), retrying in {}s…",
                        attempt + 1,
                        max_attempts,
                        e,
                        config.delays[attempt],
                    );
                    tokio::time::sleep(Duration::from_secs(config.delays[attempt])).await;
                } else {
                    return Err(RemoteError::Network(format!(
                        "failed to connect after retries: {e}"
                    )));
                }
            }
        }
    }

    unreachable!()
}
