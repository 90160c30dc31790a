use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use magi_core::{ProviderConfig, ProviderError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::error_classifier;

/// Bounded exponential backoff for transport failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles on every further failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay to wait after the given 0-based attempt failed: `2^attempt * base_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds or the attempts are exhausted.
    ///
    /// The operation receives the 0-based attempt number. Every error it returns
    /// is treated as retryable, so callers must only surface transport failures
    /// here. After the last attempt the last error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts => {
                    tracing::warn!(
                        "{}: transport failed after {} attempts: {}",
                        label,
                        attempts,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{}: transport failure (attempt {}/{}), retrying in {}ms: {}",
                        label,
                        attempt + 1,
                        attempts,
                        delay.as_millis(),
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// A 2xx response with its raw body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    /// Decode the body, classifying a malformed one as a provider error
    pub fn decode<T: DeserializeOwned>(&self, provider: &str) -> Result<T, ProviderError> {
        serde_json::from_str(&self.body)
            .map_err(|e| error_classifier::malformed_body(provider, self.status, &e))
    }
}

/// HTTP client for one backend: timeout, optional pacing, retry on transport failure
pub struct RetryingTransport {
    provider: String,
    client: reqwest::Client,
    policy: RetryPolicy,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RetryingTransport {
    pub fn new(
        provider: impl Into<String>,
        timeout: Duration,
        policy: RetryPolicy,
        requests_per_minute: Option<u32>,
    ) -> Result<Self, ProviderError> {
        let provider = provider.into();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::new(&provider, format!("failed to build HTTP client: {}", e)))?;

        let rate_limiter = requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| Arc::new(RateLimiter::direct(Quota::per_minute(rpm))));

        tracing::debug!(
            "Transport ready: provider={}, timeout={}ms, max_attempts={}, rate_limit={:?}/min",
            provider,
            timeout.as_millis(),
            policy.max_attempts,
            requests_per_minute
        );

        Ok(Self {
            provider,
            client,
            policy,
            rate_limiter,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(
            config.name.clone(),
            Duration::from_millis(config.timeout_ms),
            RetryPolicy::new(config.max_attempts),
            config.requests_per_minute,
        )
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// POST a JSON body and return the 2xx reply.
    ///
    /// Connection errors and timeouts are retried per the policy. A received
    /// non-2xx status is classified and returned at once.
    pub async fn post_json<B>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<HttpReply, ProviderError>
    where
        B: Serialize + ?Sized,
    {
        let response = self
            .policy
            .run(&self.provider, move |_attempt| async move {
                if let Some(limiter) = &self.rate_limiter {
                    limiter.until_ready().await;
                }

                let mut request = self.client.post(url).json(body);
                for (name, value) in headers {
                    request = request.header(*name, *value);
                }
                // Request URLs can carry credentials
                request.send().await.map_err(reqwest::Error::without_url)
            })
            .await
            .map_err(|e| error_classifier::transport_exhausted(&self.provider, e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            ProviderError::with_status(
                &self.provider,
                status,
                format!("failed to read response body: {}", e.without_url()),
            )
        })?;

        if !(200..300).contains(&status) {
            let err = error_classifier::classify_status(&self.provider, status, &body);
            tracing::warn!(
                "{} returned HTTP {}: {}",
                self.provider,
                status,
                err.message
            );
            return Err(err);
        }

        Ok(HttpReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_for(64) >= policy.delay_for(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<&str, String> = policy
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(format!("connection reset #{}", attempt))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first failure, 2s after the second
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_last_error_when_exhausted() {
        let policy = RetryPolicy::new(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {}", attempt)) }
            })
            .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_policy_does_not_sleep() {
        let policy = RetryPolicy::new(0);
        assert_eq!(policy.max_attempts, 1);

        let result: Result<(), String> = policy.run("test", |_| async { Err("x".into()) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_non_2xx_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": { "message": "overloaded" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport =
            RetryingTransport::new("Test", Duration::from_secs(5), RetryPolicy::default(), None)
                .unwrap();
        let url = format!("{}/generate", mock_server.uri());
        let err = transport
            .post_json(&url, &[], &serde_json::json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.status_code, Some(503));
        assert_eq!(err.message, "overloaded");
    }

    #[tokio::test]
    async fn test_connection_failure_is_retried_then_surfaced() {
        // Nothing listens on this port once the server is dropped
        let url = {
            let mock_server = MockServer::start().await;
            format!("{}/generate", mock_server.uri())
        };

        let transport = RetryingTransport::new(
            "Test",
            Duration::from_secs(1),
            RetryPolicy::new(2).with_base_delay(Duration::from_millis(10)),
            None,
        )
        .unwrap();

        let err = transport
            .post_json(&url, &[], &serde_json::json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.provider, "Test");
        assert!(err.status_code.is_none());
        assert!(!err.message.contains("/generate"));
    }

    #[tokio::test]
    async fn test_post_json_recovers_after_dropped_connections() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/generate", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            // Hang up on the first two connections
            for _ in 0..2 {
                let (socket, _) = listener.accept().await.unwrap();
                drop(socket);
            }

            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await.unwrap();
            let body = r#"{"ok":true}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        let transport = RetryingTransport::new(
            "Test",
            Duration::from_secs(5),
            RetryPolicy::default().with_base_delay(Duration::from_millis(10)),
            None,
        )
        .unwrap();

        let started = std::time::Instant::now();
        let reply = transport
            .post_json(&url, &[], &serde_json::json!({"a": 1}))
            .await
            .unwrap();

        assert_eq!(reply.status, 200);
        let decoded: serde_json::Value = reply.decode("Test").unwrap();
        assert_eq!(decoded["ok"], true);
        // 10ms after the first failure, 20ms after the second
        assert!(started.elapsed() >= Duration::from_millis(30));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_headers_and_body_are_sent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = RetryingTransport::new(
            "Test",
            Duration::from_secs(5),
            RetryPolicy::default(),
            Some(600),
        )
        .unwrap();
        let url = format!("{}/generate", mock_server.uri());
        let reply = transport
            .post_json(&url, &[("x-api-key", "secret")], &serde_json::json!({"a": 1}))
            .await
            .unwrap();

        assert_eq!(reply.status, 200);
        let decoded: serde_json::Value = reply.decode("Test").unwrap();
        assert_eq!(decoded["ok"], true);
    }

    #[test]
    fn test_decode_malformed_body() {
        let reply = HttpReply {
            status: 200,
            body: "<html>gateway</html>".to_string(),
        };
        let err = reply.decode::<serde_json::Value>("Test").unwrap_err();
        assert_eq!(err.status_code, Some(200));
        assert!(err.message.starts_with("invalid response body"));
    }
}
