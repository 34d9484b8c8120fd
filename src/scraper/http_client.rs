use crate::config::ScraperConfig;
use rand::RngExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::ScrapeError;

pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text with rate-limiting and retry.
    pub async fn get_text(&self, url: &str) -> Result<String, ScrapeError> {
        self.polite_delay().await;

        let mut last_err = ScrapeError::Malformed("no attempts made".into());

        for attempt in 1..=(self.config.max_retries + 1) {
            debug!("GET {} (attempt {})", url, attempt);

            match self.inner.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.text().await?);
                    } else if status.as_u16() == 429 || status.as_u16() == 503 {
                        // Rate limited: back off harder
                        let backoff = Duration::from_millis(
                            self.config.request_delay_ms * (2u64.pow(attempt)),
                        );
                        warn!(
                            "Rate limited ({}) on attempt {}, sleeping {:?}",
                            status, attempt, backoff
                        );
                        sleep(backoff).await;
                        last_err = ScrapeError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        };
                    } else {
                        // Don't retry 4xx other than 429
                        return Err(ScrapeError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                }
                Err(e) => {
                    warn!("Request failed on attempt {}: {}", attempt, e);
                    let backoff =
                        Duration::from_millis(self.config.request_delay_ms * u64::from(attempt));
                    last_err = ScrapeError::Transport(e);
                    sleep(backoff).await;
                }
            }
        }

        Err(last_err)
    }

    /// POST a JSON body and decode a JSON response. Single attempt: the
    /// endpoints behind this are enrichment-only and a failure is cheap.
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        cookie_header: Option<&str>,
    ) -> Result<serde_json::Value, ScrapeError> {
        self.polite_delay().await;
        debug!("POST {}", url);

        let mut request = self.inner.post(url).json(body);
        if let Some(cookies) = cookie_header {
            request = request.header(reqwest::header::COOKIE, cookies);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.json().await?)
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = if self.config.jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=self.config.jitter_ms)
        };
        let total = Duration::from_millis(self.config.request_delay_ms + jitter);
        if !total.is_zero() {
            sleep(total).await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    fn fast_config() -> ScraperConfig {
        ScraperConfig {
            request_delay_ms: 0,
            jitter_ms: 0,
            max_retries: 1,
            ..ScraperConfig::default()
        }
    }

    #[test]
    fn get_text_returns_the_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/page");
            then.status(200).body("hello");
        });

        let client = HttpClient::new(&fast_config()).unwrap();
        let body = tokio_test::block_on(client.get_text(&server.url("/page"))).unwrap();

        assert_eq!(body, "hello");
        mock.assert();
    }

    #[test]
    fn hard_404_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        });

        let client = HttpClient::new(&fast_config()).unwrap();
        let result = tokio_test::block_on(client.get_text(&server.url("/gone")));

        assert!(matches!(result, Err(ScrapeError::Status { status: 404, .. })));
        mock.assert_hits(1);
    }

    #[test]
    fn rate_limits_are_retried_until_the_cap() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/busy");
            then.status(503);
        });

        let client = HttpClient::new(&fast_config()).unwrap();
        let result = tokio_test::block_on(client.get_text(&server.url("/busy")));

        assert!(matches!(result, Err(ScrapeError::Status { status: 503, .. })));
        // max_retries = 1 means two attempts in total.
        mock.assert_hits(2);
    }
}
