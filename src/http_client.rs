use crate::config::HttpConfig;
use crate::metrics::MetricsTracker;
use rand::Rng;
use reqwest::{Client, ClientBuilder, Response, Url};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json";

/// HTTP fetch wrapper shared by every scraper.
///
/// Failures never cross the public boundary: `fetch_html`/`fetch_json`
/// resolve to `None` on any network error, timeout, or non-2xx status, and
/// the caller proceeds with degraded data. Retries apply only to statuses
/// worth retrying; a plain 404 fails on the first attempt so candidate-URL
/// probing stays single-shot per URL.
pub struct FetchClient {
    client: Client,
    config: HttpConfig,
    metrics: MetricsTracker,
    host_limits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl FetchClient {
    pub fn new(config: HttpConfig, metrics: MetricsTracker) -> Result<Self, reqwest::Error> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .cookie_store(config.enable_cookies)
            .redirect(reqwest::redirect::Policy::limited(10))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if config.enable_compression {
            builder = builder.gzip(true).brotli(true);
        }

        // Headers that mimic a real browser; trivial bot checks reject
        // requests without them.
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Accept-Language", "en-US,en;q=0.9,id;q=0.8".parse().unwrap());
        headers.insert("DNT", "1".parse().unwrap());
        headers.insert("Connection", "keep-alive".parse().unwrap());
        headers.insert("Upgrade-Insecure-Requests", "1".parse().unwrap());
        headers.insert("Sec-Fetch-Dest", "document".parse().unwrap());
        headers.insert("Sec-Fetch-Mode", "navigate".parse().unwrap());
        headers.insert("Sec-Fetch-Site", "none".parse().unwrap());
        let client = builder.default_headers(headers).build()?;

        Ok(Self {
            client,
            config,
            metrics,
            host_limits: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch an HTML page; `None` on any failure.
    pub async fn fetch_html(&self, url: &str) -> Option<String> {
        self.fetch(url, HTML_ACCEPT, Duration::from_secs(self.config.timeout_secs))
            .await
    }

    /// Fetch a JSON API response with the shorter API timeout; `None` on any failure.
    pub async fn fetch_json(&self, url: &str) -> Option<String> {
        self.fetch(url, JSON_ACCEPT, Duration::from_secs(self.config.api_timeout_secs))
            .await
    }

    async fn fetch(&self, url: &str, accept: &str, timeout: Duration) -> Option<String> {
        let host = host_of(url).unwrap_or_else(|| "unknown".to_string());
        let _permit = self.host_permit(&host).await;

        let start = Instant::now();
        match self.get_with_retry(url, accept, timeout).await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    log::warn!("[fetch] {} for {}", status, url);
                    self.metrics
                        .record_failure(&host, format!("status {}", status.as_u16()));
                    return None;
                }
                match response.text().await {
                    Ok(body) => {
                        self.metrics.record_success(&host, start.elapsed());
                        Some(body)
                    }
                    Err(e) => {
                        log::warn!("[fetch] body read failed for {}: {}", url, e);
                        self.metrics.record_failure(&host, e.to_string());
                        None
                    }
                }
            }
            Err(e) => {
                log::warn!("[fetch] request failed for {}: {}", url, e);
                let label = if e.is_timeout() {
                    format!("timeout: {}", e)
                } else {
                    e.to_string()
                };
                self.metrics.record_failure(&host, label);
                None
            }
        }
    }

    async fn get_with_retry(
        &self,
        url: &str,
        accept: &str,
        timeout: Duration,
    ) -> Result<Response, reqwest::Error> {
        let mut attempt = 0usize;
        loop {
            let request = self
                .client
                .get(url)
                .header("Accept", accept)
                .timeout(timeout);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if Self::is_retryable_status(status) && attempt < self.config.max_retries {
                        log::warn!(
                            "Retryable status {} for {}, attempt {}/{}",
                            status,
                            url,
                            attempt + 1,
                            self.config.max_retries + 1
                        );
                        sleep(self.retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect() || e.is_request();
                    if transient && attempt < self.config.max_retries {
                        log::warn!(
                            "Request failed for {}, attempt {}/{}: {}",
                            url,
                            attempt + 1,
                            self.config.max_retries + 1,
                            e
                        );
                        sleep(self.retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        matches!(
            status.as_u16(),
            429 | 500 | 502 | 503 | 504 | 520 | 521 | 522 | 523 | 524
        )
    }

    /// Exponential backoff with jitter to avoid hammering a recovering host.
    fn retry_delay(&self, attempt: usize) -> Duration {
        let base = self.config.initial_retry_delay_ms;
        let capped = (base * 2u64.pow(attempt as u32)).min(self.config.max_retry_delay_ms);
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((capped as f64 * jitter) as u64)
    }

    async fn host_permit(&self, host: &str) -> Option<OwnedSemaphorePermit> {
        let semaphore = {
            let mut limits = self.host_limits.lock().unwrap();
            limits
                .entry(host.to_string())
                .or_insert_with(|| {
                    Arc::new(Semaphore::new(self.config.per_host_concurrency.max(1)))
                })
                .clone()
        };
        semaphore.acquire_owned().await.ok()
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|h| h.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> HttpConfig {
        HttpConfig {
            max_retries: 0,
            timeout_secs: 2,
            api_timeout_secs: 1,
            ..HttpConfig::default()
        }
    }

    #[test]
    fn test_retryable_status() {
        use reqwest::StatusCode;
        assert!(FetchClient::is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(FetchClient::is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(FetchClient::is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!FetchClient::is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!FetchClient::is_retryable_status(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_retry_delay_growth() {
        let client = FetchClient::new(HttpConfig::default(), MetricsTracker::new()).unwrap();
        let d0 = client.retry_delay(0);
        let d3 = client.retry_delay(3);
        assert!(d0.as_millis() >= 375);
        // Capped at max_retry_delay_ms plus jitter headroom.
        assert!(d3.as_millis() <= 5000);
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://indoanime.net/page/2/"),
            Some("indoanime.net".to_string())
        );
        assert_eq!(host_of("not a url"), None);
    }

    #[tokio::test]
    async fn test_fetch_is_fail_soft_on_invalid_url() {
        let client = FetchClient::new(quick_config(), MetricsTracker::new()).unwrap();
        assert_eq!(client.fetch_html("not a url").await, None);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_recorded() {
        let metrics = MetricsTracker::new();
        let client = FetchClient::new(quick_config(), metrics.clone()).unwrap();
        // Nothing listens on this port; connection is refused immediately.
        let result = client.fetch_json("http://127.0.0.1:9/none").await;
        assert_eq!(result, None);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].failed_requests, 1);
    }
}
