//! HTTP fetching with exponential backoff retry logic.
//!
//! The pipeline depends on a [`Fetch`] capability rather than a concrete
//! client, which keeps the orchestrator testable against canned pages.
//! [`HttpFetch`] performs single attempts with `reqwest`; [`Retry`] is a
//! decorator that adds retry logic to any [`Fetch`] implementation.
//!
//! # Retry Strategy
//!
//! - Exponential backoff starting at the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-1000ms) added between attempts
//! - Any non-200 status or transport error is retryable up to the limit

use std::path::Path;
use std::time::{Duration, Instant};

use rand::{Rng, rng};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::FetchError;

const ACCEPT_HEADER: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
     image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// How long a speculative HEAD probe may take before it is written off.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A fetched page body along with the final URL after redirects. The
/// final URL carries the query parameters the permanent link is rebuilt
/// from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: String,
}

/// Capability to retrieve pages and media over the network.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    /// GET `url` and return its body as text.
    async fn get_page(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Stream the body of `url` into `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError>;

    /// Cheap reachability check; used for speculative CDN links.
    /// Never retried.
    async fn probe(&self, url: &str) -> bool;
}

/// Single-attempt [`Fetch`] implementation backed by `reqwest`.
#[derive(Debug)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout));

        if let Some(proxy) = config.proxy_url() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Fetch for HttpFetch {
    #[instrument(level = "debug", skip(self))]
    async fn get_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Capture before text() consumes the response; redirects may have
        // moved us to the parameterized permanent URL.
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })?;

        debug!(bytes = body.len(), %final_url, "Fetched page");
        Ok(FetchedPage { final_url, body })
    }

    #[instrument(level = "debug", skip(self, dest), fields(dest = %dest.display()))]
    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;

        // Stream in chunks; media bodies are never buffered whole.
        while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })? {
            file.write_all(&chunk).await.map_err(|e| FetchError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
        }

        info!(%url, dest = %dest.display(), "Downloaded media file");
        Ok(())
    }

    async fn probe(&self, url: &str) -> bool {
        match self
            .client
            .head(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().as_u16() == 200,
            Err(e) => {
                debug!(%url, error = %e, "Probe failed");
                false
            }
        }
    }
}

/// Decorator that adds exponential backoff retry logic to any [`Fetch`]
/// implementation.
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..1000ms)
/// ```
#[derive(Debug)]
pub struct Retry<F> {
    inner: F,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<F: Fetch> Retry<F> {
    pub fn new(inner: F, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=1000);
        delay + Duration::from_millis(jitter_ms)
    }

    async fn with_retries<T, Fut>(
        &self,
        url: &str,
        mut op: impl FnMut() -> Fut,
    ) -> Result<T, FetchError>
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(
                            %url,
                            attempts = attempt,
                            elapsed_ms = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "Exhausted retries"
                        );
                        return Err(FetchError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        %url,
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "Request failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<F: Fetch> Fetch for Retry<F> {
    async fn get_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.with_retries(url, || self.inner.get_page(url)).await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        self.with_retries(url, || self.inner.download(url, dest))
            .await
    }

    async fn probe(&self, url: &str) -> bool {
        self.inner.probe(url).await
    }
}

/// Build the fetcher used by `main`: an [`HttpFetch`] wrapped in [`Retry`]
/// configured from the loaded settings.
pub fn build_fetcher(config: &Config) -> Result<Retry<HttpFetch>, reqwest::Error> {
    Ok(Retry::new(
        HttpFetch::new(config)?,
        config.retry_times,
        Duration::from_secs(config.retry_delay),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Fails the first `failures` page requests, then succeeds.
    struct Flaky {
        failures: Cell<usize>,
        calls: Cell<usize>,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Self {
                failures: Cell::new(failures),
                calls: Cell::new(0),
            }
        }
    }

    impl Fetch for Flaky {
        async fn get_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            Ok(FetchedPage {
                final_url: url.to_string(),
                body: "<html></html>".into(),
            })
        }

        async fn download(&self, _url: &str, _dest: &Path) -> Result<(), FetchError> {
            Ok(())
        }

        async fn probe(&self, _url: &str) -> bool {
            false
        }
    }

    fn fast_retry(inner: Flaky, max_retries: usize) -> Retry<Flaky> {
        Retry {
            inner,
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let retry = fast_retry(Flaky::new(2), 3);
        let page = retry.get_page("https://mp.weixin.qq.com/s/x").await.unwrap();
        assert_eq!(page.body, "<html></html>");
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let retry = fast_retry(Flaky::new(10), 2);
        let err = retry
            .get_page("https://mp.weixin.qq.com/s/x")
            .await
            .unwrap_err();
        match err {
            FetchError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        // initial attempt + 2 retries
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let retry = Retry::new(Flaky::new(0), 5, Duration::from_secs(2));
        assert!(retry.backoff(1) >= Duration::from_secs(2));
        assert!(retry.backoff(3) >= Duration::from_secs(8));
        assert!(retry.backoff(10) <= Duration::from_secs(31));
    }
}
