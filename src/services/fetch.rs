use crate::error::{Result, ScholarError};
use crate::services::block::{excerpt, find_block_phrase, visible_text};
use crate::services::headers::browser_headers;
use crate::types::*;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use scraper::Html;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const REDIRECT_LIMIT: usize = 10;

/// Raw response as seen by the fetcher.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

/// Transport-level failure (no HTTP status was received).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// Connect failures and timeouts; worth another attempt.
    pub transient: bool,
}

/// One HTTP GET. Implemented by reqwest in production and by stubs in tests.
pub trait Transport {
    fn name(&self) -> &'static str;
    fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(cfg: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ScholarError::network_error(&cfg.base_url, &e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest-blocking"
    }

    fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .map_err(transport_error)?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp.text().map_err(transport_error)?;
        Ok(HttpResponse {
            status,
            url: final_url,
            body,
        })
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    TransportError {
        transient: e.is_connect() || e.is_timeout() || e.is_request(),
        message: e.to_string(),
    }
}

/// Retrying profile fetcher. Holds no state between calls.
pub struct Fetcher<T: Transport> {
    transport: T,
    config: FetchConfig,
}

impl Fetcher<ReqwestTransport> {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn with_transport(transport: T, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch the profile page for `user`.
    ///
    /// Empty identifiers fail before any request is sent. Transient statuses
    /// and connection errors are retried with exponential backoff; 403 and
    /// challenge pages come back as [`ScholarError::Blocked`].
    pub fn fetch(&self, user: &str) -> Result<FetchedPage> {
        let id = ProfileId::parse(user)?;
        let url = id.profile_url(&self.config.base_url)?;
        let headers = browser_headers(&self.config)?;
        let policy = &self.config.retry;

        let mut attempt: u32 = 0;
        let resp = loop {
            attempt += 1;
            debug!(
                transport = self.transport.name(),
                attempt,
                url = %url,
                "fetching profile"
            );

            let retries_left = attempt <= policy.max_retries;
            match self.transport.get(url.as_str(), &headers) {
                Ok(resp) if retries_left && policy.is_transient(resp.status.as_u16()) => {
                    warn!(status = resp.status.as_u16(), attempt, "transient status, retrying");
                }
                Ok(resp) => break resp,
                Err(e) if retries_left && e.transient => {
                    warn!(error = %e, attempt, "connection error, retrying");
                }
                Err(e) => {
                    return Err(ScholarError::network_error(
                        url.as_str(),
                        &format!("{} (after {attempt} attempt(s))", e.message),
                    ));
                }
            }

            backoff_sleep(policy.delay_for(attempt));
        };

        classify_response(resp, attempt)
    }
}

/// Turn a final response into a page or a block/HTTP failure.
fn classify_response(resp: HttpResponse, attempts: u32) -> Result<FetchedPage> {
    if resp.status == StatusCode::FORBIDDEN {
        return Err(ScholarError::Blocked {
            reason: "HTTP 403 forbidden".to_string(),
            excerpt: page_excerpt(&resp.body),
            url: Some(resp.url),
            page: non_empty(resp.body),
        });
    }

    if let Some(phrase) = find_block_phrase(&resp.body) {
        return Err(ScholarError::Blocked {
            reason: format!(
                "challenge phrase \"{phrase}\" in response (HTTP {})",
                resp.status.as_u16()
            ),
            excerpt: page_excerpt(&resp.body),
            url: Some(resp.url),
            page: non_empty(resp.body),
        });
    }

    if !resp.status.is_success() {
        return Err(ScholarError::Http {
            url: resp.url,
            status: resp.status.as_u16(),
            page: non_empty(resp.body),
        });
    }

    Ok(FetchedPage {
        html: resp.body,
        url: resp.url,
        attempts,
    })
}

fn page_excerpt(body: &str) -> String {
    excerpt(&visible_text(&Html::parse_document(body)))
}

fn non_empty(body: String) -> Option<String> {
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

fn backoff_sleep(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    let jitter = Duration::from_millis(jitter_ms(delay.as_millis() as u64 / 10));
    std::thread::sleep(delay + jitter);
}

/// Random-ish jitter in milliseconds within [0, range).
fn jitter_ms(range: u64) -> u64 {
    if range == 0 {
        return 0;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_nanos(0));
    let nanos = now.subsec_nanos() as u64;
    let micros = (now.as_micros() & 0xFFFF) as u64;
    (nanos ^ (micros << 5)) % range
}
