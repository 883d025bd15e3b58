use crate::error::{Result, ScholarError};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://scholar.google.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;
const BACKOFF_MAX_SECS: f64 = 120.0;

/// Statuses worth another attempt: rate limiting and gateway/server hiccups.
pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Opaque Scholar user token (the `user=` query value). Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScholarError::validation_error(
                "user",
                "profile identifier must not be empty",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Profile page URL: `<base>/citations?user=<id>&hl=en`.
    pub fn profile_url(&self, base_url: &str) -> Result<Url> {
        let base = Url::parse(base_url).map_err(|e| {
            ScholarError::validation_error("base_url", &format!("{base_url}: {e}"))
        })?;
        let mut url = base.join("citations").map_err(|e| {
            ScholarError::validation_error("base_url", &format!("{base_url}: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("user", &self.0)
            .append_pair("hl", "en");
        Ok(url)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three summary numbers, in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub citations: u64,
    pub h_index: u64,
    pub i10_index: u64,
}

impl Metrics {
    pub fn new(citations: u64, h_index: u64, i10_index: u64) -> Self {
        Self {
            citations,
            h_index,
            i10_index,
        }
    }
}

/// On-disk badge record. Field names are the published JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub citations: u64,
    pub hindex: u64,
    pub i10: u64,
    pub updated: DateTime<Utc>,
    pub profile: String,
}

impl MetricsRecord {
    pub fn new(metrics: Metrics, profile: &Url) -> Self {
        Self::at(metrics, profile, Utc::now())
    }

    pub fn at(metrics: Metrics, profile: &Url, updated: DateTime<Utc>) -> Self {
        Self {
            citations: metrics.citations,
            hindex: metrics.h_index,
            i10: metrics.i10_index,
            updated: updated.trunc_subsecs(0),
            profile: profile.to_string(),
        }
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::new(self.citations, self.hindex, self.i10)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Seconds; delay before retry `n` is `factor * 2^(n-1)`.
    pub backoff_factor: f64,
    pub statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            statuses: TRANSIENT_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn is_transient(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }

    /// Sleep before the 1-based `retry`, capped at two minutes.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.backoff_factor <= 0.0 || retry == 0 {
            return Duration::ZERO;
        }
        let exp = 2f64.powi(retry.saturating_sub(1).min(30) as i32);
        Duration::from_secs_f64((self.backoff_factor * exp).min(BACKOFF_MAX_SECS))
    }
}

/// Network and header settings handed to the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub referer: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            referer: Some(format!("{DEFAULT_BASE_URL}/")),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Body of a successful profile fetch.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    /// Final URL after redirects.
    pub url: String,
    pub attempts: u32,
}
