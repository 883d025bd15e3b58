use crate::error::{Result, ScholarError};
use crate::services::extract::extract;
use crate::services::fetch::{Fetcher, Transport};
use crate::types::MetricsRecord;
use std::time::Instant;
use tracing::info;

/// Outcome of a failed refresh, with the page that was received (if any).
#[derive(Debug)]
pub struct RefreshFailure {
    pub error: ScholarError,
    pub page: Option<String>,
}

impl From<ScholarError> for RefreshFailure {
    fn from(error: ScholarError) -> Self {
        let page = error.page().map(str::to_string);
        Self { error, page }
    }
}

/// Fetch the profile page for `user` and extract its metrics record.
pub fn refresh_metrics<T: Transport>(
    fetcher: &Fetcher<T>,
    user: &str,
) -> std::result::Result<MetricsRecord, RefreshFailure> {
    let start = Instant::now();
    let page = fetcher.fetch(user)?;

    match extract(&page.html) {
        Ok(metrics) => {
            let profile = profile_url(fetcher, user)?;
            info!(
                citations = metrics.citations,
                h_index = metrics.h_index,
                i10_index = metrics.i10_index,
                attempts = page.attempts,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "metrics extracted"
            );
            Ok(MetricsRecord::new(metrics, &profile))
        }
        Err(error) => Err(RefreshFailure {
            error: error.with_url(&page.url),
            page: Some(page.html),
        }),
    }
}

/// Canonical profile URL recorded in the output (independent of redirects).
fn profile_url<T: Transport>(fetcher: &Fetcher<T>, user: &str) -> Result<url::Url> {
    crate::types::ProfileId::parse(user)?.profile_url(&fetcher.config().base_url)
}
