use crate::error::{Result, ScholarError};
use crate::types::FetchConfig;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT,
};

/// Desktop Chrome extras sent alongside the configured identity headers.
const BROWSER_HEADER_PAIRS: [(&str, &str); 6] = [
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
];

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Build the full request header map for a profile fetch.
pub fn browser_headers(cfg: &FetchConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    for (k, v) in BROWSER_HEADER_PAIRS {
        headers.insert(HeaderName::from_static(k), HeaderValue::from_static(v));
    }

    headers.insert(USER_AGENT, header_value("user_agent", &cfg.user_agent)?);
    headers.insert(
        ACCEPT_LANGUAGE,
        header_value("accept_language", &cfg.accept_language)?,
    );
    if let Some(referer) = &cfg.referer {
        headers.insert(REFERER, header_value("referer", referer)?);
    }

    Ok(headers)
}

fn header_value(field: &'static str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        ScholarError::validation_error(field, &format!("invalid header value: {e}"))
    })
}
