use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScholarError>;

/// Exit code for a missing or empty required argument.
pub const EXIT_VALIDATION: u8 = 2;
/// Exit code for any fetch, extraction or output failure.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum ScholarError {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Bot challenge detected, either from the response (403 / challenge
    /// phrases) or from the page text during extraction.
    #[error("blocked by remote: {reason}{}{}", at_url(.url), excerpt_suffix(.excerpt))]
    Blocked {
        reason: String,
        url: Option<String>,
        excerpt: String,
        page: Option<String>,
    },

    #[error("HTTP {status} from {url}")]
    Http {
        url: String,
        status: u16,
        page: Option<String>,
    },

    #[error("metrics not found{}: {details}", at_url(.url))]
    Parse { details: String, url: Option<String> },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn at_url(url: &Option<String>) -> String {
    url.as_deref().map(|u| format!(" at {u}")).unwrap_or_default()
}

fn excerpt_suffix(excerpt: &str) -> String {
    if excerpt.is_empty() {
        String::new()
    } else {
        format!(" (page says: \"{excerpt}\")")
    }
}

impl ScholarError {
    pub fn validation_error(field: &'static str, message: &str) -> Self {
        Self::Validation {
            field,
            message: message.to_string(),
        }
    }

    pub fn network_error(url: &str, message: &str) -> Self {
        Self::Network {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation { .. } => EXIT_VALIDATION,
            _ => EXIT_FAILURE,
        }
    }

    /// Raw page content received before the failure, if any.
    pub fn page(&self) -> Option<&str> {
        match self {
            Self::Blocked { page, .. } | Self::Http { page, .. } => page.as_deref(),
            _ => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Attach the page URL to content-level failures that were raised
    /// without one.
    pub fn with_url(mut self, page_url: &str) -> Self {
        if let Self::Blocked { url, .. } | Self::Parse { url, .. } = &mut self {
            if url.is_none() {
                *url = Some(page_url.to_string());
            }
        }
        self
    }
}
