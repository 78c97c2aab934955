use axum::body::Bytes;
use thiserror::Error;

/// Upstream status and body, echoed to the caller.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Failures of the pass-through proxies (`/rss`, `/opensky`).
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),
    #[error("Invalid {0} parameter")]
    InvalidParameter(&'static str),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Redirect without a usable Location header")]
    BadRedirect,
    #[error("Upstream request timed out")]
    Timeout,
    #[error("Upstream request failed: {0}")]
    Upstream(String),
    #[error("{0} credentials not configured")]
    NotConfigured(&'static str),
    #[error("Token acquisition failed: {0}")]
    Token(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::Timeout
        } else {
            ProxyError::Upstream(e.to_string())
        }
    }
}

impl ProxyError {
    /// Short label for the proxy request counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::MissingParameter(_)
            | ProxyError::InvalidParameter(_)
            | ProxyError::InvalidUrl(_) => "bad_request",
            ProxyError::DomainNotAllowed(_) => "forbidden",
            ProxyError::Timeout => "timeout",
            ProxyError::NotConfigured(_) | ProxyError::Token(_) => "unavailable",
            ProxyError::TooManyRedirects | ProxyError::BadRedirect | ProxyError::Upstream(_) => {
                "upstream_error"
            }
        }
    }
}
