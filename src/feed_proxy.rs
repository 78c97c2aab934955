// Feed Proxy - Fetch de feeds RSS/Atom para orígenes que bloquean la IP del despliegue
// Allowlist de dominios, redirecciones manuales (máx. configurable), gzip/deflate transparente

use crate::proxy::{ProxyError, ProxyResponse};
use crate::settings::Rss;
use log::{debug, warn};
use reqwest::header::{ACCEPT, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

const FEED_USER_AGENT: &str = "Mozilla/5.0 (compatible; ais-relay/1.0; +rss-proxy)";
const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml, text/xml, */*";

pub struct FeedProxy {
    client: reqwest::Client,
    allowed_domains: Vec<String>,
    max_redirects: usize,
}

impl FeedProxy {
    pub fn new(settings: &Rss) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .gzip(true)
            .deflate(true)
            .build()?;
        Ok(Self {
            client,
            allowed_domains: settings
                .allowed_domains
                .iter()
                .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            max_redirects: settings.max_redirects,
        })
    }

    /// Exact match or subdomain of an allowed domain.
    pub fn is_allowed(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.allowed_domains.iter().any(|domain| {
            host == *domain
                || (host.len() > domain.len()
                    && host.ends_with(domain.as_str())
                    && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
        })
    }

    /// Parses the requested URL and enforces scheme and allowlist.
    pub fn check_url(&self, raw: &str) -> Result<Url, ProxyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProxyError::MissingParameter("url"));
        }
        let url = Url::parse(raw).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ProxyError::InvalidUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ProxyError::InvalidUrl("missing host".to_string()))?;
        if !self.is_allowed(host) {
            return Err(ProxyError::DomainNotAllowed(host.to_string()));
        }
        Ok(url)
    }

    /// Fetches the feed, following at most `max_redirects` hops.
    pub async fn fetch(&self, raw: &str) -> Result<ProxyResponse, ProxyError> {
        let mut url = self.check_url(raw)?;

        for hop in 0..=self.max_redirects {
            let response = self
                .client
                .get(url.clone())
                .header(USER_AGENT, FEED_USER_AGENT)
                .header(ACCEPT, FEED_ACCEPT)
                .send()
                .await?;

            if response.status().is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(ProxyError::BadRedirect)?;
                let next = url.join(location).map_err(|_| ProxyError::BadRedirect)?;
                debug!("[RSS] Redirect {} -> {} (hop {})", url, next, hop + 1);
                url = next;
                continue;
            }

            let status = response.status().as_u16();
            let body = response.bytes().await?;
            if status >= 400 {
                warn!("⚠️ [RSS] {} answered {}", url, status);
            }
            return Ok(ProxyResponse { status, body });
        }

        Err(ProxyError::TooManyRedirects)
    }
}
