//! # OpenSky Proxy
//!
//! Flight-state pass-through authenticated with OAuth2 client credentials.
//!
//! - [`TokenSource`] fetches bearer tokens; [`ClientCredentials`] is the
//!   production implementation.
//! - [`TokenCache`] keeps the token until 60 seconds before it expires and
//!   serializes refreshes so concurrent callers share one fetch.
//! - [`OpenSkyProxy`] retries once with a fresh token when the API answers 401.

use crate::proxy::{ProxyError, ProxyResponse};
use crate::settings::OpenSky;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Tokens are refreshed this long before their advertised expiry.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 1800;
/// Upper bound on the lifetime trusted from the token endpoint.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_in: Duration,
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, ProxyError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

/// `grant_type=client_credentials` against the configured token endpoint.
pub struct ClientCredentials {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    pub fn new(
        client: reqwest::Client,
        token_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            client,
            token_url,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn fetch_token(&self) -> Result<AccessToken, ProxyError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProxyError::Token(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProxyError::Token(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProxyError::Token(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(ProxyError::Token("empty access_token".to_string()));
        }
        Ok(AccessToken {
            value: token.access_token,
            expires_in: Duration::from_secs(token.expires_in),
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Cached bearer token, fetching a new one when missing or near expiry.
    pub async fn get(&self) -> Result<String, ProxyError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.source.fetch_token().await?;
        debug!(
            "[OpenSky] Token refreshed, expires in {}s",
            fresh.expires_in.as_secs()
        );
        let value = fresh.value.clone();
        *cached = Some(CachedToken {
            value: fresh.value,
            expires_at: Instant::now() + fresh.expires_in.min(MAX_TOKEN_LIFETIME),
        });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

/// Optional `/states/all` bounding box, forwarded verbatim once validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatesQuery {
    pub lamin: Option<String>,
    pub lomin: Option<String>,
    pub lamax: Option<String>,
    pub lomax: Option<String>,
}

impl StatesQuery {
    pub fn to_pairs(&self) -> Result<Vec<(&'static str, String)>, ProxyError> {
        let fields = [
            ("lamin", &self.lamin),
            ("lomin", &self.lomin),
            ("lamax", &self.lamax),
            ("lomax", &self.lomax),
        ];
        let mut pairs = Vec::new();
        for (name, value) in fields {
            let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            if !value.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
                return Err(ProxyError::InvalidParameter(name));
            }
            pairs.push((name, value.to_string()));
        }
        Ok(pairs)
    }
}

pub struct OpenSkyProxy {
    client: reqwest::Client,
    states_url: String,
    tokens: Option<TokenCache>,
}

impl OpenSkyProxy {
    pub fn new(settings: &OpenSky) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let tokens = settings.credentials().map(|(id, secret)| {
            info!("[OpenSky] Client credentials configured");
            TokenCache::new(Arc::new(ClientCredentials::new(
                client.clone(),
                settings.token_url.clone(),
                id,
                secret,
            )))
        });
        Ok(Self {
            states_url: states_url(&settings.api_url),
            client,
            tokens,
        })
    }

    /// Uses `source` instead of the client-credentials flow.
    pub fn with_token_source(
        settings: &OpenSky,
        source: Arc<dyn TokenSource>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            states_url: states_url(&settings.api_url),
            client,
            tokens: Some(TokenCache::new(source)),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.tokens.is_some()
    }

    pub async fn fetch_states(&self, query: &StatesQuery) -> Result<ProxyResponse, ProxyError> {
        let tokens = self
            .tokens
            .as_ref()
            .ok_or(ProxyError::NotConfigured("OpenSky"))?;
        let pairs = query.to_pairs()?;

        let token = tokens.get().await?;
        let mut response = self.request(&token, &pairs).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("⚠️ [OpenSky] 401 with cached token, refreshing and retrying once");
            tokens.invalidate().await;
            let token = tokens.get().await?;
            response = self.request(&token, &pairs).await?;
        }

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(ProxyResponse { status, body })
    }

    async fn request(
        &self,
        token: &str,
        pairs: &[(&'static str, String)],
    ) -> Result<reqwest::Response, ProxyError> {
        Ok(self
            .client
            .get(&self.states_url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .query(pairs)
            .send()
            .await?)
    }
}

fn states_url(api_url: &str) -> String {
    format!("{}/states/all", api_url.trim_end_matches('/'))
}
