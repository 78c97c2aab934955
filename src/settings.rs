use config::{Config, ConfigError, File};
use log::warn;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("AISSTREAM_API_KEY is not set; the relay cannot subscribe to the upstream feed")]
    MissingApiKey,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Upstream {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_upstream_url() -> String {
    "wss://stream.aisstream.io/v0/stream".to_string()
}
fn default_reconnect_delay_ms() -> u64 {
    5000
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            api_key: String::new(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3004
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotSettings {
    #[serde(default = "default_snapshot_interval_ms")]
    pub interval_ms: u64,
}

fn default_snapshot_interval_ms() -> u64 {
    5000
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_snapshot_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Fanout {
    /// Frames buffered per subscriber before a slow client starts skipping
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for Fanout {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Rss {
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
    #[serde(default = "default_proxy_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_allowed_domains() -> Vec<String> {
    [
        "feeds.bbci.co.uk",
        "www.theguardian.com",
        "feeds.npr.org",
        "news.google.com",
        "www.aljazeera.com",
        "rss.cnn.com",
        "feeds.reuters.com",
        "www.maritime-executive.com",
        "gcaptain.com",
        "www.hellenicshippingnews.com",
        "www.defensenews.com",
        "www.navalnews.com",
        "www.usni.org",
        "www.state.gov",
        "www.defense.gov",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_proxy_timeout_secs() -> u64 {
    15
}
fn default_max_redirects() -> usize {
    3
}

impl Default for Rss {
    fn default() -> Self {
        Self {
            allowed_domains: default_allowed_domains(),
            timeout_secs: default_proxy_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenSky {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_opensky_token_url")]
    pub token_url: String,
    #[serde(default = "default_opensky_api_url")]
    pub api_url: String,
    #[serde(default = "default_proxy_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_opensky_token_url() -> String {
    "https://auth.opensky-network.org/auth/realms/opensky-network/protocol/openid-connect/token"
        .to_string()
}
fn default_opensky_api_url() -> String {
    "https://opensky-network.org/api".to_string()
}

impl Default for OpenSky {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: default_opensky_token_url(),
            api_url: default_opensky_api_url(),
            timeout_secs: default_proxy_timeout_secs(),
        }
    }
}

impl OpenSky {
    /// Both halves of the client-credentials pair, if configured and non-blank.
    pub fn credentials(&self) -> Option<(String, String)> {
        let id = self.client_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let secret = self
            .client_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some((id.to_string(), secret.to_string()))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub upstream: Upstream,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub snapshot: SnapshotSettings,
    #[serde(default)]
    pub fanout: Fanout,
    #[serde(default)]
    pub rss: Rss,
    #[serde(default)]
    pub opensky: OpenSky,
}

impl Settings {
    /// Loads `path` (if present) and applies process environment overrides.
    pub fn from_path(path: &str) -> Result<Self, SettingsError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env_overrides(|key| env::var(key).ok());
        Ok(settings)
    }

    /// Applies overrides from `lookup`. Blank values are ignored; numeric values
    /// that fail to parse keep the current value.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = get("AISSTREAM_API_KEY") {
            self.upstream.api_key = key;
        }
        if let Some(url) = get("AIS_UPSTREAM_URL") {
            self.upstream.url = url;
        }
        if let Some(id) = get("OPENSKY_CLIENT_ID") {
            self.opensky.client_id = Some(id);
        }
        if let Some(secret) = get("OPENSKY_CLIENT_SECRET") {
            self.opensky.client_secret = Some(secret);
        }
        if let Some(port) = get("PORT").and_then(|v| parse_or_warn("PORT", &v)) {
            self.server.port = port;
        }
        if let Some(ms) = get("AIS_SNAPSHOT_INTERVAL_MS")
            .and_then(|v| parse_or_warn::<u64>("AIS_SNAPSHOT_INTERVAL_MS", &v))
        {
            if ms > 0 {
                self.snapshot.interval_ms = ms;
            } else {
                warn!("⚠️ Ignoring AIS_SNAPSHOT_INTERVAL_MS=0");
            }
        }
    }

    /// Startup check: the relay has no function without an upstream API key.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.upstream.api_key.trim().is_empty() {
            return Err(SettingsError::MissingApiKey);
        }
        Ok(())
    }
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("⚠️ Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let s = Settings::default();
        assert_eq!(s.server.port, 3004);
        assert_eq!(s.snapshot.interval_ms, 5000);
        assert_eq!(s.upstream.reconnect_delay_ms, 5000);
        assert_eq!(s.rss.max_redirects, 3);
        assert!(s.opensky.credentials().is_none());
        assert!(matches!(s.validate(), Err(SettingsError::MissingApiKey)));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 8080\n\n[upstream]\napi_key = \"from-file\"\n\n[rss]\nallowed_domains = [\"example.com\"]"
        )
        .unwrap();

        let path = file.path().with_extension("");
        let s = Config::builder()
            .add_source(File::with_name(path.to_str().unwrap()).required(false))
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.upstream.api_key, "from-file");
        assert_eq!(s.rss.allowed_domains, vec!["example.com".to_string()]);
        assert_eq!(s.fanout.channel_capacity, 1024);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut s = Settings::default();
        s.apply_env_overrides(lookup(&[
            ("AISSTREAM_API_KEY", " key-123 "),
            ("PORT", "9999"),
            ("AIS_SNAPSHOT_INTERVAL_MS", "2000"),
            ("OPENSKY_CLIENT_ID", "id"),
            ("OPENSKY_CLIENT_SECRET", "secret"),
        ]));
        assert_eq!(s.upstream.api_key, "key-123");
        assert_eq!(s.server.port, 9999);
        assert_eq!(s.snapshot.interval_ms, 2000);
        assert_eq!(
            s.opensky.credentials(),
            Some(("id".to_string(), "secret".to_string()))
        );
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_invalid_numeric_env_is_ignored() {
        let mut s = Settings::default();
        s.apply_env_overrides(lookup(&[
            ("PORT", "not-a-port"),
            ("AIS_SNAPSHOT_INTERVAL_MS", "0"),
            ("AISSTREAM_API_KEY", "   "),
        ]));
        assert_eq!(s.server.port, 3004);
        assert_eq!(s.snapshot.interval_ms, 5000);
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let s = Config::builder()
            .add_source(File::with_name(path.to_str().unwrap()).required(false))
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();
        assert_eq!(s.server.port, 3004);
    }
}
