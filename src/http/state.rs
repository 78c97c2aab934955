//! Application state for the HTTP gateway.

use crate::feed_proxy::FeedProxy;
use crate::opensky_proxy::OpenSkyProxy;
use crate::relay::Relay;
use crate::settings::Settings;
use log::warn;
use std::sync::Arc;

/// Shared state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub feeds: Arc<FeedProxy>,
    pub opensky: Arc<OpenSkyProxy>,
}

impl AppState {
    pub fn new(relay: Arc<Relay>, feeds: Arc<FeedProxy>, opensky: Arc<OpenSkyProxy>) -> Self {
        Self {
            relay,
            feeds,
            opensky,
        }
    }

    /// Builds both proxies from settings around an existing relay.
    pub fn from_settings(relay: Arc<Relay>, settings: &Settings) -> Result<Self, reqwest::Error> {
        let opensky = OpenSkyProxy::new(&settings.opensky)?;
        if !opensky.is_configured() {
            warn!("⚠️ [OpenSky] No client credentials, /opensky will answer 503");
        }
        Ok(Self::new(
            relay,
            Arc::new(FeedProxy::new(&settings.rss)?),
            Arc::new(opensky),
        ))
    }
}
