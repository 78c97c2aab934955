//! Integration tests for the HTTP gateway
//!
//! Tests cover:
//! - /health and /ais/snapshot bodies and headers
//! - JSON error rendering for the proxies
//! - CORS preflight and allow-origin on every response
//! - Feed proxy redirects, decompression, timeouts and OpenSky 401 retry
//!   against local servers
//! - JSON rejection of plain requests to the WebSocket endpoint

use ais_relay::aggregation_engine::now_ms;
use ais_relay::http::{self, create_router, AppState};
use ais_relay::opensky_proxy::{AccessToken, TokenSource};
use ais_relay::proxy::ProxyError;
use ais_relay::relay::Relay;
use ais_relay::settings::Settings;
use ais_relay::types::PositionUpdate;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::Query,
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use tower_http::compression::CompressionLayer;

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.upstream.api_key = "test-key".to_string();
    // nothing listens here; lazy connects fail fast and retry in the background
    settings.upstream.url = "ws://127.0.0.1:9".to_string();
    settings.rss.allowed_domains = vec!["127.0.0.1".to_string()];
    settings
}

fn app_with(settings: &Settings) -> (Router, Arc<Relay>) {
    let relay = Arc::new(Relay::new(settings));
    let state = AppState::from_settings(Arc::clone(&relay), settings).unwrap();
    (create_router(state), relay)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, value)
}

/// Serves `router` on an ephemeral local port.
async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = app_with(&test_settings());
    let (status, headers, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["clients"], 0);
    assert_eq!(body["messages"], 0);
    assert_eq!(body["connected"], false);
    assert_eq!(body["vessels"], 0);
    assert_eq!(body["densityZones"], 0);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_snapshot_endpoint_with_candidates() {
    let (app, relay) = app_with(&test_settings());
    relay.engine().lock().await.ingest(
        &PositionUpdate {
            mmsi: "232000001".to_string(),
            name: "HMS DEFENDER".to_string(),
            lat: 50.8,
            lon: -1.1,
            ship_type: Some(35),
            heading: Some(270.0),
            speed: Some(12.0),
            course: Some(268.0),
        },
        now_ms(),
    );

    let (status, headers, body) = get_json(app.clone(), "/ais/snapshot?candidates=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=2");
    assert_eq!(body["sequence"], 1);
    assert_eq!(body["status"]["vesselCount"], 1);
    assert!(body["disruptions"].as_array().unwrap().is_empty());
    assert_eq!(body["candidateReports"][0]["mmsi"], "232000001");
    assert_eq!(body["candidateReports"][0]["shipType"], 35);

    // debounced: same sequence, no candidate list unless asked
    let (_, _, again) = get_json(app, "/ais/snapshot").await;
    assert_eq!(again["sequence"], 1);
    assert!(again.get("candidateReports").is_none());
}

#[tokio::test]
async fn test_options_preflight_returns_204() {
    let (app, _) = app_with(&test_settings());
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (app, _) = app_with(&test_settings());
    let (status, _, body) = get_json(app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_rss_parameter_and_allowlist_errors() {
    let (app, _) = app_with(&test_settings());

    let (status, _, body) = get_json(app.clone(), "/rss").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing url parameter");

    let (status, headers, body) =
        get_json(app, "/rss?url=https%3A%2F%2Fevil.example.org%2Ffeed").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("evil.example.org"));
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_rss_follows_redirects_and_echoes_body() {
    let feed = Router::new()
        .route("/old", get(|| async { Redirect::temporary("/mid") }))
        .route("/mid", get(|| async { Redirect::permanent("/feed.xml") }))
        .route(
            "/feed.xml",
            get(|| async { "<rss><channel><title>t</title></channel></rss>" }),
        )
        .route("/loop", get(|| async { Redirect::temporary("/loop") }));
    let addr = spawn_server(feed).await;
    let (app, _) = app_with(&test_settings());

    let uri = format!("/rss?url=http://{}/old", addr);
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=300");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.starts_with(b"<rss>"));

    let (status, _, body) = get_json(app, &format!("/rss?url=http://{}/loop", addr)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Too many redirects");
}

#[tokio::test]
async fn test_opensky_without_credentials_is_503() {
    let (app, _) = app_with(&test_settings());
    let (status, _, body) = get_json(app, "/opensky?lamin=10&lomin=20&lamax=30&lomax=40").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "OpenSky credentials not configured");
}

struct SequenceSource {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenSource for SequenceSource {
    async fn fetch_token(&self) -> Result<AccessToken, ProxyError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken {
            value: if n == 0 { "revoked" } else { "fresh" }.to_string(),
            expires_in: std::time::Duration::from_secs(3600),
        })
    }
}

#[tokio::test]
async fn test_opensky_retries_once_after_401() {
    let api = Router::new().route(
        "/api/states/all",
        get(
            |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth != "Bearer fresh" {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                let lamin = params.get("lamin").cloned().unwrap_or_default();
                format!("{{\"time\":1,\"lamin\":\"{}\",\"states\":[]}}", lamin).into_response()
            },
        ),
    );
    let addr = spawn_server(api).await;

    let mut settings = test_settings();
    settings.opensky.api_url = format!("http://{}/api", addr);
    let source = Arc::new(SequenceSource {
        calls: AtomicUsize::new(0),
    });
    let opensky =
        ais_relay::opensky_proxy::OpenSkyProxy::with_token_source(&settings.opensky, source.clone())
            .unwrap();
    let relay = Arc::new(Relay::new(&settings));
    let feeds = ais_relay::feed_proxy::FeedProxy::new(&settings.rss).unwrap();
    let app = create_router(AppState::new(relay, Arc::new(feeds), Arc::new(opensky)));

    let (status, headers, body) = get_json(app, "/opensky?lamin=10.5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(body["lamin"], "10.5");
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_plain_get_on_websocket_route_is_json_426() {
    let (app, _) = app_with(&test_settings());
    let (status, headers, body) = get_json(app, "/").await;
    assert_eq!(status, StatusCode::UPGRADE_REQUIRED);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("WebSocket upgrade required"));
}

const FEED: &str = "<rss><channel><title>compressed feed</title><item>one</item></channel></rss>";

#[tokio::test]
async fn test_rss_decodes_gzip_and_deflate_bodies() {
    let feed = Router::new()
        .route("/feed.xml", get(|| async { FEED }))
        .layer(CompressionLayer::new());
    let addr = spawn_server(feed).await;

    // the compressing server really does encode when asked
    let raw = reqwest::Client::builder()
        .no_gzip()
        .no_deflate()
        .build()
        .unwrap()
        .get(format!("http://{}/feed.xml", addr))
        .header(reqwest::header::ACCEPT_ENCODING, "gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(raw.headers()[reqwest::header::CONTENT_ENCODING], "gzip");

    let (app, _) = app_with(&test_settings());
    let uri = format!("/rss?url=http://{}/feed.xml", addr);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], FEED.as_bytes());
}

#[tokio::test]
async fn test_rss_upstream_timeout_is_504() {
    let slow = Router::new().route(
        "/slow.xml",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            FEED
        }),
    );
    let addr = spawn_server(slow).await;

    let mut settings = test_settings();
    settings.rss.timeout_secs = 1;
    let (app, _) = app_with(&settings);

    let started = Instant::now();
    let (status, headers, body) =
        get_json(app, &format!("/rss?url=http://{}/slow.xml", addr)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "Upstream request timed out");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_bind_resolves_host_names() {
    let mut settings = test_settings();
    settings.server.host = "localhost".to_string();
    settings.server.port = 0;
    let listener = http::bind(&settings.server).await.unwrap();
    assert!(listener.local_addr().unwrap().ip().is_loopback());
}
