//! Full run against in-process stand-ins for the identity provider, the
//! ingestion API and the simulator.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use skybridge::auth::BrowserLauncher;
use skybridge::{
    AuthSession, AuthToken, BridgeConfig, BridgeError, DispatchLoop, IngestClient, PositionReport,
    Recording, ReplayConnection, Session, TelemetryForwarder, TelemetryReport, TokenSource,
    UserInfo,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "abc123";

const FLIGHT: &str = r#"
application_name: "Test Sim"
loop_recording: true
events: [0]
snapshots:
  - title: "Cessna 172 Skyhawk"
  - title: "Cessna 172 Skyhawk"
    latitude: 50.4501
    longitude: 30.5234
    altitude: 1500
    heading: 270
  - title: "Cessna 172 Skyhawk"
    latitude: 50.4512
    longitude: 30.5301
    altitude: 1550
    heading: 271
"#;

const ONE_SNAPSHOT: &str = r#"
snapshots:
  - title: "Cessna 172 Skyhawk"
    latitude: 50.4501
    longitude: 30.5234
"#;

#[derive(Clone, Default)]
struct Ingest {
    registrations: Arc<AtomicUsize>,
    positions: Arc<Mutex<Vec<PositionReport>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer abc123")
}

async fn ingest_service(ingest: Ingest) -> String {
    let router = Router::new()
        .route(
            "/api/user/me",
            get(|headers: HeaderMap| async move {
                if authorized(&headers) {
                    let user =
                        UserInfo { id: 1, name: "Pilot".into(), email: "pilot@example.com".into() };
                    Ok(Json(user))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        )
        .route(
            "/api/aircraft/register",
            get(
                |State(ingest): State<Ingest>,
                 headers: HeaderMap,
                 Query(params): Query<HashMap<String, String>>| async move {
                    ingest.registrations.fetch_add(1, Ordering::SeqCst);
                    match params.get("name") {
                        Some(_) if authorized(&headers) => Ok("7".to_string()),
                        _ => Err(StatusCode::UNAUTHORIZED),
                    }
                },
            ),
        )
        .route(
            "/api/position",
            post(
                |State(ingest): State<Ingest>,
                 headers: HeaderMap,
                 Json(report): Json<PositionReport>| async move {
                    if !authorized(&headers) {
                        return StatusCode::UNAUTHORIZED;
                    }
                    ingest.positions.lock().unwrap().push(report);
                    StatusCode::CREATED
                },
            ),
        )
        .with_state(ingest);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Plays the identity provider: follows the redirect with a fixed token.
struct RedirectingBrowser;

impl BrowserLauncher for RedirectingBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        let url = reqwest::Url::parse(url).unwrap();
        let redirect = url
            .query_pairs()
            .find(|(k, _)| k == "redirect_uri")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        tokio::spawn(async move {
            reqwest::get(format!("{}?token={}", redirect, TOKEN)).await.unwrap();
        });
        Ok(())
    }
}

#[tokio::test]
async fn interactive_login_then_forward_replayed_flight() {
    let ingest = Ingest::default();
    let dir = tempfile::tempdir().unwrap();
    let config = BridgeConfig {
        api_base_url: ingest_service(ingest.clone()).await,
        token_file: dir.path().join("token.jwt"),
        callback_port: 0,
        redirect_timeout_secs: Some(10),
        poll_interval_ms: 1,
        ..Default::default()
    };
    let api = IngestClient::new(&config.api_base_url, config.http_timeout());

    // no token file yet: the browser flow runs and the token gets cached
    let mut auth = AuthSession::with_browser(&config, api.clone(), RedirectingBrowser);
    let (token, user) = auth.authenticate().await.unwrap();
    assert_eq!(token.value(), TOKEN);
    assert_eq!(user.name, "Pilot");
    assert_eq!(std::fs::read_to_string(&config.token_file).unwrap(), TOKEN);

    // second start picks up the cached token
    let mut auth = AuthSession::with_browser(&config, api.clone(), RedirectingBrowser);
    let (cached, _) = auth.authenticate().await.unwrap();
    assert_eq!(cached.source(), TokenSource::Cached);

    let conn = ReplayConnection::connect(Recording::from_yaml(FLIGHT).unwrap(), &config.app_name)
        .unwrap();
    let mut dispatch = DispatchLoop::new(conn, config.poll_interval());
    let forwarder = TelemetryForwarder::with_threshold(api, config.position_threshold_deg);
    dispatch.add_route(TelemetryReport::schema(), forwarder).await.unwrap();

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        let positions = Arc::clone(&ingest.positions);
        tokio::spawn(async move {
            while positions.lock().unwrap().len() < 4 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            cancel.cancel();
        })
    };

    let mut session = Session::new(cached);
    let stats = tokio::time::timeout(Duration::from_secs(10), dispatch.run(&mut session, cancel))
        .await
        .expect("dispatch loop did not stop")
        .unwrap();
    watcher.await.unwrap();

    assert!(stats.records >= 6);
    assert_eq!(stats.events, 1);
    assert_eq!(stats.unrouted, 0);
    assert_eq!(ingest.registrations.load(Ordering::SeqCst), 1);

    let positions = ingest.positions.lock().unwrap();
    assert!(positions.iter().all(|p| p.aircraft_id.0 == 7));
    assert!(positions.iter().all(|p| p.latitude.abs() > 0.1 || p.longitude.abs() > 0.1));
    assert_eq!(positions[0].latitude, 50.4501);
    assert_eq!(positions[0].altitude, 1500);
    assert_eq!(positions[0].heading, 270.0);
}

#[tokio::test]
async fn exhausted_simulator_is_fatal() {
    let ingest = Ingest::default();
    let api = IngestClient::new(ingest_service(ingest.clone()).await, Duration::from_secs(5));
    let recording = Recording::from_yaml(ONE_SNAPSHOT).unwrap();

    let conn = ReplayConnection::connect(recording, "Request Data").unwrap();
    let mut dispatch = DispatchLoop::new(conn, Duration::from_millis(1));
    dispatch.add_route(TelemetryReport::schema(), TelemetryForwarder::new(api)).await.unwrap();

    let mut session = Session::new(AuthToken::new(TOKEN, TokenSource::Cached));
    let err = dispatch.run(&mut session, CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, BridgeError::Connection { .. }));
    assert!(err.is_fatal());
    assert_eq!(ingest.positions.lock().unwrap().len(), 1);
}
