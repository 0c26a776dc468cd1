//! Client for the telemetry ingestion service

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

use crate::{BridgeError, Result};

const USER_ME_PATH: &str = "/api/user/me";
const AIRCRAFT_REGISTER_PATH: &str = "/api/aircraft/register";
const POSITION_PATH: &str = "/api/position";

/// Identity behind a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// Numeric aircraft id assigned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AircraftId(pub i64);

impl fmt::Display for AircraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position sample posted to the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub aircraft_id: AircraftId,
    /// Altitude in feet, truncated
    pub altitude: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f32,
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// HTTP client for the ingestion API.
///
/// Every call carries the bearer token; non-2xx answers become
/// [`BridgeError::Status`], transport failures [`BridgeError::Http`].
#[derive(Clone)]
pub struct IngestClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl IngestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(Client::new(), base_url, timeout)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, timeout }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Resolve the identity behind `token` (`GET /api/user/me`).
    pub async fn who_am_i(&self, token: &str) -> Result<UserInfo> {
        let response = self
            .client
            .get(self.url(USER_ME_PATH))
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::http_error(USER_ME_PATH, e))?;

        let response = check_status(USER_ME_PATH, response)?;
        let user: UserInfo =
            response.json().await.map_err(|e| BridgeError::http_error(USER_ME_PATH, e))?;

        debug!(user_id = user.id, name = %user.name, "Token belongs to user");
        Ok(user)
    }

    /// Register an aircraft by display name and return its id.
    ///
    /// The service answers with the id as a plain-text integer.
    pub async fn register_aircraft(&self, token: &str, name: &str) -> Result<AircraftId> {
        let response = self
            .client
            .get(self.url(AIRCRAFT_REGISTER_PATH))
            .query(&[("name", name)])
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::http_error(AIRCRAFT_REGISTER_PATH, e))?;

        let body = check_status(AIRCRAFT_REGISTER_PATH, response)?
            .text()
            .await
            .map_err(|e| BridgeError::http_error(AIRCRAFT_REGISTER_PATH, e))?;

        let id = body.trim().parse::<i64>().map_err(|e| {
            BridgeError::parse_error("aircraft registration response", format!("'{}': {}", body, e))
        })?;

        debug!(aircraft = name, aircraft_id = id, "Aircraft registered");
        Ok(AircraftId(id))
    }

    /// Post one position sample (`POST /api/position`).
    pub async fn post_position(&self, token: &str, report: &PositionReport) -> Result<()> {
        trace!(?report, "Posting position");

        let response = self
            .client
            .post(self.url(POSITION_PATH))
            .json(report)
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BridgeError::http_error(POSITION_PATH, e))?;

        check_status(POSITION_PATH, response)?;
        Ok(())
    }
}

impl fmt::Debug for IngestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn check_status(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        debug!(endpoint, "Bearer token rejected");
    }
    Err(BridgeError::Status { endpoint: endpoint.to_string(), status: status.as_u16() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> IngestClient {
        IngestClient::new(base_url, Duration::from_secs(5))
    }

    #[test]
    fn position_report_uses_camel_case() {
        let report = PositionReport {
            aircraft_id: AircraftId(7),
            altitude: 1200,
            latitude: 50.4501,
            longitude: 30.5234,
            heading: 90.0,
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["aircraftId"], 7);
        assert_eq!(json["altitude"], 1200);
        assert_eq!(json["timestamp"], 1_700_000_000_000_i64);
        assert!(json.get("aircraft_id").is_none());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = IngestClient::new("http://localhost:8080/", Duration::from_secs(1));
        assert_eq!(client.url(USER_ME_PATH), "http://localhost:8080/api/user/me");
    }

    #[tokio::test]
    async fn who_am_i_sends_bearer_token() {
        let router = Router::new().route(
            USER_ME_PATH,
            get(|headers: HeaderMap| async move {
                let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
                if auth == Some("Bearer abc123") {
                    let user =
                        UserInfo { id: 1, name: "Pilot".into(), email: "p@example.com".into() };
                    Ok(Json(user))
                } else {
                    Err(axum::http::StatusCode::UNAUTHORIZED)
                }
            }),
        );
        let client = client(serve(router).await);

        let user = client.who_am_i("abc123").await.unwrap();
        assert_eq!(user.name, "Pilot");

        let err = client.who_am_i("stale").await.unwrap_err();
        assert!(matches!(err, BridgeError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn register_aircraft_parses_plain_text_id() {
        let router = Router::new().route(
            AIRCRAFT_REGISTER_PATH,
            get(|Query(params): Query<HashMap<String, String>>| async move {
                match params.get("name").map(String::as_str) {
                    Some("Cessna 172 Skyhawk") => "42\n".to_string(),
                    _ => "-1".to_string(),
                }
            }),
        );
        let client = client(serve(router).await);

        let id = client.register_aircraft("t", "Cessna 172 Skyhawk").await.unwrap();
        assert_eq!(id, AircraftId(42));
    }

    #[tokio::test]
    async fn register_aircraft_rejects_non_numeric_body() {
        let router = Router::new().route(AIRCRAFT_REGISTER_PATH, get(|| async { "nope" }));
        let client = client(serve(router).await);

        let err = client.register_aircraft("t", "C172").await.unwrap_err();
        assert!(matches!(err, BridgeError::Parse { .. }));
    }

    #[tokio::test]
    async fn post_position_reports_non_success_status() {
        let router = Router::new().route(
            POSITION_PATH,
            post(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
        );
        let client = client(serve(router).await);
        let report = PositionReport {
            aircraft_id: AircraftId(1),
            altitude: 0,
            latitude: 1.0,
            longitude: 1.0,
            heading: 0.0,
            timestamp: 0,
        };

        let err = client.post_position("t", &report).await.unwrap_err();
        assert!(matches!(err, BridgeError::Status { status: 503, .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{}", addr)).who_am_i("t").await.unwrap_err();
        assert!(matches!(err, BridgeError::Http { .. }));
    }
}
