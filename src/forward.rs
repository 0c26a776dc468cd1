//! Forwarding policy for aircraft position reports

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::{IngestClient, PositionReport};
use crate::decode::Record;
use crate::dispatch::RecordHandler;
use crate::session::Session;
use crate::types::TelemetryReport;
use crate::Result;

/// Default distance from 0/0, in degrees, below which a report is held back.
pub const DEFAULT_POSITION_THRESHOLD_DEG: f64 = 0.1;

/// What happened to one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// No position fix yet; nothing sent
    Skipped,
    Sent,
    /// The service was unreachable or rejected the post; the report is lost
    Dropped,
}

/// Posts telemetry reports that carry a real position.
#[derive(Debug, Clone)]
pub struct TelemetryForwarder {
    api: IngestClient,
    threshold_deg: f64,
    sent: u64,
    dropped: u64,
}

impl TelemetryForwarder {
    pub fn new(api: IngestClient) -> Self {
        Self::with_threshold(api, DEFAULT_POSITION_THRESHOLD_DEG)
    }

    pub fn with_threshold(api: IngestClient, threshold_deg: f64) -> Self {
        Self { api, threshold_deg, sent: 0, dropped: 0 }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Forward `report` if it has a position fix.
    ///
    /// Failing to post drops the report. Failing to resolve the aircraft id
    /// is returned as an error since nothing can be attributed without it.
    pub async fn maybe_forward(
        &mut self,
        report: &TelemetryReport,
        session: &mut Session,
    ) -> Result<ForwardOutcome> {
        debug!(
            title = %report.title,
            latitude = report.latitude,
            longitude = report.longitude,
            altitude = report.altitude,
            "Telemetry report"
        );

        if !report.has_position_fix(self.threshold_deg) {
            return Ok(ForwardOutcome::Skipped);
        }

        let (token, aircraft) = session.parts_mut();
        let aircraft_id = aircraft.resolve(&self.api, token.value(), &report.title).await?;

        let position = PositionReport {
            aircraft_id,
            altitude: report.altitude as i32,
            latitude: report.latitude,
            longitude: report.longitude,
            heading: report.heading as f32,
            timestamp: Utc::now().timestamp_millis(),
        };

        match self.api.post_position(token.value(), &position).await {
            Ok(()) => {
                self.sent += 1;
                if self.sent == 1 {
                    info!(aircraft_id = %aircraft_id, "First position forwarded");
                }
                Ok(ForwardOutcome::Sent)
            }
            Err(e) => {
                self.dropped += 1;
                warn!(aircraft_id = %aircraft_id, error = %e, "Position dropped");
                Ok(ForwardOutcome::Dropped)
            }
        }
    }
}

#[async_trait]
impl RecordHandler for TelemetryForwarder {
    async fn handle(&mut self, record: Record, session: &mut Session) -> Result<()> {
        let report = TelemetryReport::from_record(&record)?;
        self.maybe_forward(&report, session).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthToken, TokenSource};
    use crate::BridgeError;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Ingest {
        posted: Arc<Mutex<Vec<PositionReport>>>,
        position_status: Arc<Mutex<Option<StatusCode>>>,
    }

    async fn ingest_service(ingest: Ingest, register_body: &'static str) -> IngestClient {
        let router = Router::new()
            .route("/api/aircraft/register", get(move || async move { register_body }))
            .route(
                "/api/position",
                post(|State(ingest): State<Ingest>, Json(report): Json<PositionReport>| async move {
                    ingest.posted.lock().unwrap().push(report);
                    let status = *ingest.position_status.lock().unwrap();
                    status.unwrap_or(StatusCode::OK)
                }),
            )
            .with_state(ingest);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        IngestClient::new(format!("http://{}", addr), Duration::from_secs(5))
    }

    fn session() -> Session {
        Session::new(AuthToken::new("abc123", TokenSource::Cached))
    }

    fn report(latitude: f64, longitude: f64) -> TelemetryReport {
        TelemetryReport {
            title: "Cessna 172".into(),
            altitude: 1234.9,
            latitude,
            longitude,
            heading: 87.5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn zero_position_is_never_sent() {
        let ingest = Ingest::default();
        let mut forwarder = TelemetryForwarder::new(ingest_service(ingest.clone(), "7").await);
        let mut session = session();

        let outcome = forwarder.maybe_forward(&report(0.0, 0.0), &mut session).await.unwrap();
        assert_eq!(outcome, ForwardOutcome::Skipped);

        let outcome = forwarder.maybe_forward(&report(0.05, -0.05), &mut session).await.unwrap();
        assert_eq!(outcome, ForwardOutcome::Skipped);

        assert!(ingest.posted.lock().unwrap().is_empty());
        assert!(session.aircraft().is_empty());
    }

    #[tokio::test]
    async fn real_position_is_posted_with_resolved_id() {
        let ingest = Ingest::default();
        let mut forwarder = TelemetryForwarder::new(ingest_service(ingest.clone(), "7").await);
        let before = Utc::now().timestamp_millis();

        let outcome =
            forwarder.maybe_forward(&report(50.4501, 30.5234), &mut session()).await.unwrap();

        assert_eq!(outcome, ForwardOutcome::Sent);
        let posted = ingest.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].aircraft_id.0, 7);
        assert_eq!(posted[0].altitude, 1234);
        assert_eq!(posted[0].latitude, 50.4501);
        assert_eq!(posted[0].longitude, 30.5234);
        assert_eq!(posted[0].heading, 87.5);
        assert!(posted[0].timestamp >= before);
        assert!(posted[0].timestamp <= Utc::now().timestamp_millis());
    }

    #[tokio::test]
    async fn southern_western_positions_pass_the_filter() {
        let ingest = Ingest::default();
        let mut forwarder = TelemetryForwarder::new(ingest_service(ingest.clone(), "7").await);

        let outcome = forwarder.maybe_forward(&report(-33.9, -70.6), &mut session()).await.unwrap();
        assert_eq!(outcome, ForwardOutcome::Sent);
    }

    #[tokio::test]
    async fn rejected_post_is_dropped() {
        let ingest = Ingest::default();
        *ingest.position_status.lock().unwrap() = Some(StatusCode::INTERNAL_SERVER_ERROR);
        let mut forwarder = TelemetryForwarder::new(ingest_service(ingest.clone(), "7").await);

        let outcome =
            forwarder.maybe_forward(&report(50.4501, 30.5234), &mut session()).await.unwrap();

        assert_eq!(outcome, ForwardOutcome::Dropped);
        assert_eq!(forwarder.dropped(), 1);
        assert_eq!(forwarder.sent(), 0);
    }

    #[tokio::test]
    async fn unresolvable_aircraft_is_an_error() {
        let ingest = Ingest::default();
        let mut forwarder = TelemetryForwarder::new(ingest_service(ingest.clone(), "-1").await);

        let err =
            forwarder.maybe_forward(&report(50.4501, 30.5234), &mut session()).await.unwrap_err();

        assert!(matches!(err, BridgeError::AircraftUnresolved { .. }));
        assert!(ingest.posted.lock().unwrap().is_empty());
    }
}
