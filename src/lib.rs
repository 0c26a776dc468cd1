//! Flight simulator telemetry bridge.
//!
//! Skybridge polls a running flight simulator over its message channel,
//! decodes aircraft state records, and forwards position reports to a
//! telemetry ingestion service, authenticated through a browser login whose
//! bearer token is cached locally.
//!
//! # Architecture
//!
//! - **Connection**: [`SimConnection`] is the seam to the simulator; the
//!   crate ships [`ReplayConnection`] which plays a recorded flight back
//! - **Schemas**: [`SchemaRegistry`] registers record layouts once per
//!   connection and maps request ids back to them
//! - **Decoding**: [`RecordDecoder`] walks a payload field by field with a
//!   bounds-checked cursor
//! - **Dispatch**: [`DispatchLoop`] classifies messages and routes records to
//!   [`RecordHandler`]s by request id
//! - **Forwarding**: [`TelemetryForwarder`] posts reports with a position fix
//! - **Auth**: [`AuthSession`] obtains and validates the bearer token
//!
//! # Example (replay)
//!
//! ```rust,no_run
//! use skybridge::{
//!     AuthSession, BridgeConfig, DispatchLoop, IngestClient, ReplayConnection, Session,
//!     TelemetryForwarder, TelemetryReport,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> skybridge::Result<()> {
//!     let config = BridgeConfig::load(None)?;
//!     let api = IngestClient::new(&config.api_base_url, config.http_timeout());
//!     let (token, _user) = AuthSession::from_config(&config, api.clone()).authenticate().await?;
//!
//!     let conn = ReplayConnection::open("flight.yaml", &config.app_name)?;
//!     let mut dispatch = DispatchLoop::new(conn, config.poll_interval());
//!     let forwarder = TelemetryForwarder::with_threshold(api, config.position_threshold_deg);
//!     dispatch.add_route(TelemetryReport::schema(), forwarder).await?;
//!
//!     let stats = dispatch.run(&mut Session::new(token), CancellationToken::new()).await?;
//!     println!("{} records", stats.records);
//!     Ok(())
//! }
//! ```

pub mod aircraft;
pub mod api;
pub mod auth;
pub mod config;
pub mod connection;
pub mod decode;
pub mod dispatch;
mod error;
pub mod forward;
pub mod schema;
pub mod session;
pub mod types;

pub use aircraft::AircraftRegistry;
pub use api::{AircraftId, IngestClient, PositionReport, UserInfo};
pub use auth::{AuthSession, AuthState, AuthToken, TokenSource, TokenStore};
pub use config::BridgeConfig;
pub use connection::replay::{Recording, ReplayConnection};
pub use connection::{DispatchStatus, NextDispatch, SimConnection, SimObjectType};
pub use decode::{Record, RecordDecoder};
pub use dispatch::{DispatchLoop, DispatchStats, LoopState, RecordHandler, SimEvent};
pub use error::*;
pub use forward::{ForwardOutcome, TelemetryForwarder};
pub use schema::SchemaRegistry;
pub use session::Session;
pub use types::*;
