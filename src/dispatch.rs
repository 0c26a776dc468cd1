//! Dispatch loop that polls the simulator connection and routes records
//!
//! One task owns the connection and the [`Session`]. Each cycle pulls at most
//! one frame, classifies it, and for simulation-object data looks up the
//! route registered under the message's request id, decodes the payload with
//! the schema the registry holds for that id and hands the record to the
//! route's handler. Data requests are single-shot, so every answered route
//! is re-requested.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::connection::{NextDispatch, SimConnection, SimObjectType};
use crate::decode::{Record, RecordDecoder};
use crate::schema::SchemaRegistry;
use crate::session::Session;
use crate::types::{DefineId, DispatchMessage, RecordSchema, RequestId, SimObjectData};
use crate::{BridgeError, Result};

/// Upper bound on frames pulled while draining on shutdown.
pub const DEFAULT_MAX_DRAIN: usize = 64;

/// Consumer of decoded records for one route.
#[async_trait]
pub trait RecordHandler: Send {
    /// Handle one record.
    ///
    /// Errors with [`Severity::Fatal`](crate::Severity::Fatal) stop the loop;
    /// soft errors are logged and the loop moves on.
    async fn handle(&mut self, record: Record, session: &mut Session) -> Result<()>;
}

/// System events the bridge subscribes to, by client event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    SimStart,
    SimStop,
    Paused,
    Unpaused,
}

impl SimEvent {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(SimEvent::SimStart),
            1 => Some(SimEvent::SimStop),
            2 => Some(SimEvent::Paused),
            3 => Some(SimEvent::Unpaused),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        self as u32
    }
}

/// Loop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Normal operation: poll, sleep, re-request answered routes
    Polling,
    /// Shutdown: empty the queue without issuing new requests
    Draining,
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frames parsed successfully
    pub messages: u64,
    /// Frames that could not be parsed
    pub malformed: u64,
    /// Records decoded and handed to a handler
    pub records: u64,
    /// Data messages whose request id has no route
    pub unrouted: u64,
    /// Payloads that did not decode against their schema
    pub decode_failures: u64,
    /// Soft errors returned by handlers
    pub handler_failures: u64,
    pub exceptions: u64,
    pub events: u64,
    /// Messages of a kind the loop does not handle
    pub unknown: u64,
}

struct Route {
    define_id: DefineId,
    target: SimObjectType,
    handler: Box<dyn RecordHandler>,
}

/// Polls a [`SimConnection`] and routes its messages.
pub struct DispatchLoop<C> {
    conn: C,
    registry: SchemaRegistry,
    routes: HashMap<RequestId, Route>,
    poll_interval: Duration,
    max_drain: usize,
    state: LoopState,
    stats: DispatchStats,
}

impl<C> DispatchLoop<C>
where
    C: SimConnection,
{
    pub fn new(conn: C, poll_interval: Duration) -> Self {
        Self {
            conn,
            registry: SchemaRegistry::new(),
            routes: HashMap::new(),
            poll_interval,
            max_drain: DEFAULT_MAX_DRAIN,
            state: LoopState::Polling,
            stats: DispatchStats::default(),
        }
    }

    /// Limit how many frames are pulled while draining.
    pub fn with_max_drain(mut self, max_drain: usize) -> Self {
        self.max_drain = max_drain;
        self
    }

    /// Register `schema` and route its records to `handler`.
    ///
    /// The route polls the user aircraft; its request id equals the define id.
    /// A schema can carry one route only.
    pub async fn add_route<H>(&mut self, schema: Arc<RecordSchema>, handler: H) -> Result<RequestId>
    where
        H: RecordHandler + 'static,
    {
        let define_id = self.registry.register(&mut self.conn, Arc::clone(&schema)).await?;
        let request_id = RequestId::from(define_id);

        if self.routes.contains_key(&request_id) {
            return Err(BridgeError::schema_error(format!(
                "'{}' already has a route",
                schema.name()
            )));
        }

        debug!(request_id = %request_id, schema = schema.name(), "Route added");
        let route = Route { define_id, target: SimObjectType::User, handler: Box::new(handler) };
        self.routes.insert(request_id, route);
        Ok(request_id)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Issue the first request for every route, then poll until cancelled.
    ///
    /// On cancellation the queue is drained, the connection closed, and the
    /// counters returned. A connection failure or fatal handler error, in
    /// either phase, is returned after closing the connection.
    pub async fn run(
        &mut self,
        session: &mut Session,
        cancel: CancellationToken,
    ) -> Result<DispatchStats> {
        info!(
            routes = self.routes.len(),
            poll_interval = ?self.poll_interval,
            "Dispatch loop started"
        );
        self.state = LoopState::Polling;

        let result = match self.request_all().await {
            Ok(()) => self.poll(session, &cancel).await,
            Err(e) => Err(e),
        };
        let result = match result {
            Ok(()) => self.drain(session).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!(error = %e, state = ?self.state, "Dispatch loop stopped");
            if let Err(close_err) = self.conn.close().await {
                warn!(error = %close_err, "Failed to close connection");
            }
            return Err(e);
        }

        self.conn.close().await?;

        info!(
            messages = self.stats.messages,
            records = self.stats.records,
            unrouted = self.stats.unrouted,
            decode_failures = self.stats.decode_failures,
            "Dispatch loop ended"
        );
        Ok(self.stats)
    }

    async fn request_all(&mut self) -> Result<()> {
        let requests: Vec<_> = self
            .routes
            .iter()
            .map(|(request_id, route)| (*request_id, route.define_id, route.target))
            .collect();

        for (request_id, define_id, target) in requests {
            self.conn.request_data(request_id, define_id, target).await?;
        }
        Ok(())
    }

    /// `next_message` is always awaited to completion so a dequeued frame is
    /// never lost; cancellation is seen at the top of the cycle or during the
    /// sleep.
    async fn poll(&mut self, session: &mut Session, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                info!("Dispatch loop cancelled");
                return Ok(());
            }

            match self.conn.next_message().await? {
                NextDispatch::Message(frame) => self.handle_frame(&frame, session).await?,
                NextDispatch::Empty => trace!("No message queued"),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Dispatch loop cancelled during sleep");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn drain(&mut self, session: &mut Session) -> Result<()> {
        self.state = LoopState::Draining;
        debug!(max_drain = self.max_drain, "Draining connection");

        for _ in 0..self.max_drain {
            match self.conn.next_message().await {
                Ok(NextDispatch::Message(frame)) => self.handle_frame(&frame, session).await?,
                Ok(NextDispatch::Empty) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "Connection failed while draining");
                    return Ok(());
                }
            }
        }

        warn!(max_drain = self.max_drain, "Drain limit reached with messages still queued");
        Ok(())
    }

    async fn handle_frame(&mut self, frame: &[u8], session: &mut Session) -> Result<()> {
        let message = match DispatchMessage::parse(frame) {
            Ok(message) => message,
            Err(e) => {
                self.stats.malformed += 1;
                warn!(error = %e, len = frame.len(), "Dropping malformed frame");
                return Ok(());
            }
        };

        self.stats.messages += 1;
        trace!(kind = ?message.kind(), "Dispatch message");

        match message {
            DispatchMessage::Open(open) => {
                info!(
                    application = %open.application_name,
                    version =
                        %format!("{}.{}", open.simconnect_version.0, open.simconnect_version.1),
                    "Connected to simulator"
                );
            }
            DispatchMessage::Exception { code, send_id, index } => {
                self.stats.exceptions += 1;
                warn!(code, send_id, index, "Simulator reported an exception");
            }
            DispatchMessage::Event { event_id, data, .. } => {
                self.stats.events += 1;
                match SimEvent::from_id(event_id) {
                    Some(event) => info!(?event, data, "Simulator event"),
                    None => debug!(event_id, "Ignoring unrecognized event"),
                }
            }
            DispatchMessage::SimObjectData(data) => self.handle_data(data, session).await?,
            DispatchMessage::Unknown { id } => {
                self.stats.unknown += 1;
                debug!(id, "Ignoring message of unknown kind");
            }
        }

        Ok(())
    }

    async fn handle_data(&mut self, data: SimObjectData, session: &mut Session) -> Result<()> {
        let (Some(route), Some(schema)) =
            (self.routes.get_mut(&data.request_id), self.registry.lookup(data.request_id))
        else {
            self.stats.unrouted += 1;
            warn!(request_id = %data.request_id, "Dropping data for unregistered request");
            return Ok(());
        };

        match RecordDecoder::decode(&data.payload, schema) {
            Ok(record) => {
                self.stats.records += 1;
                if let Err(e) = route.handler.handle(record, session).await {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    self.stats.handler_failures += 1;
                    warn!(request_id = %data.request_id, error = %e, "Record handler failed");
                }
            }
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!(
                    request_id = %data.request_id,
                    schema = schema.name(),
                    error = %e,
                    "Failed to decode record"
                );
            }
        }

        if self.state == LoopState::Polling {
            let (define_id, target) = (route.define_id, route.target);
            self.conn.request_data(data.request_id, define_id, target).await?;
        }
        Ok(())
    }
}
