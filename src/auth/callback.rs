//! Loopback HTTP listener that receives the OAuth redirect

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::{BridgeError, Result};

/// Path the identity provider redirects to.
pub const CALLBACK_PATH: &str = "/oauth2/callback";

const SUCCESS_PAGE: &str = "<h1><strong>Success!</strong></h1>\
<p>You are authenticated. You can close this window now and return to the CLI.</p>";
const MISSING_TOKEN_PAGE: &str = "<h1>Missing token</h1><p>The redirect carried no token.</p>";

#[derive(Debug, Deserialize)]
struct CallbackParams {
    token: Option<String>,
}

/// Sender side of the hand-off; taken by the first request carrying a token.
#[derive(Clone)]
struct CallbackState {
    sender: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(token) = params.token.filter(|t| !t.is_empty()) else {
        debug!("Callback request without token");
        return (StatusCode::BAD_REQUEST, Html(MISSING_TOKEN_PAGE)).into_response();
    };

    let sender = state.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    match sender {
        Some(sender) => {
            info!("Token received on loopback callback");
            let _ = sender.send(token);
        }
        None => debug!("Token already captured, ignoring repeat redirect"),
    }

    Html(SUCCESS_PAGE).into_response()
}

/// Serve `router` on every bound listener until `cancel` fires and in-flight
/// requests finish.
async fn serve(
    v4: TcpListener,
    v6: Option<TcpListener>,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let (v4_router, signal) = (router.clone(), cancel.clone());
    let serve_v4 = async move {
        axum::serve(v4, v4_router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
    };

    match v6 {
        Some(v6) => {
            let serve_v6 = async move {
                axum::serve(v6, router)
                    .with_graceful_shutdown(async move { cancel.cancelled().await })
                    .await
            };
            tokio::try_join!(serve_v4, serve_v6).map(|_| ())
        }
        None => serve_v4.await,
    }
}

/// Single-use loopback listener for the login redirect.
pub struct CallbackListener {
    port: u16,
    token_rx: oneshot::Receiver<String>,
    server: JoinHandle<std::io::Result<()>>,
    shutdown: DropGuard,
}

impl CallbackListener {
    /// Bind the loopback port and start serving; port 0 picks a free port.
    ///
    /// `127.0.0.1` must bind. `::1` is bound on the same port when the host
    /// has IPv6, so `localhost` reaches the listener whichever family the
    /// browser resolves it to.
    pub async fn bind(port: u16) -> Result<Self> {
        let v4 = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.map_err(|e| {
            BridgeError::Listener { context: format!("cannot bind port {}", port), source: e }
        })?;
        let port = v4
            .local_addr()
            .map_err(|e| BridgeError::Listener { context: "local address".into(), source: e })?
            .port();
        let v6 = match TcpListener::bind((Ipv6Addr::LOCALHOST, port)).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!(port, error = %e, "IPv6 loopback unavailable, serving IPv4 only");
                None
            }
        };

        let v6_bound = v6.is_some();
        let (tx, token_rx) = oneshot::channel();
        let state = CallbackState { sender: Arc::new(Mutex::new(Some(tx))) };
        let router = Router::new()
            .route("/", get(callback))
            .route(CALLBACK_PATH, get(callback))
            .with_state(state);

        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(v4, v6, router, cancel.clone()));

        info!(port, dual_stack = v6_bound, "Loopback listener up");
        Ok(Self { port, token_rx, server, shutdown: cancel.drop_guard() })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL the identity provider should redirect to.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.port, CALLBACK_PATH)
    }

    /// Wait for the first redirect carrying a token.
    pub async fn wait_for_token(&mut self, timeout: Option<Duration>) -> Result<String> {
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, &mut self.token_rx)
                .await
                .map_err(|_| BridgeError::timeout("waiting for login redirect", limit))?,
            None => (&mut self.token_rx).await,
        };

        received.map_err(|_| BridgeError::auth_failed("listener stopped before a token arrived"))
    }

    /// Stop accepting requests and wait for in-flight ones, within `grace`.
    ///
    /// Past `grace` the server task is aborted and a fatal timeout returned.
    pub async fn shutdown(self, grace: Duration) -> Result<()> {
        let Self { server, shutdown, port, .. } = self;
        let abort = server.abort_handle();
        drop(shutdown);

        match tokio::time::timeout(grace, server).await {
            Ok(Ok(Ok(()))) => {
                debug!(port, "Loopback listener stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(BridgeError::Listener { context: "serve".into(), source: e }),
            Ok(Err(e)) => Err(BridgeError::Listener {
                context: "listener task".into(),
                source: std::io::Error::other(e),
            }),
            Err(_) => {
                abort.abort();
                Err(BridgeError::timeout("loopback listener shutdown", grace))
            }
        }
    }
}
