//! Browser-mediated authentication
//!
//! The bridge needs a bearer token the ingestion service accepts. A cached
//! token from the token file is tried first; if it is missing or rejected,
//! a loopback listener is started, the login page is opened in the browser,
//! and the identity provider redirects back to the listener with a fresh
//! token. A fresh token is only persisted after the service accepted it.
//!
//! ```text
//! NoToken ──cached──▶ Verifying ──200──▶ Verified
//!    │                    │
//!    └──none──┐           └──rejected──┐
//!             ▼                        ▼
//!       NeedsInteractive ◀─────────────┘
//!             │ listener bound, browser opened
//!             ▼
//!        ListenerUp ──redirect──▶ HaveToken ──▶ Verifying ──200──▶ Verified
//!                                                    │
//!                                                    └──rejected──▶ Failed
//! ```

mod browser;
mod callback;
mod token_store;

pub use browser::{BrowserLauncher, SystemBrowser};
pub use callback::{CALLBACK_PATH, CallbackListener};
pub use token_store::TokenStore;

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{IngestClient, UserInfo};
use crate::config::BridgeConfig;
use crate::{BridgeError, Result};

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Read from the token file
    Cached,
    /// Delivered by the login redirect during this run
    Issued,
}

/// Bearer token for the ingestion service.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    value: String,
    source: TokenSource,
}

impl AuthToken {
    pub fn new(value: impl Into<String>, source: TokenSource) -> Self {
        Self { value: value.into(), source }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> TokenSource {
        self.source
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Authentication progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoToken,
    Verifying(TokenSource),
    NeedsInteractive,
    ListenerUp,
    HaveToken,
    Verified,
    Failed,
}

/// Drives the authentication flow for one run.
pub struct AuthSession<B = SystemBrowser> {
    api: IngestClient,
    store: TokenStore,
    browser: B,
    login_url: String,
    callback_port: u16,
    redirect_timeout: Option<Duration>,
    shutdown_timeout: Duration,
    state: AuthState,
}

impl AuthSession<SystemBrowser> {
    pub fn from_config(config: &BridgeConfig, api: IngestClient) -> Self {
        Self::with_browser(config, api, SystemBrowser)
    }
}

impl<B> AuthSession<B>
where
    B: BrowserLauncher,
{
    pub fn with_browser(config: &BridgeConfig, api: IngestClient, browser: B) -> Self {
        Self {
            api,
            store: TokenStore::new(&config.token_file),
            browser,
            login_url: config.login_url.clone(),
            callback_port: config.callback_port,
            redirect_timeout: config.redirect_timeout(),
            shutdown_timeout: config.listener_shutdown_timeout(),
            state: AuthState::NoToken,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Obtain a token the ingestion service accepts.
    pub async fn authenticate(&mut self) -> Result<(AuthToken, UserInfo)> {
        self.transition(AuthState::NoToken);

        let cached = self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Cannot read token file, ignoring it");
            None
        });

        if let Some(value) = cached {
            let token = AuthToken::new(value, TokenSource::Cached);
            self.transition(AuthState::Verifying(TokenSource::Cached));
            match self.api.who_am_i(token.value()).await {
                Ok(user) => {
                    self.transition(AuthState::Verified);
                    info!(user = %user.name, "Authenticated with cached token");
                    return Ok((token, user));
                }
                Err(e) => info!(error = %e, "Cached token rejected, requesting authentication"),
            }
        }

        self.transition(AuthState::NeedsInteractive);
        let token = self.interactive().await?;

        self.transition(AuthState::Verifying(TokenSource::Issued));
        match self.api.who_am_i(token.value()).await {
            Ok(user) => {
                if let Err(e) = self.store.save(token.value()) {
                    warn!(error = %e, "Token accepted but could not be cached");
                }
                self.transition(AuthState::Verified);
                info!(user = %user.name, "Authenticated");
                Ok((token, user))
            }
            Err(e) => {
                self.transition(AuthState::Failed);
                Err(BridgeError::auth_failed(format!("issued token was rejected: {}", e)))
            }
        }
    }

    async fn interactive(&mut self) -> Result<AuthToken> {
        let mut listener = CallbackListener::bind(self.callback_port).await?;
        let login = login_url(&self.login_url, &listener.redirect_uri())?;

        info!("You will now be taken to your browser for authentication");
        if let Err(e) = self.browser.open(&login) {
            warn!(error = %e, url = %login, "Could not open a browser, open the URL manually");
        }
        self.transition(AuthState::ListenerUp);

        let received = listener.wait_for_token(self.redirect_timeout).await;
        let stopped = listener.shutdown(self.shutdown_timeout).await;
        let value = received?;
        stopped?;

        self.transition(AuthState::HaveToken);
        Ok(AuthToken::new(value, TokenSource::Issued))
    }

    fn transition(&mut self, next: AuthState) {
        debug!(from = ?self.state, to = ?next, "Auth state");
        self.state = next;
    }
}

/// Login page URL with the loopback redirect attached.
pub fn login_url(base: &str, redirect_uri: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| BridgeError::config_error(format!("login_url '{}': {}", base, e)))?;
    url.query_pairs_mut().append_pair("redirect_uri", redirect_uri);
    Ok(url.into())
}
