//! Skybridge command line entry point

use anyhow::Context;
use clap::Parser;
use skybridge::{
    AuthSession, BridgeConfig, BridgeError, DispatchLoop, IngestClient, ReplayConnection, Session,
    TelemetryForwarder, TelemetryReport,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recorded flight to play back instead of a live simulator
    #[arg(short, long)]
    replay: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if let Some(bridge) = e.downcast_ref::<BridgeError>() {
                for suggestion in bridge.recovery_suggestions() {
                    eprintln!("  - {}", suggestion);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config =
        BridgeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    info!(api = %config.api_base_url, "Starting skybridge {}", env!("CARGO_PKG_VERSION"));

    let api = IngestClient::new(&config.api_base_url, config.http_timeout());
    let (token, user) = AuthSession::from_config(&config, api.clone()).authenticate().await?;
    info!(user = %user.name, email = %user.email, "Signed in");

    let conn = ReplayConnection::open(&args.replay, &config.app_name)?;
    let mut dispatch = DispatchLoop::new(conn, config.poll_interval());
    let forwarder = TelemetryForwarder::with_threshold(api, config.position_threshold_deg);
    dispatch.add_route(TelemetryReport::schema(), forwarder).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                on_signal.cancel();
            }
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });

    let mut session = Session::new(token);
    let stats = dispatch.run(&mut session, cancel).await?;
    info!(
        records = stats.records,
        aircraft = session.aircraft().len(),
        "Shut down cleanly"
    );
    Ok(())
}
