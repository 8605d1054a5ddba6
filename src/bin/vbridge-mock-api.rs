//! Local mock of the hosting provider for manual testing.
//!
//! Serves the provider's JSON contract from memory until interrupted.

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use vbridge::mock_api::{self, MockSettings, MockStore};
use vbridge::telemetry::init_tracing;

#[derive(Debug, Parser)]
#[command(
    name = "vbridge-mock-api",
    about = "Serve an in-memory stand-in for the hosting provider API"
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8087")]
    bind: SocketAddr,
    /// Bearer credential clients must present.
    #[arg(long, env = "VBRIDGE_API_KEY")]
    api_key: String,
    /// Caller identity clients must present in `x-mcs-user`.
    #[arg(long, env = "VBRIDGE_USER_EMAIL")]
    user_email: String,
    /// Listing calls for which a new machine stays hidden.
    #[arg(long, default_value_t = 1)]
    listing_delay: u32,
    /// Detail reads for which a new disk stays hidden.
    #[arg(long, default_value_t = 1)]
    disk_delay: u32,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing("vbridge=info");
    let cli = Cli::parse();
    let settings = MockSettings::new(cli.api_key, cli.user_email)
        .with_listing_delay(cli.listing_delay)
        .with_disk_delay(cli.disk_delay);

    let listener = TcpListener::bind(cli.bind)
        .await
        .map_err(|err| format!("failed to bind {}: {err}", cli.bind))?;
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => trigger.cancel(),
            Err(err) => warn!(error = %err, "failed to listen for interrupt"),
        }
    });

    mock_api::serve(listener, MockStore::new(settings), shutdown)
        .await
        .map_err(|err| err.to_string())
}
