//! Local stand-in for the hosting provider.
//!
//! Implements the same JSON contract as the real service with in-memory
//! state held by an injected [`MockStore`]. New machines and disks can be
//! kept hidden for a configurable number of reads so the correlation engine's
//! polling is exercised end to end.

mod routes;
mod store;

use std::io;
use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use store::{MockError, MockSettings, MockStore};

/// Builds the router with credential checks applied to every route.
#[must_use]
pub fn router(store: MockStore) -> Router {
    routes::routes()
        .layer(middleware::from_fn_with_state(
            store.clone(),
            routes::require_caller,
        ))
        .with_state(store)
}

/// Serves the mock provider on `listener` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an I/O error when the listener fails.
pub async fn serve(
    listener: TcpListener,
    store: MockStore,
    shutdown: CancellationToken,
) -> io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "mock provider listening");
    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("mock provider shutting down");
        })
        .await
}

/// A mock provider running on a background task.
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<io::Result<()>>,
}

impl MockServer {
    /// Binds `addr` (use port 0 for an ephemeral port) and starts serving.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the address cannot be bound.
    pub async fn start(addr: SocketAddr, store: MockStore) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, store, shutdown.clone()));
        Ok(Self {
            addr: bound,
            shutdown,
            handle,
        })
    }

    /// Address the server is bound to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL suitable for the HTTP client.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stops the server and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns the server's I/O error, or an error if the task panicked.
    pub async fn stop(self) -> io::Result<()> {
        self.shutdown.cancel();
        self.handle.await.map_err(io::Error::other)?
    }
}

#[cfg(test)]
mod tests;
