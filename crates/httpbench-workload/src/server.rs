//! The random-byte benchmark server.
//!
//! Serves `GET /{len}` with `len` random bytes, so the response size
//! of every benchmark request is chosen by the client through the
//! request path.

use std::net::SocketAddr;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rand::RngCore;
use tokio::net::TcpListener;
use tracing::info;

/// Builds the benchmark router.
pub fn router() -> Router {
    Router::new().route("/{len}", get(random_bytes))
}

async fn random_bytes(Path(len): Path<String>) -> Response {
    match len.parse::<usize>() {
        Ok(len) => {
            let mut body = vec![0u8; len];
            rand::thread_rng().fill_bytes(&mut body);
            body.into_response()
        }
        Err(_) => (
            StatusCode::BAD_REQUEST,
            format!("unable to convert requested value {len} into a valid amount of bytes"),
        )
            .into_response(),
    }
}

/// Binds `addr` and serves the benchmark router until the process
/// exits.
pub async fn serve(addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, router()).await
}

/// Serves the router on `addr` in a background task, returning the
/// bound address and a guard that stops the server when dropped.
pub async fn spawn(addr: &str) -> std::io::Result<(SocketAddr, ServerGuard)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router()).await {
            tracing::error!(error = %error, "server task failed");
        }
    });
    Ok((local, ServerGuard { handle }))
}

/// Aborts the background server task on drop.
#[derive(Debug)]
pub struct ServerGuard {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
