//! HTTP transport for the orchestrator and its agents.
//!
//! The server exposes the orchestrator's operations to users and workers;
//! the client lets a remote agent use them as a [`TaskSource`].
//!
//! [`TaskSource`]: crate::orchestration::TaskSource

mod api;
mod client;
mod router;

pub use api::{
    ApiError, CalculateRequest, CalculateResponse, ErrorResponse, ExpressionResponse,
    ExpressionsResponse, StatusResponse, TaskResponse,
};
pub use client::HttpTaskSource;
pub use router::build_router;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::orchestration::Orchestrator;
use crate::{alog, alog_warn, Result};

/// Bind `addr` and serve until `cancel` fires.
pub async fn serve(addr: &str, orchestrator: Arc<Orchestrator>, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, orchestrator, cancel).await
}

/// Serve on an already bound listener until `cancel` fires.
///
/// When the orchestrator has a task lease, a sweep returning expired tasks
/// to the queue runs alongside the server.
pub async fn serve_on(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    cancel: CancellationToken,
) -> Result<()> {
    alog!("Orchestrator listening on {}", listener.local_addr()?);

    if let Some(lease) = orchestrator.task_lease() {
        tokio::spawn(lease_sweep(
            Arc::clone(&orchestrator),
            sweep_interval(lease),
            cancel.clone(),
        ));
    }

    let shutdown = cancel.clone();
    axum::serve(listener, build_router(orchestrator))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    alog!("Orchestrator stopped");
    Ok(())
}

fn sweep_interval(lease: Duration) -> Duration {
    (lease / 2).max(Duration::from_millis(10))
}

async fn lease_sweep(orchestrator: Arc<Orchestrator>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = orchestrator.reclaim_expired() {
                    alog_warn!("Lease sweep failed: {}", e);
                }
            }
        }
    }
}
