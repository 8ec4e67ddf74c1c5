//! A fake disk resource provider.
//!
//! Disks are created with `PUT /api/disks/{name}` and deleted with
//! `DELETE /api/disks/{name}`. Both only start an operation: its monitor at
//! `/api/operations/{id}` answers `Running` a configured number of times
//! before completing. `/api/animals` serves a polymorphic hierarchy.
//!
//! [`client`] holds the generated-style clients talking to this service.
#![allow(missing_docs)]
use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

mod errors;
mod routes;
mod state;

pub mod client;
pub mod models;

pub use self::state::ServiceConfig;
use self::routes::app_router;
use self::state::AppState;

/// Binds `addr`, then serves the disk service until Ctrl-C.
///
/// # Errors
///
/// Fails when the address cannot be bound, or when serving fails.
pub async fn run(addr: SocketAddr, config: ServiceConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding the disk service to {addr}"))?;
    info!(%addr, ?config, "disk service listening");

    axum::serve(listener, service(config))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down the disk service");
        })
        .await
        .context("serving the disk service")
}

/// Serves the disk service on an already bound listener, until the task is dropped.
///
/// # Errors
///
/// Fails when serving fails.
pub async fn launch(listener: TcpListener, config: ServiceConfig) -> anyhow::Result<()> {
    axum::serve(listener, service(config))
        .await
        .context("serving the disk service")
}

fn service(config: ServiceConfig) -> Router {
    app_router()
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(config))
}
