use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use gatekeeper_service::config::Config;
use gatekeeper_service::metric;
use gatekeeper_service::services::Governance;

use crate::endpoints;

/// Starts the HTTP server based on the loaded config.
pub fn run(config: Config) -> Result<()> {
    // Log this metric before actually starting the server. This allows to see restarts even if
    // service creation fails.
    metric!(counter("server.starting") += 1);

    let megs = 1024 * 1024;
    let web_pool = tokio::runtime::Builder::new_multi_thread()
        .thread_name("gatekeeper-web")
        .enable_all()
        .thread_stack_size(8 * megs)
        .build()?;

    let socket_http = config
        .bind
        .parse::<SocketAddr>()
        .context("invalid bind address")?;
    let governance = Arc::new(Governance::new(config));

    let server_http = axum_server::bind(socket_http)
        .serve(endpoints::create_app(governance).into_make_service());
    tracing::info!("Starting HTTP server on {}", socket_http);

    web_pool.block_on(server_http)?;
    tracing::info!("System shutdown complete");

    Ok(())
}
