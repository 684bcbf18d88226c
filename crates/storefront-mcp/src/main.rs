mod cache;
mod catalog;
mod config;
mod error;
mod preferences;
mod server;
mod session;
mod views;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use server::StorefrontServer;
use session::Session;
use storefront_common::api::ApiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting storefront MCP server");

    let config = Config::from_env()?;
    info!(
        api_url = %config.api.base_url,
        timeout_secs = config.api.timeout.map(|t| t.as_secs()),
        "configuration loaded"
    );

    let api = Arc::new(ApiClient::new(config.api.clone())?);
    let session = Session::new(api);

    // A failed load is recoverable through the `reload` tool.
    if let Err(e) = session.bootstrap().await {
        error!(error = %e, "storefront data unavailable, serving anyway");
    }
    info!(phase = session.phase().await.name(), "session initialized");

    let server = StorefrontServer::new(session).await;

    if let Some(addr) = config.tcp_listen_addr.as_deref() {
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
