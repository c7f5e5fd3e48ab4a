/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Initiator example: connects to a FIX acceptor and logs the inbound traffic.
//!
//! Run an acceptor first, e.g. `cargo run --example acceptor`.
use anyhow::Context;
use fixgate::prelude::*;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 9880;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let host = std::env::var("FIX_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("FIX_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let gateway = FixGateway::launch(
        GatewayConfig::builder()
            .with_connection_timeout(Duration::from_secs(5))
            .build()?,
    )?;

    let session = SessionConfig::builder()
        .host(host)
        .port(port)
        .sender_comp_id(CompId::new("CLIENT").context("sender comp id")?)
        .target_comp_id(CompId::new("GATEWAY").context("target comp id")?)
        .heartbeat_interval(Duration::from_secs(30))
        .build()?;

    let handle = gateway.initiate(session)?;
    info!(
        session_id = %handle.session_id(),
        connection_id = %handle.connection_id(),
        address = handle.address(),
        "session active"
    );

    std::thread::sleep(Duration::from_secs(2));
    handle.request_disconnect()?;
    std::thread::sleep(Duration::from_millis(200));
    gateway.close();
    Ok(())
}
