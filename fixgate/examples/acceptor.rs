/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Acceptor example: accepts FIX sessions and prints every inbound frame.
use fixgate::prelude::*;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 9880;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let port = std::env::var("FIX_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let run_for = std::env::var("FIX_RUN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map_or(Duration::from_secs(60), Duration::from_secs);

    let (tx, inbound) = crossbeam_channel::unbounded::<InboundMessage>();
    let gateway = FixGateway::launch(
        GatewayConfig::builder()
            .with_bind_address(format!("127.0.0.1:{port}"))
            .with_authentication_timeout(Duration::from_secs(10))
            .with_inbound_handler(ForwardingHandler::new(tx))
            .build()?,
    )?;
    info!(address = ?gateway.local_addr(), "accepting");

    let deadline = std::time::Instant::now() + run_for;
    while let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now()) {
        let Ok(message) = inbound.recv_timeout(remaining) else {
            break;
        };
        let kind = FrameHeader::parse(&message.frame)
            .map(|header| header.msg_kind)
            .unwrap_or(MsgKind::Other);
        info!(
            session_id = %message.session_id,
            connection_id = %message.connection_id,
            ?kind,
            "{}",
            String::from_utf8_lossy(&message.frame).replace('\x01', "|")
        );
    }

    gateway.close();
    Ok(())
}
