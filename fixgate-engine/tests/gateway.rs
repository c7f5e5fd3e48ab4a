/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! End-to-end gateway tests over loopback TCP.

use bytes::Bytes;
use fixgate_core::error::GatewayError;
use fixgate_core::types::{CompId, SeqNum};
use fixgate_engine::{FixGateway, ForwardingHandler, GatewayConfig, InboundMessage};
use fixgate_session::config::SessionConfig;
use fixgate_session::strategy::{CompositeKey, SenderTargetStrategy, SessionIdStrategy};
use fixgate_transport::frame::{AdminEncoder, FrameHeader, HeaderFields, MsgKind};
use std::io::{ErrorKind, Read, Write};
use std::collections::HashSet;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn comp(id: &str) -> CompId {
    CompId::new(id).unwrap()
}

fn admin_header<'a>(sender: &'a str, target: &'a str, seq: u64) -> HeaderFields<'a> {
    HeaderFields {
        begin_string: "FIX.4.4",
        sender_comp_id: sender,
        target_comp_id: target,
        msg_seq_num: SeqNum::new(seq),
        sending_time_ms: 0,
    }
}

fn logon(sender: &str, target: &str, seq: u64) -> Bytes {
    AdminEncoder::new(256).logon(&admin_header(sender, target, seq), 30, false)
}

fn logout(sender: &str, target: &str, seq: u64) -> Bytes {
    AdminEncoder::new(256).logout(&admin_header(sender, target, seq), None)
}

/// Reads one frame, ending at the `10=nnn` trailer.
fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).unwrap();
        frame.push(byte[0]);
        let n = frame.len();
        if n >= 8 && frame[n - 1] == 0x01 && &frame[n - 8..n - 4] == b"\x0110=" {
            return frame;
        }
    }
}

fn kind_of(frame: &[u8]) -> MsgKind {
    FrameHeader::parse(frame).unwrap().msg_kind
}

fn next_message(
    inbound: &crossbeam_channel::Receiver<InboundMessage>,
    kind: MsgKind,
) -> InboundMessage {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let message = inbound.recv_timeout(remaining).unwrap();
        if kind_of(&message.frame) == kind {
            return message;
        }
    }
}

fn client_config(port: u16) -> SessionConfig {
    SessionConfig::new("127.0.0.1", port, comp("GATEWAY"), comp("PEER"))
}

#[test]
fn test_initiate_returns_active_handle() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, inbound) = crossbeam_channel::unbounded();
    let gateway = FixGateway::launch(
        GatewayConfig::builder()
            .with_inbound_handler(ForwardingHandler::new(tx))
            .build()
            .unwrap(),
    )
    .unwrap();

    let peer = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(3)))
            .unwrap();
        let their_logon = read_frame(&mut stream);
        stream.write_all(&logon("PEER", "GATEWAY", 1)).unwrap();
        let mut payload = [0u8; 7];
        stream.read_exact(&mut payload).unwrap();
        (their_logon, payload)
    });

    let config = client_config(port);
    let expected_id = SenderTargetStrategy::new().session_id(&config.session_key());
    let handle = gateway.initiate(config).unwrap();
    assert_eq!(handle.session_id(), expected_id);
    assert_eq!(handle.address(), format!("127.0.0.1:{port}"));

    handle.send(b"payload").unwrap();
    let (their_logon, payload) = peer.join().unwrap();
    let header = FrameHeader::parse(&their_logon).unwrap();
    assert_eq!(header.msg_kind, MsgKind::Logon);
    assert_eq!(header.sender_comp_id, Some(comp("GATEWAY")));
    assert_eq!(header.target_comp_id, Some(comp("PEER")));
    assert_eq!(header.msg_seq_num, Some(SeqNum::new(1)));
    assert_eq!(&payload, b"payload");

    let seen = next_message(&inbound, MsgKind::Logon);
    assert_eq!(seen.session_id, expected_id);
    gateway.close();
}

#[test]
fn test_initiate_times_out_without_logon_reply() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let gateway = FixGateway::launch(
        GatewayConfig::builder()
            .with_connection_timeout(Duration::from_millis(200))
            .build()
            .unwrap(),
    )
    .unwrap();

    let started = Instant::now();
    let err = gateway.initiate(client_config(port)).unwrap_err();
    let elapsed = started.elapsed();

    match err {
        GatewayError::ConnectionTimeout {
            address,
            timeout_ms,
        } => {
            assert_eq!(address, format!("127.0.0.1:{port}"));
            assert_eq!(timeout_ms, 200);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(220), "{elapsed:?}");
    drop(listener);
}

#[test]
fn test_concurrent_initiates_each_get_their_own_session() {
    const CALLERS: usize = 3;
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let gateway = Arc::new(FixGateway::launch(GatewayConfig::default()).unwrap());

    let peer = thread::spawn(move || {
        let mut streams = Vec::new();
        for _ in 0..CALLERS {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(3)))
                .unwrap();
            let their_logon = FrameHeader::parse(&read_frame(&mut stream)).unwrap();
            let us = their_logon.target_comp_id.unwrap();
            let them = their_logon.sender_comp_id.unwrap();
            stream
                .write_all(&logon(us.as_str(), them.as_str(), 1))
                .unwrap();
            streams.push(stream);
        }
        streams
    });

    let callers: Vec<_> = (0..CALLERS)
        .map(|i| {
            let gateway = Arc::clone(&gateway);
            thread::spawn(move || {
                let config =
                    SessionConfig::new("127.0.0.1", port, comp("GATEWAY"), comp(&format!("PEER{i}")));
                let expected_id = SenderTargetStrategy::new().session_id(&config.session_key());
                let handle = gateway.initiate(config).unwrap();
                assert_eq!(handle.session_id(), expected_id);
                handle.session_id()
            })
        })
        .collect();

    let ids: HashSet<_> = callers.into_iter().map(|c| c.join().unwrap()).collect();
    assert_eq!(ids.len(), CALLERS);
    let _streams = peer.join().unwrap();
    if let Ok(gateway) = Arc::try_unwrap(gateway) {
        gateway.close();
    }
}

#[test]
fn test_initiate_to_closed_port_fails() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let gateway = FixGateway::launch(GatewayConfig::default()).unwrap();

    let err = gateway.initiate(client_config(port)).unwrap_err();
    assert!(matches!(err, GatewayError::ConnectionFailed { .. }), "{err}");
}

#[test]
fn test_acceptor_replies_to_logon_and_logout() {
    let (tx, inbound) = crossbeam_channel::unbounded();
    let gateway = FixGateway::launch(
        GatewayConfig::builder()
            .with_bind_address("127.0.0.1:0")
            .with_inbound_handler(ForwardingHandler::new(tx))
            .build()
            .unwrap(),
    )
    .unwrap();
    let address = gateway.local_addr().unwrap();

    let mut client = TcpStream::connect(address).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(3)))
        .unwrap();
    client.write_all(&logon("CLIENT", "GATEWAY", 1)).unwrap();

    let reply = FrameHeader::parse(&read_frame(&mut client)).unwrap();
    assert_eq!(reply.msg_kind, MsgKind::Logon);
    assert_eq!(reply.sender_comp_id, Some(comp("GATEWAY")));
    assert_eq!(reply.target_comp_id, Some(comp("CLIENT")));

    let expected_id = SenderTargetStrategy::new()
        .session_id(&CompositeKey::new(comp("GATEWAY"), comp("CLIENT")));
    assert_eq!(next_message(&inbound, MsgKind::Logon).session_id, expected_id);

    client.write_all(&logout("CLIENT", "GATEWAY", 2)).unwrap();
    assert_eq!(
        next_message(&inbound, MsgKind::Logout).session_id,
        expected_id
    );
    assert_eq!(kind_of(&read_frame(&mut client)), MsgKind::Logout);
    gateway.close();
}

#[test]
fn test_acceptor_drops_silent_connection() {
    let gateway = FixGateway::launch(
        GatewayConfig::builder()
            .with_bind_address("127.0.0.1:0")
            .with_authentication_timeout(Duration::from_millis(200))
            .build()
            .unwrap(),
    )
    .unwrap();
    let mut client = TcpStream::connect(gateway.local_addr().unwrap()).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(3)))
        .unwrap();

    let mut buf = [0u8; 64];
    match client.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert!(
            !matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
            "connection was not closed: {e}"
        ),
    }
}

#[test]
fn test_launch_rejects_bad_bind_address() {
    let err = FixGateway::launch(
        GatewayConfig::builder()
            .with_bind_address("not-an-address")
            .build()
            .unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, GatewayError::Io(_)));
}
