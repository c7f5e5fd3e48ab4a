/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Non-blocking TCP endpoints.
//!
//! A connected stream is split into a [`ReceiverEndPoint`], polled by the
//! receiver unit, and a [`SenderEndPoint`], written by the sender unit. Neither
//! half ever blocks: reads and writes that would block are retried on a later
//! tick.

use crate::codec::{CodecError, FixCodec};
use bytes::{Buf, Bytes, BytesMut};
use fixgate_core::types::ConnectionId;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use thiserror::Error;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

/// Upper bound on bytes queued behind a slow peer.
pub const DEFAULT_MAX_PENDING: usize = 4 * 1024 * 1024;

/// Failures that end a connection.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The peer closed its end of the stream.
    #[error("peer closed connection")]
    PeerClosed,

    /// Socket I/O failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The inbound byte stream could not be framed.
    #[error("framing error: {0}")]
    Codec(#[from] CodecError),

    /// Too many bytes are waiting for a slow peer.
    #[error("outbound backlog of {pending} bytes exceeds limit")]
    Backlogged {
        /// Bytes waiting to be written.
        pending: usize,
    },
}

/// Splits a connected stream into its two non-blocking halves.
///
/// # Arguments
/// * `stream` - A connected TCP stream
/// * `connection_id` - Id assigned to the connection
/// * `receive_buffer_size` - Bytes read per socket read
///
/// # Errors
/// Returns an error if the stream cannot be switched to non-blocking mode or
/// cloned.
pub fn split_stream(
    stream: TcpStream,
    connection_id: ConnectionId,
    receive_buffer_size: usize,
) -> io::Result<(ReceiverEndPoint, SenderEndPoint)> {
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;
    let peer = stream.peer_addr().ok();
    let write_half = stream.try_clone()?;
    Ok((
        ReceiverEndPoint::new(stream, connection_id, receive_buffer_size, peer),
        SenderEndPoint::new(write_half, connection_id),
    ))
}

/// Read half of a connection.
#[derive(Debug)]
pub struct ReceiverEndPoint {
    connection_id: ConnectionId,
    stream: TcpStream,
    peer: Option<SocketAddr>,
    buffer: BytesMut,
    scratch: Vec<u8>,
    codec: FixCodec,
}

impl ReceiverEndPoint {
    fn new(
        stream: TcpStream,
        connection_id: ConnectionId,
        receive_buffer_size: usize,
        peer: Option<SocketAddr>,
    ) -> Self {
        Self {
            connection_id,
            stream,
            peer,
            buffer: BytesMut::with_capacity(receive_buffer_size),
            scratch: vec![0; receive_buffer_size.max(64)],
            codec: FixCodec::new(),
        }
    }

    /// Replaces the framing codec.
    #[must_use]
    pub fn with_codec(mut self, codec: FixCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Performs at most one socket read and hands every complete frame to
    /// `on_frame`.
    ///
    /// # Returns
    /// The number of frames delivered.
    ///
    /// # Errors
    /// Returns `PeerClosed` on EOF, or the I/O or framing error that ended the
    /// connection.
    pub fn poll<F>(&mut self, mut on_frame: F) -> Result<usize, EndpointError>
    where
        F: FnMut(Bytes),
    {
        match self.stream.read(&mut self.scratch) {
            Ok(0) => return Err(EndpointError::PeerClosed),
            Ok(n) => {
                trace!(connection_id = %self.connection_id, bytes = n, "read");
                self.buffer.extend_from_slice(&self.scratch[..n]);
            }
            Err(e) if is_transient(&e) => {}
            Err(e) => return Err(e.into()),
        }

        let mut frames = 0;
        while let Some(frame) = self.codec.decode(&mut self.buffer)? {
            on_frame(frame);
            frames += 1;
        }
        Ok(frames)
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub const fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Shuts down both directions of the socket.
    pub fn close(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!(connection_id = %self.connection_id, error = %e, "shutdown on close");
        }
    }
}

/// Write half of a connection.
#[derive(Debug)]
pub struct SenderEndPoint {
    connection_id: ConnectionId,
    stream: TcpStream,
    pending: BytesMut,
    max_pending: usize,
}

impl SenderEndPoint {
    fn new(stream: TcpStream, connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            stream,
            pending: BytesMut::new(),
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    /// Sets the backlog limit.
    #[must_use]
    pub const fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Writes a frame, queueing whatever the socket does not accept now.
    ///
    /// # Errors
    /// Returns an error if the socket fails or the backlog limit is exceeded.
    pub fn write(&mut self, frame: &[u8]) -> Result<(), EndpointError> {
        if !self.pending.is_empty() {
            self.pending.extend_from_slice(frame);
            self.flush()?;
        } else {
            let written = self.write_some(frame)?;
            if written < frame.len() {
                self.pending.extend_from_slice(&frame[written..]);
            }
        }
        if self.pending.len() > self.max_pending {
            return Err(EndpointError::Backlogged {
                pending: self.pending.len(),
            });
        }
        Ok(())
    }

    /// Writes as much of the backlog as the socket accepts.
    ///
    /// # Returns
    /// The number of bytes written.
    ///
    /// # Errors
    /// Returns an error if the socket fails.
    pub fn flush(&mut self) -> Result<usize, EndpointError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let written = match self.stream.write(&self.pending) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(n) => n,
            Err(e) if is_transient(&e) => 0,
            Err(e) => return Err(e.into()),
        };
        self.pending.advance(written);
        Ok(written)
    }

    fn write_some(&mut self, bytes: &[u8]) -> Result<usize, EndpointError> {
        let mut offset = 0;
        while offset < bytes.len() {
            match self.stream.write(&bytes[offset..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(offset)
    }

    /// Returns the number of bytes waiting to be written.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Shuts down the write direction after a best effort flush.
    pub fn close(&mut self) {
        let _ = self.flush();
        if let Err(e) = self.stream.shutdown(Shutdown::Write) {
            debug!(connection_id = %self.connection_id, error = %e, "shutdown on close");
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{AdminEncoder, HeaderFields};
    use fixgate_core::types::SeqNum;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn logon() -> Bytes {
        AdminEncoder::default().logon(
            &HeaderFields {
                begin_string: "FIX.4.4",
                sender_comp_id: "CLIENT",
                target_comp_id: "GATEWAY",
                msg_seq_num: SeqNum::new(1),
                sending_time_ms: 0,
            },
            30,
            false,
        )
    }

    fn poll_until<F: FnMut(Bytes)>(receiver: &mut ReceiverEndPoint, mut on_frame: F) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            let frames = receiver.poll(&mut on_frame).unwrap();
            if frames > 0 {
                return frames;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        0
    }

    #[test]
    fn test_frames_flow_between_endpoints() {
        let (client, server) = connected_pair();
        let (_, mut sender) = split_stream(client, ConnectionId::new(1), 1024).unwrap();
        let (mut receiver, _server_sender) =
            split_stream(server, ConnectionId::new(2), 1024).unwrap();

        let frame = logon();
        sender.write(&frame).unwrap();
        assert_eq!(sender.pending(), 0);

        let mut received = Vec::new();
        let frames = poll_until(&mut receiver, |f| received.push(f));
        assert_eq!(frames, 1);
        assert_eq!(received, vec![frame]);
        assert_eq!(receiver.connection_id(), ConnectionId::new(2));
    }

    #[test]
    fn test_poll_without_data_is_idle() {
        let (_client, server) = connected_pair();
        let (mut receiver, _) = split_stream(server, ConnectionId::new(1), 1024).unwrap();
        assert_eq!(receiver.poll(|_| {}).unwrap(), 0);
    }

    #[test]
    fn test_peer_close_is_reported() {
        let (client, server) = connected_pair();
        let (mut receiver, _) = split_stream(server, ConnectionId::new(1), 1024).unwrap();
        drop(client);

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut result = receiver.poll(|_| {});
        while matches!(result, Ok(_)) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            result = receiver.poll(|_| {});
        }
        assert!(matches!(result, Err(EndpointError::PeerClosed)));
    }

    #[test]
    fn test_garbage_is_a_framing_error() {
        let (mut client, server) = connected_pair();
        let (mut receiver, _) = split_stream(server, ConnectionId::new(1), 1024).unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut result = receiver.poll(|_| {});
        while matches!(result, Ok(0)) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            result = receiver.poll(|_| {});
        }
        assert!(matches!(result, Err(EndpointError::Codec(_))));
    }
}
