/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outbound TCP connect attempts.
//!
//! Resolution and connect run on a short-lived helper thread so the sender
//! loop never blocks; the sender polls for the result each tick.

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// An in-flight connect attempt.
#[derive(Debug)]
pub struct Connector {
    address: String,
    result: Receiver<io::Result<TcpStream>>,
}

impl Connector {
    /// Starts connecting to `address`.
    ///
    /// Each resolved socket address is tried in turn with `timeout`.
    ///
    /// # Errors
    /// Returns an error if the helper thread cannot be spawned.
    pub fn spawn(address: String, timeout: Duration) -> io::Result<Self> {
        let (tx, result) = bounded(1);
        let target = address.clone();
        std::thread::Builder::new()
            .name("fixgate-connect".to_string())
            .spawn(move || {
                let outcome = connect(&target, timeout);
                if tx.send(outcome).is_err() {
                    debug!(address = %target, "connect result abandoned");
                }
            })?;
        Ok(Self { address, result })
    }

    /// Returns the target address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the result once the attempt has finished.
    pub fn try_result(&self) -> Option<io::Result<TcpStream>> {
        match self.result.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(io::Error::other(
                "connect thread exited without a result",
            ))),
        }
    }
}

fn connect(address: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for socket_addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&socket_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
    }))
}
