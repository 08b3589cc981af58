//! TCP capability module
//!
//! The slice of the network stack the bridge consumes: bind a listener,
//! accept connections, drain readable bytes without blocking, write. The
//! `std::net` implementation below runs unchanged on ESP-IDF and on hosts.

use log::debug;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};

/// One accepted TCP connection
pub trait TcpConn {
    /// Drain currently-available inbound bytes (non-blocking); 0 = nothing
    fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer to the peer
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// False once a peer disconnect has been detected
    fn is_connected(&self) -> bool;
}

/// A listening socket
pub trait TcpAccept {
    /// Connection type produced by this listener
    type Conn: TcpConn;

    /// Accept one pending connection, if any (non-blocking)
    fn accept(&mut self) -> Result<Option<Self::Conn>>;
}

/// Capability to open listening sockets
pub trait TcpStack {
    /// Connection type of this stack
    type Conn: TcpConn;
    /// Listener type of this stack
    type Listener: TcpAccept<Conn = Self::Conn>;

    /// Bind a listener on the given port
    fn bind(&mut self, port: u16) -> Result<Self::Listener>;
}

/// `std::net` backed TCP stack
pub struct StdTcpStack;

impl TcpStack for StdTcpStack {
    type Conn = StdTcpConn;
    type Listener = StdTcpListener;

    fn bind(&mut self, port: u16) -> Result<StdTcpListener> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| Error::TcpError(format!("Failed to bind to port {}: {}", port, e)))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::TcpError(format!("Failed to set listener non-blocking: {}", e)))?;

        Ok(StdTcpListener { listener })
    }
}

/// Non-blocking wrapper around [`std::net::TcpListener`]
pub struct StdTcpListener {
    listener: TcpListener,
}

impl TcpAccept for StdTcpListener {
    type Conn = StdTcpConn;

    fn accept(&mut self) -> Result<Option<StdTcpConn>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                stream
                    .set_nonblocking(true)
                    .map_err(|e| Error::TcpError(format!("Failed to set client non-blocking: {}", e)))?;
                debug!("Accepted connection from {}", addr);
                Ok(Some(StdTcpConn {
                    stream,
                    connected: true,
                }))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::TcpError(format!("Accept failed: {}", e))),
        }
    }
}

/// Non-blocking wrapper around [`std::net::TcpStream`]
///
/// Peer disconnects surface through `is_connected` after a read or write has
/// observed them; the stream closes when the value is dropped.
pub struct StdTcpConn {
    stream: TcpStream,
    connected: bool,
}

impl TcpConn for StdTcpConn {
    fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if !self.connected {
            return Ok(0);
        }

        match self.stream.read(buffer) {
            Ok(0) => {
                // orderly shutdown by the peer
                self.connected = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                debug!("Connection read failed: {}", e);
                self.connected = false;
                Ok(0)
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::TcpError("Connection is closed".to_string()));
        }

        let mut sent = 0;
        while sent < data.len() {
            match self.stream.write(&data[sent..]) {
                Ok(n) => sent += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) => {
                    self.connected = false;
                    return Err(Error::TcpError(format!("Connection write failed: {}", e)));
                }
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
