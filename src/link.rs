//! Control channel module
//!
//! The byte-oriented duplex link the AT host talks over. On the device this
//! is a UART; on a host build a single-client TCP console stands in for it.

use log::{debug, info};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Byte-oriented control channel
///
/// `receive_data` never blocks; a return of 0 means no bytes are currently
/// available.
pub trait ControlLink {
    /// Send data to the host
    fn send_data(&mut self, data: &[u8]) -> Result<()>;

    /// Receive available data from the host (non-blocking)
    fn receive_data(&mut self, buffer: &mut [u8]) -> Result<usize>;
}

/// TCP console control channel for host builds
///
/// Accepts one client at a time; a disconnect simply waits for the next one.
pub struct TcpConsole {
    listener: TcpListener,
    client: Option<TcpStream>,
}

impl TcpConsole {
    /// Bind the console on the given port
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .map_err(|e| Error::LinkError(format!("Failed to bind console on port {}: {}", port, e)))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::LinkError(format!("Failed to set console non-blocking: {}", e)))?;

        info!("Control console listening on port {}", port);

        Ok(Self {
            listener,
            client: None,
        })
    }

    fn poll_client(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        match self.listener.accept() {
            Ok((stream, addr)) => {
                stream
                    .set_nonblocking(true)
                    .map_err(|e| Error::LinkError(format!("Failed to set console client non-blocking: {}", e)))?;
                info!("Console client connected: {}", addr);
                self.client = Some(stream);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(Error::LinkError(format!("Console accept failed: {}", e))),
        }
    }
}

impl ControlLink for TcpConsole {
    fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let Some(stream) = self.client.as_mut() else {
            // no host attached, replies go nowhere
            return Ok(());
        };

        let mut sent = 0;
        while sent < data.len() {
            match stream.write(&data[sent..]) {
                Ok(n) => sent += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => {
                    debug!("Console client write failed, dropping client: {}", e);
                    self.client = None;
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    fn receive_data(&mut self, buffer: &mut [u8]) -> Result<usize> {
        self.poll_client()?;

        let Some(stream) = self.client.as_mut() else {
            return Ok(0);
        };

        match stream.read(buffer) {
            Ok(0) => {
                info!("Console client disconnected");
                self.client = None;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                debug!("Console client read failed, dropping client: {}", e);
                self.client = None;
                Ok(0)
            }
        }
    }
}
