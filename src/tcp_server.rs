//! TCP server module
//!
//! Owns the single AT-protocol listener. Starting records the port in the
//! recovery register; stopping clears the register and empties the slot
//! table, so a soft reset can tell whether a server was meant to be running.

use log::info;

use crate::error::{Error, Result};
use crate::net::{TcpAccept, TcpConn, TcpStack};
use crate::recovery::{RecoveryRegister, ScratchRegion};
use crate::slots::SlotTable;

/// Listener manager: at most one active listening socket
pub struct ListenerManager<S: TcpStack> {
    stack: S,
    active: Option<S::Listener>,
    port: u16,
}

impl<S: TcpStack> ListenerManager<S> {
    pub fn new(stack: S) -> Self {
        Self {
            stack,
            active: None,
            port: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Configured port while running
    pub fn port(&self) -> Option<u16> {
        self.active.as_ref().map(|_| self.port)
    }

    /// Start listening and persist the port to the recovery register
    pub fn start<R: ScratchRegion>(
        &mut self,
        port: u16,
        recovery: &mut RecoveryRegister<R>,
    ) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::TcpError("Server already running".to_string()));
        }

        let listener = self.stack.bind(port)?;
        recovery.store(port as i32);
        self.active = Some(listener);
        self.port = port;

        info!("Server listening on port {}", port);
        Ok(())
    }

    /// Stop the listener, drop every connection and clear the register.
    /// Idempotent: used for the explicit stop command and for full reset,
    /// whether or not a server is actually running. The teardown is silent,
    /// no CLOSED frames are emitted.
    pub fn stop<R: ScratchRegion, C: TcpConn>(
        &mut self,
        recovery: &mut RecoveryRegister<R>,
        slots: &mut SlotTable<C>,
    ) {
        slots.clear();

        if self.active.take().is_some() {
            info!("Server on port {} stopped", self.port);
        }
        self.port = 0;

        recovery.store(0);
    }

    /// Accept one pending connection, if a listener is running
    pub fn accept(&mut self) -> Result<Option<S::Conn>> {
        match self.active.as_mut() {
            Some(listener) => listener.accept(),
            None => Ok(None),
        }
    }
}
