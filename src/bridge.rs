//! Bridge module
//!
//! The single cooperative loop tying everything together: control-channel
//! bytes feed the AT engine or the payload collector, the listener is polled
//! for new connections, and every occupied slot is drained for inbound data.

use log::{debug, error, info, warn};
use std::thread;
use std::time::{Duration, Instant};

use crate::at::{PendingSend, LINE_CAPACITY};
use crate::config::AppConfig;
use crate::creds::CredentialStore;
use crate::error::Result;
use crate::history::{CommandHistory, HISTORY_SIZE};
use crate::link::ControlLink;
use crate::net::{TcpConn, TcpStack};
use crate::recovery::{RecoveryRegister, ScratchRegion};
use crate::slots::{self, SlotTable, DRAIN_WINDOW, MAX_SLOTS};
use crate::status::{StatusReporter, StatusSnapshot};
use crate::storage::Storage;
use crate::tcp_server::ListenerManager;
use crate::wifi::WifiControl;

const READY_BANNER: &[u8] = b"\r\nready\r\n";

/// The capability set a deployment provides
pub trait Platform {
    /// Control channel the AT host talks over
    type Link: ControlLink;
    /// Station-mode WiFi control
    type Wifi: WifiControl;
    /// TCP listen/accept/connect capability
    type Stack: TcpStack;
    /// Durable store for the credential record
    type Store: Storage;
    /// Reset-surviving scratch memory
    type Scratch: ScratchRegion;
}

/// The modem session: every mutable piece of bridge state in one place,
/// owned by the multiplexer loop
pub struct Bridge<P: Platform> {
    pub(crate) link: P::Link,
    pub(crate) wifi: P::Wifi,
    pub(crate) server: ListenerManager<P::Stack>,
    pub(crate) slots: SlotTable<<P::Stack as TcpStack>::Conn>,
    pub(crate) creds: CredentialStore<P::Store>,
    pub(crate) recovery: RecoveryRegister<P::Scratch>,
    pub(crate) history: CommandHistory<HISTORY_SIZE>,
    pub(crate) pending: Option<PendingSend>,
    pub(crate) config: AppConfig,
    line: heapless::Vec<u8, LINE_CAPACITY>,
    status: Option<StatusReporter>,
    started: Instant,
    reset_reason: String,
}

impl<P: Platform> Bridge<P> {
    /// Assemble a session and restore persisted state: stored credentials
    /// start a (non-blocking) association attempt, and a valid nonzero
    /// recovery register resumes the listener it records.
    pub fn new(
        link: P::Link,
        wifi: P::Wifi,
        stack: P::Stack,
        store: P::Store,
        scratch: P::Scratch,
        config: AppConfig,
    ) -> Self {
        let creds = CredentialStore::open(store);
        let mut wifi = wifi;
        if let Some(c) = creds.current() {
            if let Err(e) = wifi.reassociate(c.ssid.as_str(), c.password.as_str()) {
                warn!("Startup association failed to begin: {}", e);
            }
        }

        let mut recovery = RecoveryRegister::new(scratch);
        let mut server = ListenerManager::new(stack);
        if let Some(port) = recovery.load().filter(|p| *p > 0 && *p < 65536) {
            // spurious reset? the socket is gone but the intent survived
            info!("Resuming server on port {} after reset", port);
            if let Err(e) = server.start(port as u16, &mut recovery) {
                warn!("Failed to resume server on port {}: {}", port, e);
            }
        }

        Self {
            link,
            wifi,
            server,
            slots: SlotTable::new(),
            creds,
            recovery,
            history: CommandHistory::new(),
            pending: None,
            config,
            line: heapless::Vec::new(),
            status: None,
            started: Instant::now(),
            reset_reason: String::from("unknown"),
        }
    }

    /// Attach the diagnostics reporter
    pub fn with_status(mut self, status: StatusReporter) -> Self {
        self.status = Some(status);
        self
    }

    /// Record the cause of the last reset for the diagnostics page
    pub fn with_reset_reason(mut self, reason: impl Into<String>) -> Self {
        self.reset_reason = reason.into();
        self
    }

    /// Announce readiness on the control channel
    pub fn announce_ready(&mut self) -> Result<()> {
        self.link.send_data(READY_BANNER)
    }

    /// Run the multiplexer loop forever
    pub fn run(&mut self) -> Result<()> {
        self.announce_ready()?;
        info!("Bridge running");

        let interval = Duration::from_millis(self.config.link.poll_interval_ms);
        loop {
            if let Err(e) = self.poll_once() {
                error!("Bridge poll error: {}", e);
            }
            thread::sleep(interval);
        }
    }

    /// One multiplexer iteration: control-channel bytes, diagnostics,
    /// listener accept, slot drain
    pub fn poll_once(&mut self) -> Result<()> {
        self.pump_link()?;
        self.poll_status();
        self.poll_accept()?;
        self.poll_slots()?;
        Ok(())
    }

    fn pump_link(&mut self) -> Result<()> {
        let mut chunk = [0u8; 256];
        loop {
            let n = self.link.receive_data(&mut chunk)?;
            if n == 0 {
                return Ok(());
            }
            for &byte in &chunk[..n] {
                self.consume_byte(byte)?;
            }
        }
    }

    fn consume_byte(&mut self, byte: u8) -> Result<()> {
        if self.config.link.echo {
            self.link.send_data(&[byte])?;
        }

        if self.pending.is_some() {
            return self.collect_payload(byte);
        }

        if byte == b'\n' {
            let mut line = core::mem::take(&mut self.line);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return self.process_command(&line);
        }

        if self.line.push(byte).is_err() {
            // overflow: drop the partial line and restart collection
            self.line.clear();
        }
        Ok(())
    }

    fn collect_payload(&mut self, byte: u8) -> Result<()> {
        let done = match self.pending.as_mut() {
            Some(pending) => {
                // capacity was checked when the send was armed
                let _ = pending.buffer.push(byte);
                pending.remaining -= 1;
                pending.remaining == 0
            }
            None => return Ok(()),
        };

        if done {
            self.complete_send()?;
        }
        Ok(())
    }

    /// Forward a fully collected payload as a single write
    pub(crate) fn complete_send(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let Some(conn) = self.slots.get_mut(pending.slot) else {
            return Ok(());
        };

        match conn.send(&pending.buffer) {
            Ok(()) => self.link.send_data(b"\r\nSEND OK\r\n"),
            Err(e) => {
                // a failed write means the peer is gone; the CLOSED frame
                // surfaces on the next drain pass, no send status is owed
                debug!("Send to slot {} failed: {}", pending.slot, e);
                Ok(())
            }
        }
    }

    fn poll_status(&mut self) {
        let Some(reporter) = self.status.as_mut() else {
            return;
        };
        if let Some(request) = reporter.try_recv() {
            let snapshot = StatusSnapshot {
                history: &self.history,
                connections: self.slots.count(),
                server_port: self.server.port(),
                rssi: self.wifi.rssi(),
                uptime_secs: self.started.elapsed().as_secs(),
                reset_reason: &self.reset_reason,
            };
            reporter.respond(request, &snapshot);
        }
    }

    fn poll_accept(&mut self) -> Result<()> {
        let conn = match self.server.accept() {
            Ok(Some(conn)) => conn,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Accept failed: {}", e);
                return Ok(());
            }
        };

        match self.slots.occupy(conn) {
            Some(slot) => slots::emit_connect(&mut self.link, slot),
            None => {
                // rejected: the connection drops here, no event for it
                warn!("All slots occupied, rejecting connection");
                Ok(())
            }
        }
    }

    fn poll_slots(&mut self) -> Result<()> {
        let mut buffer = [0u8; DRAIN_WINDOW];

        for index in 0..MAX_SLOTS {
            let drained = match self.slots.get_mut(index) {
                None => continue,
                Some(conn) if !conn.is_connected() => None,
                Some(conn) => Some(conn.read_available(&mut buffer)?),
            };

            match drained {
                None => {
                    self.slots.release(index);
                    slots::emit_closed(&mut self.link, index)?;
                    if self.pending.as_ref().is_some_and(|p| p.slot == index) {
                        // silent cancel: no SEND OK, no ERROR
                        self.pending = None;
                    }
                }
                Some(n) if n > 0 => slots::emit_data(&mut self.link, index, &buffer[..n])?,
                Some(_) => {}
            }
        }

        Ok(())
    }
}
