//! AT command engine
//!
//! Parses one logical input line, dispatches it, and emits the reply frames
//! of the modem protocol. The send command switches the channel into data
//! mode by arming a [`PendingSend`] that the multiplexer then fills from raw
//! control-channel bytes.

use log::warn;

use crate::bridge::{Bridge, Platform};
use crate::creds::{Credentials, PASS_MAX, SSID_MAX};
use crate::error::Result;
use crate::link::ControlLink;
use crate::net::TcpConn;
use crate::slots::{self, MAX_SLOTS};
use crate::wifi::WifiControl;

/// Command line buffer capacity
pub const LINE_CAPACITY: usize = 2048;

/// Payload buffer capacity for one send operation
pub const SEND_CAPACITY: usize = 2048;

const REPLY_OK: &[u8] = b"\r\nOK\r\n";
const REPLY_ERROR: &[u8] = b"\r\nERROR\r\n";
const REPLY_PROMPT: &[u8] = b"> ";
const REPLY_JOIN_FAIL: &[u8] = b"+CWJAP:1\r\n\r\nFAIL\r\n";
const REPLY_NO_AP: &[u8] = b"No AP\r\n";
const REPLY_NO_LINK: &[u8] = b"link is not\r\n";
const REPLY_TOO_LONG: &[u8] = b"too long\r\n";
const RESET_BANNER: &[u8] = b"\r\nOK\r\n...bla-bla-bla...\r\nready\r\n";

/// In-progress collection of raw payload bytes for one slot
pub struct PendingSend {
    /// Target slot index
    pub slot: usize,
    /// Bytes still to collect from the control channel
    pub remaining: usize,
    /// Collected payload
    pub buffer: heapless::Vec<u8, SEND_CAPACITY>,
}

/// How a handled command terminates on the channel
enum CmdOutcome {
    /// Generic success reply
    Ok,
    /// Generic failure reply
    Error,
    /// The handler already wrote its full reply
    Done,
}

impl<P: Platform> Bridge<P> {
    /// Execute one complete command line (terminator already stripped)
    pub(crate) fn process_command(&mut self, line: &[u8]) -> Result<()> {
        if line.is_empty() {
            return Ok(());
        }

        self.history.record(&String::from_utf8_lossy(line));

        let outcome = match core::str::from_utf8(line) {
            Ok(text) => self.dispatch(text)?,
            Err(_) => CmdOutcome::Error,
        };

        match outcome {
            CmdOutcome::Ok => self.link.send_data(REPLY_OK),
            CmdOutcome::Error => self.link.send_data(REPLY_ERROR),
            CmdOutcome::Done => Ok(()),
        }
    }

    fn dispatch(&mut self, line: &str) -> Result<CmdOutcome> {
        match line {
            "AT" => return Ok(CmdOutcome::Ok),
            "AT+RST" => return self.cmd_reset(),
            // station mode is the only supported mode
            "AT+CWMODE=1" => return Ok(CmdOutcome::Ok),
            // multiple connections are always enabled
            "AT+CIPMUX=1" => return Ok(CmdOutcome::Ok),
            "AT+CWJAP?" => return self.cmd_query_ap(),
            _ => {}
        }

        if let Some(args) = line.strip_prefix("AT+CWJAP=") {
            return self.cmd_join(line, args);
        }
        if let Some(args) = line.strip_prefix("AT+CIPSTA=") {
            // association requires DHCP, a static address is accepted and ignored
            return Ok(if args.is_empty() {
                CmdOutcome::Error
            } else {
                CmdOutcome::Ok
            });
        }
        if let Some(args) = line.strip_prefix("AT+CIPSERVER=") {
            return self.cmd_server(args);
        }
        if let Some(args) = line.strip_prefix("AT+CIPCLOSE=") {
            return self.cmd_close(args);
        }
        if let Some(args) = line.strip_prefix("AT+CIPSEND=") {
            return self.cmd_send(args);
        }

        Ok(CmdOutcome::Error)
    }

    /// `AT+RST`: tear everything down and report the reset banner
    fn cmd_reset(&mut self) -> Result<CmdOutcome> {
        self.server.stop(&mut self.recovery, &mut self.slots);
        self.pending = None;
        self.link.send_data(RESET_BANNER)?;
        Ok(CmdOutcome::Done)
    }

    /// `AT+CWJAP?`: report the stored SSID while associated
    fn cmd_query_ap(&mut self) -> Result<CmdOutcome> {
        if !self.wifi.is_associated() {
            self.link.send_data(REPLY_NO_AP)?;
            return Ok(CmdOutcome::Error);
        }

        let ssid = self.creds.current().map(|c| c.ssid.as_str()).unwrap_or("");
        let mut reply = String::from("+CWJAP:\"");
        for c in ssid.chars() {
            if matches!(c, '"' | ',' | '\\') {
                reply.push('\\');
            }
            reply.push(c);
        }
        reply.push_str("\"\r\n");

        self.link.send_data(reply.as_bytes())?;
        Ok(CmdOutcome::Ok)
    }

    /// `AT+CWJAP="<ssid>","<password>"`: persist a changed pair and
    /// (re-)associate, waiting out the bounded association window
    fn cmd_join(&mut self, raw: &str, args: &str) -> Result<CmdOutcome> {
        let Some((ssid, rest)) = parse_quoted::<SSID_MAX>(args) else {
            return Ok(CmdOutcome::Error);
        };
        let Some(rest) = rest.strip_prefix(',') else {
            return Ok(CmdOutcome::Error);
        };
        if !rest.starts_with('"') {
            return Ok(CmdOutcome::Error);
        }

        // the password's start offset in the raw line is known from here on;
        // the history copy is redacted even if parsing fails below
        let offset = raw.len() - rest.len() + 1;
        self.history.redact_from(offset);

        let Some((password, _)) = parse_quoted::<PASS_MAX>(rest) else {
            return Ok(CmdOutcome::Error);
        };

        let changed = self
            .creds
            .current()
            .map_or(true, |c| c.ssid != ssid || c.password != password);

        if changed {
            let creds = Credentials { ssid, password };
            // persisted before the attempt, kept even if association fails
            if let Err(e) = self.creds.replace(creds.clone()) {
                warn!("Failed to persist credentials: {}", e);
            }
            if let Err(e) = self
                .wifi
                .reassociate(creds.ssid.as_str(), creds.password.as_str())
            {
                warn!("Association failed to begin: {}", e);
                self.link.send_data(REPLY_JOIN_FAIL)?;
                return Ok(CmdOutcome::Done);
            }
        }

        match self.wifi.wait_association(self.config.join_timeout) {
            Ok(true) => Ok(CmdOutcome::Ok),
            Ok(false) => {
                self.link.send_data(REPLY_JOIN_FAIL)?;
                Ok(CmdOutcome::Done)
            }
            Err(e) => {
                warn!("Association wait failed: {}", e);
                self.link.send_data(REPLY_JOIN_FAIL)?;
                Ok(CmdOutcome::Done)
            }
        }
    }

    /// `AT+CIPSERVER=0` / `AT+CIPSERVER=1,<port>`
    fn cmd_server(&mut self, args: &str) -> Result<CmdOutcome> {
        let mut parts = args.splitn(2, ',');
        let Some(mode) = parts.next().and_then(|p| p.parse::<i32>().ok()) else {
            return Ok(CmdOutcome::Error);
        };

        match mode {
            0 => {
                self.server.stop(&mut self.recovery, &mut self.slots);
                Ok(CmdOutcome::Ok)
            }
            1 => {
                let Some(port) = parts.next().and_then(|p| p.parse::<i32>().ok()) else {
                    return Ok(CmdOutcome::Error);
                };
                if port <= 0
                    || port >= 65536
                    || port == self.config.diag.port as i32
                    || self.server.is_running()
                {
                    return Ok(CmdOutcome::Error);
                }

                match self.server.start(port as u16, &mut self.recovery) {
                    Ok(()) => Ok(CmdOutcome::Ok),
                    Err(e) => {
                        warn!("Failed to start server on port {}: {}", port, e);
                        Ok(CmdOutcome::Error)
                    }
                }
            }
            _ => Ok(CmdOutcome::Error),
        }
    }

    /// `AT+CIPCLOSE=<n>`: close an occupied slot
    fn cmd_close(&mut self, args: &str) -> Result<CmdOutcome> {
        let Ok(index) = args.parse::<i32>() else {
            return Ok(CmdOutcome::Error);
        };
        if index < 0 || index as usize >= MAX_SLOTS {
            return Ok(CmdOutcome::Error);
        }
        let index = index as usize;

        if self.slots.release(index).is_none() {
            self.link.send_data(REPLY_NO_LINK)?;
            return Ok(CmdOutcome::Error);
        }

        slots::emit_closed(&mut self.link, index)?;
        Ok(CmdOutcome::Ok)
    }

    /// `AT+CIPSEND=<n>,<len>`: arm payload collection for a connected slot
    fn cmd_send(&mut self, args: &str) -> Result<CmdOutcome> {
        let Some((index_s, length_s)) = args.split_once(',') else {
            return Ok(CmdOutcome::Error);
        };
        let (Ok(index), Ok(length)) = (index_s.parse::<i32>(), length_s.parse::<i32>()) else {
            return Ok(CmdOutcome::Error);
        };
        if index < 0 || index as usize >= MAX_SLOTS || length < 0 {
            return Ok(CmdOutcome::Error);
        }
        let index = index as usize;

        let connected = self
            .slots
            .get_mut(index)
            .map_or(false, |c| c.is_connected());
        if !connected {
            self.link.send_data(REPLY_NO_LINK)?;
            return Ok(CmdOutcome::Error);
        }

        let length = length as usize;
        if length > SEND_CAPACITY {
            self.link.send_data(REPLY_TOO_LONG)?;
            return Ok(CmdOutcome::Error);
        }

        self.pending = Some(PendingSend {
            slot: index,
            remaining: length,
            buffer: heapless::Vec::new(),
        });
        self.link.send_data(REPLY_PROMPT)?;

        if length == 0 {
            // nothing to collect
            self.complete_send()?;
        }
        Ok(CmdOutcome::Done)
    }
}

/// Parse one quoted, backslash-escaped field
///
/// A backslash makes the next character literal, a quote included; the field
/// ends at the first unescaped quote. Input overflowing `CAP` bytes is cut
/// without failing. Returns the field and the rest of the input after the
/// closing quote; `None` when the leading or closing quote is missing.
fn parse_quoted<const CAP: usize>(input: &str) -> Option<(heapless::String<CAP>, &str)> {
    let rest = input.strip_prefix('"')?;
    let mut field = heapless::String::new();

    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((field, &rest[i + 1..])),
            '\\' => {
                let (_, escaped) = chars.next()?;
                let _ = field.push(escaped);
            }
            _ => {
                let _ = field.push(c);
            }
        }
    }

    None
}
