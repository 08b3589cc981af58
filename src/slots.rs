//! Connection slot module
//!
//! Fixed table of up to 16 concurrent TCP connections, addressed by the
//! slot index the AT protocol exposes, plus the event frames the protocol
//! emits on slot state changes.

use crate::error::Result;
use crate::link::ControlLink;
use crate::net::TcpConn;

/// Number of connection slots
pub const MAX_SLOTS: usize = 16;

/// Per-slot inbound drain cap per multiplexer pass
pub const DRAIN_WINDOW: usize = 2048;

/// Fixed table of connection slots
///
/// A slot index is stable for the lifetime of its connection and reused
/// only after the slot has been released.
pub struct SlotTable<C: TcpConn> {
    slots: [Option<C>; MAX_SLOTS],
}

impl<C: TcpConn> SlotTable<C> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Place a connection in the lowest free slot. A full table consumes
    /// (and thereby closes) the connection and returns `None`.
    pub fn occupy(&mut self, conn: C) -> Option<usize> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(conn);
                return Some(index);
            }
        }
        None
    }

    /// Free a slot, returning its connection
    pub fn release(&mut self, index: usize) -> Option<C> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut C> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        index < MAX_SLOTS && self.slots[index].is_some()
    }

    /// Number of occupied slots
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Drop every connection without emitting events
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}

impl<C: TcpConn> Default for SlotTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// `<slot>,CONNECT` frame for an accepted connection
pub fn emit_connect<L: ControlLink>(link: &mut L, slot: usize) -> Result<()> {
    link.send_data(format!("{},CONNECT\r\n", slot).as_bytes())
}

/// `<slot>,CLOSED` frame for an explicit or detected close
pub fn emit_closed<L: ControlLink>(link: &mut L, slot: usize) -> Result<()> {
    link.send_data(format!("{},CLOSED\r\n", slot).as_bytes())
}

/// `+IPD` frame carrying inbound connection data
pub fn emit_data<L: ControlLink>(link: &mut L, slot: usize, data: &[u8]) -> Result<()> {
    link.send_data(format!("+IPD,{},{}:", slot, data.len()).as_bytes())?;
    link.send_data(data)?;
    link.send_data(b"\r\nOK\r\n")
}
