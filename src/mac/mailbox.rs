//! Single-payload handoff between interrupt context and the application.
//!
//! A [`Mailbox`] holds at most one payload. The producer fills it and raises
//! the ready flag; the consumer takes it and lowers the flag. While the flag
//! is up the producer's offers are refused, so an unread payload is never
//! overwritten.

use core::{
    cell::Cell,
    sync::atomic::{AtomicBool, Ordering},
};

use critical_section::Mutex;

use crate::{
    consts::{DATA_SLOT_MAX, MAC_PAYLOAD_SIZE},
    wire::NodeAddress,
};

/// The application data of one data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Payload {
    /// The node the data came from
    pub source: NodeAddress,
    pub data: [u8; MAC_PAYLOAD_SIZE],
}

impl Payload {
    pub const EMPTY: Self = Self {
        source: NodeAddress::NONE,
        data: [0; MAC_PAYLOAD_SIZE],
    };

    /// Zero pads `data` to the payload size.
    pub fn from_slice(source: NodeAddress, data: &[u8]) -> Result<Self, PayloadTooLong> {
        if data.len() > MAC_PAYLOAD_SIZE {
            return Err(PayloadTooLong(data.len()));
        }

        let mut payload = Self {
            source,
            ..Self::EMPTY
        };
        payload.data[..data.len()].copy_from_slice(data);
        Ok(payload)
    }
}

/// The data does not fit in one data frame. Contains the offered length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct PayloadTooLong(pub usize);

pub struct Mailbox {
    payload: Mutex<Cell<Payload>>,
    ready: AtomicBool,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            payload: Mutex::new(Cell::new(Payload::EMPTY)),
            ready: AtomicBool::new(false),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Store `payload` unless an unread one is waiting.
    ///
    /// Returns whether the payload was stored.
    pub fn offer(&self, payload: Payload) -> bool {
        if self.is_ready() {
            return false;
        }

        critical_section::with(|cs| self.payload.borrow(cs).set(payload));
        self.ready.store(true, Ordering::Release);
        true
    }

    /// Read the waiting payload without consuming it.
    pub fn peek(&self) -> Option<Payload> {
        if !self.is_ready() {
            return None;
        }

        Some(critical_section::with(|cs| self.payload.borrow(cs).get()))
    }

    /// Consume the waiting payload, making room for the next one.
    pub fn take(&self) -> Option<Payload> {
        let payload = self.peek()?;
        self.ready.store(false, Ordering::Release);
        Some(payload)
    }
}

impl core::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mailbox")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

/// The coordinator's receive buffers, one per data slot.
///
/// Index `i` belongs to slot number `i + 1`.
#[derive(Debug, Default)]
pub struct MacSlots {
    slots: [Mailbox; DATA_SLOT_MAX as usize],
}

impl MacSlots {
    pub const fn new() -> Self {
        Self {
            slots: [const { Mailbox::new() }; DATA_SLOT_MAX as usize],
        }
    }

    pub fn get(&self, index: usize) -> Option<&Mailbox> {
        self.slots.get(index)
    }

    /// Consume the payload waiting in slot `index`.
    pub fn take(&self, index: usize) -> Option<Payload> {
        self.get(index)?.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mailbox> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
