use core::fmt::{Debug, Display};

use crate::{phy::Phy, wire::NodeAddress};

pub mod attachment;
pub mod coordinator;
pub mod mailbox;
pub mod node;
mod reception;

pub use attachment::AttachmentTable;
pub use coordinator::Coordinator;
pub use mailbox::{MacSlots, Mailbox, Payload};
pub use node::{Node, NodeState, SendError};

/// Source of the factory-programmed 64-bit identifier of the device.
pub trait UniqueId {
    fn read_unique_id(&mut self) -> u64;
}

impl UniqueId for u64 {
    fn read_unique_id(&mut self) -> u64 {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct MacConfig {
    /// The factory id of the device. Its low four bits are the device address.
    pub unique_id: u64,
    /// The radio channel the network operates on
    pub channel: u8,
}

impl MacConfig {
    /// Reads the unique id once.
    pub fn new(id: &mut impl UniqueId, channel: u8) -> Self {
        Self {
            unique_id: id.read_unique_id(),
            channel,
        }
    }

    pub const fn address(&self) -> NodeAddress {
        NodeAddress::from_unique_id(self.unique_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum MacError<PE> {
    PhyError(PE),
}

impl<PE: Debug> Display for MacError<PE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<PE: Debug> core::error::Error for MacError<PE> {}

impl<PE> From<PE> for MacError<PE> {
    fn from(v: PE) -> Self {
        Self::PhyError(v)
    }
}

/// Log a failed interrupt handler and report that there is nothing to wake up for.
///
/// The MAC has no fatal path: the next alarm or frame starts from a clean radio state.
fn wake_or_log<P: Phy>(context: &str, result: Result<bool, MacError<P::Error>>) -> bool {
    match result {
        Ok(wake) => wake,
        Err(e) => {
            error!("{} failed: {:?}", context, e);
            false
        }
    }
}
