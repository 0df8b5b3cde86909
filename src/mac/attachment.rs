use crate::{consts::DATA_SLOT_MAX, wire::NodeAddress};

/// Which node owns which data slot.
///
/// Slot numbers are 1-based: slot `n` is the `n`-th slot after the beacon.
/// Entries are only ever added; the table is cleared when the coordinator is
/// created again.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct AttachmentTable {
    owners: [NodeAddress; DATA_SLOT_MAX as usize],
}

impl AttachmentTable {
    pub const fn new() -> Self {
        Self {
            owners: [NodeAddress::NONE; DATA_SLOT_MAX as usize],
        }
    }

    /// Give `address` a slot.
    ///
    /// A node that already owns a slot gets the same slot again. Returns
    /// `None` without touching the table when every slot is taken.
    pub fn attach(&mut self, address: NodeAddress) -> Option<u8> {
        if address.is_none() {
            return None;
        }

        if let Some(index) = self.owners.iter().position(|owner| *owner == address) {
            return Some(index as u8 + 1);
        }

        let index = self.owners.iter().position(NodeAddress::is_none)?;
        self.owners[index] = address;
        Some(index as u8 + 1)
    }

    /// The owner of `slot`, if any. Slot 0 and slots past the table have none.
    pub fn lookup(&self, slot: u8) -> Option<NodeAddress> {
        let index = usize::from(slot).checked_sub(1)?;
        self.owners
            .get(index)
            .copied()
            .filter(|owner| !owner.is_none())
    }

    /// The number of slots in use.
    pub fn len(&self) -> usize {
        self.owners.iter().filter(|owner| !owner.is_none()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.owners.len()
    }
}
