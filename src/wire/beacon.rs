use byte::{check_len, BytesExt, TryRead, TryWrite};

use super::{Control, FrameType, Header, NodeAddress};
use crate::consts::BEACON_LENGTH;

/// The frame opening every superframe.
///
/// Besides marking the superframe start, the beacon carries the answer to
/// the attach request the coordinator received in the previous control slot.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Beacon {
    pub header: Header,
    pub sequence_number: u8,
    /// Attach response type and the node it is meant for
    pub control: Control,
    /// The assigned slot number, or [`crate::consts::SLOT_INVALID`] on an attach error
    pub data: u8,
}

impl Beacon {
    /// A beacon without attach response.
    pub const fn new(coordinator: NodeAddress, sequence_number: u8) -> Self {
        Self {
            header: Header::new(BEACON_LENGTH, FrameType::Beacon, coordinator),
            sequence_number,
            control: Control::NONE,
            data: 0,
        }
    }

    pub const fn coordinator(&self) -> NodeAddress {
        self.header.address()
    }

    pub const fn to_bytes(self) -> [u8; BEACON_LENGTH] {
        let [length, fctl] = self.header.to_bytes();
        [
            length,
            fctl,
            self.sequence_number,
            self.control.to_byte(),
            self.data,
        ]
    }
}

impl TryRead<'_> for Beacon {
    fn try_read(bytes: &[u8], _ctx: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;
        check_len(bytes, BEACON_LENGTH)?;

        let header = bytes.read(offset)?;
        let sequence_number = bytes.read(offset)?;
        let control = bytes.read(offset)?;
        let data = bytes.read(offset)?;

        Ok((
            Self {
                header,
                sequence_number,
                control,
                data,
            },
            *offset,
        ))
    }
}

impl TryWrite for Beacon {
    fn try_write(self, bytes: &mut [u8], _ctx: ()) -> byte::Result<usize> {
        check_len(bytes, BEACON_LENGTH)?;
        bytes[..BEACON_LENGTH].copy_from_slice(&self.to_bytes());
        Ok(BEACON_LENGTH)
    }
}
