use byte::{check_len, BytesExt, TryRead, TryWrite};

use super::{FrameType, Header, NodeAddress};
use crate::consts::{DATA_LENGTH, HEADER_LENGTH, MAC_PAYLOAD_SIZE};

/// Application data sent by an attached node in its own slot.
///
/// Frames are sent at full size. A shorter frame is accepted on receive and
/// its payload is zero padded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DataFrame {
    pub header: Header,
    pub payload: [u8; MAC_PAYLOAD_SIZE],
}

impl DataFrame {
    pub const fn new(sender: NodeAddress, payload: [u8; MAC_PAYLOAD_SIZE]) -> Self {
        Self {
            header: Header::new(DATA_LENGTH, FrameType::Data, sender),
            payload,
        }
    }

    pub const fn sender(&self) -> NodeAddress {
        self.header.address()
    }

    pub fn to_bytes(self) -> [u8; DATA_LENGTH] {
        let mut bytes = [0; DATA_LENGTH];
        bytes[..HEADER_LENGTH].copy_from_slice(&self.header.to_bytes());
        bytes[HEADER_LENGTH..].copy_from_slice(&self.payload);
        bytes
    }
}

impl TryRead<'_> for DataFrame {
    fn try_read(bytes: &[u8], _ctx: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;
        check_len(bytes, HEADER_LENGTH)?;

        let header: Header = bytes.read(offset)?;
        let end = header.frame_length();
        if !(HEADER_LENGTH..=DATA_LENGTH).contains(&end) {
            return Err(byte::Error::BadInput {
                err: "data frame length",
            });
        }
        check_len(bytes, end)?;

        let mut payload = [0; MAC_PAYLOAD_SIZE];
        payload[..end - HEADER_LENGTH].copy_from_slice(&bytes[HEADER_LENGTH..end]);
        *offset = end;

        Ok((Self { header, payload }, *offset))
    }
}

impl TryWrite for DataFrame {
    fn try_write(self, bytes: &mut [u8], _ctx: ()) -> byte::Result<usize> {
        check_len(bytes, DATA_LENGTH)?;
        bytes[..DATA_LENGTH].copy_from_slice(&self.to_bytes());
        Ok(DATA_LENGTH)
    }
}
