use byte::{check_len, BytesExt, TryRead, TryWrite};

use super::{pack, unpack, FrameType, Header, NodeAddress};
use crate::consts::CONTROL_LENGTH;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum ControlType {
    /// Nothing to signal. Used by beacons without an attach response.
    None = 0x0,
    AttachRequest = 0x1,
    AttachOk = 0x2,
    AttachErr = 0x3,
}

impl TryFrom<u8> for ControlType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::None),
            0x1 => Ok(Self::AttachRequest),
            0x2 => Ok(Self::AttachOk),
            0x3 => Ok(Self::AttachErr),
            _ => Err(value),
        }
    }
}

/// The control byte: control type in the high nibble, the concerned node in the low nibble.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Control {
    pub control_type: ControlType,
    pub address: NodeAddress,
}

impl Control {
    pub const NONE: Self = Self::new(ControlType::None, NodeAddress::NONE);

    pub const fn new(control_type: ControlType, address: NodeAddress) -> Self {
        Self {
            control_type,
            address,
        }
    }

    pub const fn to_byte(self) -> u8 {
        pack(self.control_type as u8, self.address)
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::NONE
    }
}

impl TryRead<'_> for Control {
    fn try_read(bytes: &[u8], _ctx: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;
        let byte: u8 = bytes.read(offset)?;

        let (kind, address) = unpack(byte);
        let control_type = ControlType::try_from(kind).map_err(|_| byte::Error::BadInput {
            err: "unknown control type",
        })?;

        Ok((Self::new(control_type, address), *offset))
    }
}

impl TryWrite for Control {
    fn try_write(self, bytes: &mut [u8], _ctx: ()) -> byte::Result<usize> {
        let offset = &mut 0;
        bytes.write(offset, self.to_byte())?;
        Ok(*offset)
    }
}

/// The frame a node sends in the control slot.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct ControlFrame {
    pub header: Header,
    pub control: Control,
}

impl ControlFrame {
    /// The request of `node` for a data slot.
    pub const fn attach_request(node: NodeAddress) -> Self {
        Self {
            header: Header::new(CONTROL_LENGTH, FrameType::Control, node),
            control: Control::new(ControlType::AttachRequest, node),
        }
    }

    pub const fn to_bytes(self) -> [u8; CONTROL_LENGTH] {
        let [length, fctl] = self.header.to_bytes();
        [length, fctl, self.control.to_byte()]
    }
}

impl TryRead<'_> for ControlFrame {
    fn try_read(bytes: &[u8], _ctx: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;
        check_len(bytes, CONTROL_LENGTH)?;

        let header = bytes.read(offset)?;
        let control = bytes.read(offset)?;

        Ok((Self { header, control }, *offset))
    }
}

impl TryWrite for ControlFrame {
    fn try_write(self, bytes: &mut [u8], _ctx: ()) -> byte::Result<usize> {
        check_len(bytes, CONTROL_LENGTH)?;
        bytes[..CONTROL_LENGTH].copy_from_slice(&self.to_bytes());
        Ok(CONTROL_LENGTH)
    }
}
