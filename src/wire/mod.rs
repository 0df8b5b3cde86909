//! Bit-exact layouts of the frames exchanged between coordinator and nodes.
//!
//! Every frame starts with a [`Header`]. Received frames are followed by a
//! [`Footer`] the radio appends.

use byte::{check_len, BytesExt, TryRead, TryWrite};

use crate::consts::{ADDR_MASK, HEADER_LENGTH};

pub mod beacon;
pub mod control;
pub mod data;

pub use beacon::Beacon;
pub use control::{Control, ControlFrame, ControlType};
pub use data::DataFrame;

const HIGH_NIBBLE_SHIFT: u8 = 4;
const CRC_OK: u8 = 0b1000_0000;
const LQI_MASK: u8 = 0b0111_1111;

/// 4-bit address of a node or coordinator.
///
/// Address 0 marks a free entry in the attachment table and is never attached.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct NodeAddress(u8);

impl NodeAddress {
    pub const NONE: Self = Self(0);

    /// Masks `value` to the 4-bit address space.
    pub const fn new(value: u8) -> Self {
        Self(value & ADDR_MASK)
    }

    /// The short address of a device is the low byte of its factory id.
    pub const fn from_unique_id(unique_id: u64) -> Self {
        Self::new(unique_id as u8)
    }

    pub const fn get(&self) -> u8 {
        self.0
    }

    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Splits a byte into its high nibble and an address in its low nibble.
pub(crate) const fn unpack(byte: u8) -> (u8, NodeAddress) {
    (byte >> HIGH_NIBBLE_SHIFT, NodeAddress::new(byte))
}

pub(crate) const fn pack(kind: u8, address: NodeAddress) -> u8 {
    (kind << HIGH_NIBBLE_SHIFT) | address.get()
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum FrameType {
    Beacon = 0x1,
    Data = 0x2,
    Control = 0x3,
}

impl TryFrom<u8> for FrameType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x1 => Ok(Self::Beacon),
            0x2 => Ok(Self::Data),
            0x3 => Ok(Self::Control),
            _ => Err(value),
        }
    }
}

/// The frame control byte: frame type in the high nibble, sender address in the low nibble.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct FrameControl {
    pub frame_type: FrameType,
    pub address: NodeAddress,
}

impl FrameControl {
    pub const fn to_byte(self) -> u8 {
        pack(self.frame_type as u8, self.address)
    }
}

impl TryFrom<u8> for FrameControl {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let (kind, address) = unpack(value);
        let frame_type = FrameType::try_from(kind).map_err(|_| value)?;
        Ok(Self {
            frame_type,
            address,
        })
    }
}

/// The two bytes every frame starts with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Header {
    /// Number of frame bytes following the length byte itself
    pub length: u8,
    pub fctl: FrameControl,
}

impl Header {
    /// A header for a frame of `total_length` bytes.
    pub const fn new(total_length: usize, frame_type: FrameType, address: NodeAddress) -> Self {
        Self {
            length: (total_length - 1) as u8,
            fctl: FrameControl {
                frame_type,
                address,
            },
        }
    }

    pub const fn frame_type(&self) -> FrameType {
        self.fctl.frame_type
    }

    pub const fn address(&self) -> NodeAddress {
        self.fctl.address
    }

    /// The total frame size this header announces.
    pub const fn frame_length(&self) -> usize {
        self.length as usize + 1
    }

    pub const fn to_bytes(self) -> [u8; HEADER_LENGTH] {
        [self.length, self.fctl.to_byte()]
    }
}

impl TryRead<'_> for Header {
    fn try_read(bytes: &[u8], _ctx: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;
        check_len(bytes, 2)?;

        let length: u8 = bytes.read(offset)?;
        let fctl: u8 = bytes.read(offset)?;
        let fctl = FrameControl::try_from(fctl).map_err(|_| byte::Error::BadInput {
            err: "unknown frame type",
        })?;

        Ok((Self { length, fctl }, *offset))
    }
}

impl TryWrite for Header {
    fn try_write(self, bytes: &mut [u8], _ctx: ()) -> byte::Result<usize> {
        check_len(bytes, HEADER_LENGTH)?;
        bytes[..HEADER_LENGTH].copy_from_slice(&self.to_bytes());
        Ok(HEADER_LENGTH)
    }
}

/// Link information the radio appends to a received frame.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Footer {
    pub rssi: u8,
    pub crc: u8,
}

impl Footer {
    pub const fn new(rssi: u8, crc_ok: bool, lqi: u8) -> Self {
        let crc = if crc_ok { CRC_OK } else { 0 } | (lqi & LQI_MASK);
        Self { rssi, crc }
    }

    pub const fn crc_ok(&self) -> bool {
        self.crc & CRC_OK != 0
    }

    pub const fn lqi(&self) -> u8 {
        self.crc & LQI_MASK
    }
}

impl TryRead<'_> for Footer {
    fn try_read(bytes: &[u8], _ctx: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;
        check_len(bytes, 2)?;

        let rssi = bytes.read(offset)?;
        let crc = bytes.read(offset)?;

        Ok((Self { rssi, crc }, *offset))
    }
}

impl TryWrite for Footer {
    fn try_write(self, bytes: &mut [u8], _ctx: ()) -> byte::Result<usize> {
        let offset = &mut 0;
        bytes.write(offset, self.rssi)?;
        bytes.write(offset, self.crc)?;
        Ok(*offset)
    }
}
