//! The slot timing table and frame sizes shared by coordinator and node.
//!
//! All times are in ticks of the 32768 Hz timer.

use crate::time::Duration;

/// The length of one slot of the superframe.
pub const SLOT_LENGTH: Duration = Duration::from_ticks(1638);

/// The slot in which the coordinator transmits its beacon.
pub const BEACON_SLOT: u8 = 0;

/// The number of data slots, and so the number of nodes a coordinator can serve.
pub const DATA_SLOT_MAX: u8 = 4;

/// The slot in which unattached nodes send their control frames.
/// It directly follows the last data slot.
pub const CTRL_SLOT: u8 = DATA_SLOT_MAX + 1;

/// The number of slots in a superframe: beacon, data slots and control slot.
pub const SUPERFRAME_SLOTS: u8 = CTRL_SLOT + 1;

/// The time between two beacons.
#[doc(alias = "superframe period")]
pub const BEACON_PERIOD: Duration =
    Duration::from_ticks(SLOT_LENGTH.ticks() * SUPERFRAME_SLOTS as u16);

/// How long before the expected beacon a node turns its receiver on.
pub const SAFETY_TIME: Duration = Duration::from_ticks(164);

/// How long a node keeps its receiver on waiting for a beacon before
/// counting it as missed.
pub const TIMEOUT_TIME: Duration = Duration::from_ticks(492);

/// The number of consecutive missed beacons after which a node
/// declares a loss of synchronization.
pub const TIMEOUT_COUNT_MAX: u8 = 3;

/// The time between the start of the beacon slot at the coordinator and
/// the sync word detection at a node. It is subtracted from the sync
/// timestamp to recover the coordinator's slot phase.
pub const BEACON_OVERHEAD: Duration = Duration::from_ticks(24);

/// The radio FIFO size. Nothing larger can be received in one piece.
#[doc(alias = "MAX_PACKET")]
pub const MAX_PACKET_SIZE: usize = 64;

/// Size of the length and frame control bytes.
pub const HEADER_LENGTH: usize = 2;

/// Size of the RSSI and CRC/LQI bytes the radio appends to every received frame.
pub const FOOTER_LENGTH: usize = 2;

/// The total size of a beacon frame.
pub const BEACON_LENGTH: usize = HEADER_LENGTH + 3;

/// The total size of a control frame.
pub const CONTROL_LENGTH: usize = HEADER_LENGTH + 1;

/// The number of application bytes carried by one data frame.
pub const MAC_PAYLOAD_SIZE: usize = 57;

/// The total size of a data frame.
pub const DATA_LENGTH: usize = HEADER_LENGTH + MAC_PAYLOAD_SIZE;

/// The number of address bits in the frame control and control bytes.
pub const ADDR_MASK: u8 = 0x0F;

/// Backoffs are drawn uniformly from `1..=ATTACH_BACKOFF_MAX` beacons.
pub const ATTACH_BACKOFF_MAX: u8 = 16;

/// Slot number sent in an attach error response.
pub const SLOT_INVALID: u8 = 0xFF;

const _: () = {
    assert!(CTRL_SLOT == DATA_SLOT_MAX + 1);
    assert!(BEACON_PERIOD.ticks() == (CTRL_SLOT as u16 + 1) * SLOT_LENGTH.ticks());
    assert!(DATA_LENGTH + FOOTER_LENGTH <= MAX_PACKET_SIZE);
    assert!(TIMEOUT_TIME.ticks() > SAFETY_TIME.ticks() + BEACON_OVERHEAD.ticks());
};
