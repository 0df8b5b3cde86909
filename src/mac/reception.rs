use core::ops::RangeInclusive;

use byte::{BytesExt, TryRead};

use super::MacError;
use crate::{
    consts::{FOOTER_LENGTH, MAX_PACKET_SIZE},
    fmt::Bytes,
    phy::Phy,
    wire::{Footer, FrameType, Header},
};

/// Why a received frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub(crate) enum Rejection {
    /// End of packet without any byte in the FIFO
    Spurious,
    /// The FIFO overflowed. Contains the byte count.
    Overflow(u8),
    /// The length byte announces more than the longest accepted frame
    TooLong(u8),
    /// The length byte announces less than the shortest accepted frame
    TooShort(u8),
    /// The FIFO holds less than the length byte announces
    Truncated { length: u8, available: u8 },
    BadCrc,
    Malformed,
    WrongType(FrameType),
}

pub(crate) enum Reception<'b> {
    Frame { bytes: &'b [u8], footer: Footer },
    Rejected(Rejection),
}

/// Pull one frame out of the receive FIFO.
///
/// `lengths` are the accepted frame sizes, counting the length byte but not
/// the footer.
///
/// Frames that are too long or inconsistent with the FIFO content leave the
/// FIFO in an unknown state, so the radio is flushed and put back into
/// receive. A frame that is merely too short is drained and the FIFO stays
/// usable. Frames with a bad CRC are consumed and rejected before anything
/// looks at their content.
pub(crate) fn receive_frame<'b, P: Phy>(
    phy: &mut P,
    buffer: &'b mut [u8; MAX_PACKET_SIZE],
    lengths: RangeInclusive<usize>,
) -> Result<Reception<'b>, MacError<P::Error>> {
    let available = phy.rx_bytes()?;
    if available == 0 {
        return Ok(Reception::Rejected(Rejection::Spurious));
    }
    if usize::from(available) > MAX_PACKET_SIZE {
        restart_receive(phy)?;
        return Ok(Reception::Rejected(Rejection::Overflow(available)));
    }

    phy.read_fifo(&mut buffer[..1])?;
    let length = buffer[0];
    let frame_end = usize::from(length) + 1;

    if frame_end > *lengths.end() {
        restart_receive(phy)?;
        return Ok(Reception::Rejected(Rejection::TooLong(length)));
    }

    if frame_end + FOOTER_LENGTH > usize::from(available) {
        restart_receive(phy)?;
        return Ok(Reception::Rejected(Rejection::Truncated { length, available }));
    }

    phy.read_fifo(&mut buffer[1..frame_end + FOOTER_LENGTH])?;

    if frame_end < *lengths.start() {
        return Ok(Reception::Rejected(Rejection::TooShort(length)));
    }

    let footer = Footer {
        rssi: buffer[frame_end],
        crc: buffer[frame_end + 1],
    };
    if !footer.crc_ok() {
        return Ok(Reception::Rejected(Rejection::BadCrc));
    }

    trace!("Received frame {}", Bytes(&buffer[..frame_end]));

    Ok(Reception::Frame {
        bytes: &buffer[..frame_end],
        footer,
    })
}

/// Decode a frame after checking its type.
pub(crate) fn decode<'b, T: TryRead<'b>>(
    bytes: &'b [u8],
    frame_type: FrameType,
) -> Result<T, Rejection> {
    let header: Header = bytes.read(&mut 0).map_err(|_| Rejection::Malformed)?;
    if header.frame_type() != frame_type {
        return Err(Rejection::WrongType(header.frame_type()));
    }

    bytes.read(&mut 0).map_err(|_| Rejection::Malformed)
}

/// Discard everything in both FIFOs and listen again.
pub(crate) fn restart_receive<P: Phy>(phy: &mut P) -> Result<(), P::Error> {
    phy.idle()?;
    phy.flush_rx()?;
    phy.flush_tx()?;
    phy.receive()
}
