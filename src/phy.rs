/// The two radio interrupt lines the MAC listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum RadioIrq {
    /// A sync word was detected on air; a frame is being received.
    SyncDetected,
    /// A frame was fully received or fully transmitted.
    EndOfPacket,
}

/// A packet radio with a byte FIFO per direction.
///
/// The radio appends a two byte footer (RSSI, then CRC-valid bit and LQI)
/// after every received frame. After a received frame the radio stays in
/// receive mode; after a transmitted frame it returns to idle.
pub trait Phy {
    #[cfg(not(feature = "defmt-03"))]
    type Error: core::error::Error;
    #[cfg(feature = "defmt-03")]
    type Error: core::error::Error + defmt::Format;

    /// Bring the radio up with its default register set, tuned to `channel`, in idle mode.
    fn init(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Stop whatever the radio is doing and go to idle.
    /// This also wakes the radio up from power down.
    fn idle(&mut self) -> Result<(), Self::Error>;

    /// Discard the content of the receive FIFO. Only valid in idle.
    fn flush_rx(&mut self) -> Result<(), Self::Error>;

    /// Discard the content of the transmit FIFO. Only valid in idle.
    fn flush_tx(&mut self) -> Result<(), Self::Error>;

    /// Calibrate the frequency synthesizer. Only valid in idle.
    fn calibrate(&mut self) -> Result<(), Self::Error>;

    /// Enter transmit mode. The frame starts on air as soon as the
    /// transmit FIFO holds data.
    fn transmit(&mut self) -> Result<(), Self::Error>;

    /// Enter receive mode.
    fn receive(&mut self) -> Result<(), Self::Error>;

    /// Enter the lowest power state. Both FIFOs are lost.
    fn power_down(&mut self) -> Result<(), Self::Error>;

    /// Push bytes to the transmit FIFO.
    fn write_fifo(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Pull `buffer.len()` bytes from the receive FIFO.
    fn read_fifo(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// The number of bytes waiting in the receive FIFO.
    ///
    /// A value above [`crate::consts::MAX_PACKET_SIZE`] signals an overflow.
    fn rx_bytes(&mut self) -> Result<u8, Self::Error>;

    /// Enable `irq` for a single occurrence.
    /// The line is disabled again after it fired once.
    fn arm_interrupt(&mut self, irq: RadioIrq) -> Result<(), Self::Error>;

    /// Disable `irq`.
    fn disarm_interrupt(&mut self, irq: RadioIrq) -> Result<(), Self::Error>;
}
