//! The leaf side of the protocol.
//!
//! A node searches for a beacon, asks the coordinator for a data slot after
//! a random number of superframes and then sends the application payload in
//! that slot. Every received beacon re-synchronizes the node's notion of the
//! superframe start. Between beacons the radio is powered down and only
//! turned on for a short window around the next expected beacon.

use core::fmt::Display;

use arrayvec::ArrayVec;
use rand_core::RngCore;

use super::{
    mailbox::{Mailbox, Payload, PayloadTooLong},
    reception::{decode, receive_frame, Reception},
    wake_or_log, MacConfig, MacError,
};
use crate::{
    consts::{
        ATTACH_BACKOFF_MAX, BEACON_LENGTH, BEACON_OVERHEAD, BEACON_PERIOD, CTRL_SLOT,
        DATA_SLOT_MAX, MAX_PACKET_SIZE, SAFETY_TIME, SLOT_LENGTH, TIMEOUT_COUNT_MAX,
        TIMEOUT_TIME,
    },
    phy::{Phy, RadioIrq},
    time::{AlarmChannel, Duration, Instant, Timer},
    wire::{Beacon, ControlFrame, ControlType, DataFrame, FrameType, NodeAddress},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum NodeState {
    /// Listening continuously for any coordinator
    BeaconSearch,
    /// Waiting `backoff` more beacons before sending the attach request
    AttachingWaitTx { backoff: u8 },
    /// The attach request went out, the next beacon carries the answer
    AttachingWaitRx,
    /// Owner of data slot `slot`
    Attached { slot: u8 },
}

/// What the next end-of-packet interrupt means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
enum PacketHandler {
    /// A frame arrived while listening for a beacon
    Beacon,
    /// Our own frame left the radio
    TransmitDone,
}

/// What the alarm on [`AlarmChannel::Beacon`] means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
enum BeaconAlarm {
    /// Turn the receiver on ahead of the expected beacon
    OpenWindow,
    /// The beacon did not come
    WindowTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum SendError {
    /// The data does not fit in a data frame. Contains the offered length.
    TooLong(usize),
    /// The previous payload has not been sent yet
    Busy,
}

impl Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for SendError {}

impl From<PayloadTooLong> for SendError {
    fn from(PayloadTooLong(len): PayloadTooLong) -> Self {
        Self::TooLong(len)
    }
}

pub struct Node<'a, P: Phy, T: Timer, Rng: RngCore> {
    phy: P,
    timer: T,
    rng: Rng,
    outbox: &'a Mailbox,
    address: NodeAddress,
    state: NodeState,
    /// The coordinator we are synchronized to
    coordinator: Option<NodeAddress>,
    /// The start of the current superframe on the local clock
    beacon_sync_time: Instant,
    /// Consecutive beacons that did not arrive
    missed_beacons: u8,
    /// When the sync word of the frame being received was detected
    sync_timestamp: Option<Instant>,
    packet_handler: Option<PacketHandler>,
    beacon_alarm: Option<BeaconAlarm>,
    /// The frame waiting for its slot
    tx_frame: ArrayVec<u8, MAX_PACKET_SIZE>,
    access_allowed_cb: Option<&'a dyn Fn() -> bool>,
    rx_buffer: [u8; MAX_PACKET_SIZE],
}

impl<'a, P: Phy, T: Timer, Rng: RngCore> Node<'a, P, T, Rng> {
    /// Bring the radio up and start searching for a coordinator.
    ///
    /// Payloads offered to `outbox` are sent once the node is attached.
    /// The `rng` drives the attach backoff; seeding it from the unique id
    /// keeps nodes that boot together apart.
    pub fn new(
        mut phy: P,
        timer: T,
        outbox: &'a Mailbox,
        config: MacConfig,
        rng: Rng,
    ) -> Result<Self, MacError<P::Error>> {
        let address = config.address();
        if address.is_none() {
            warn!("Address 0 cannot be attached, node will never get a slot");
        }

        phy.init(config.channel)?;

        let mut node = Self {
            phy,
            timer,
            rng,
            outbox,
            address,
            state: NodeState::BeaconSearch,
            coordinator: None,
            beacon_sync_time: Instant::from_ticks(0),
            missed_beacons: 0,
            sync_timestamp: None,
            packet_handler: None,
            beacon_alarm: None,
            tx_frame: ArrayVec::new(),
            access_allowed_cb: None,
            rx_buffer: [0; MAX_PACKET_SIZE],
        };
        node.start_search()?;

        Ok(node)
    }

    /// Stage `data` for the next superframe.
    ///
    /// It goes out in the node's slot after the next beacon. Only one
    /// payload can wait at a time.
    pub fn send(&self, data: &[u8]) -> Result<(), SendError> {
        let payload = Payload::from_slice(self.address, data)?;
        if !self.outbox.offer(payload) {
            return Err(SendError::Busy);
        }
        Ok(())
    }

    /// Whether the node owns a slot.
    pub fn is_access_allowed(&self) -> bool {
        matches!(self.state, NodeState::Attached { .. })
    }

    /// Set the function called on every beacon while attached.
    ///
    /// Data offered to the outbox from within the callback is sent in the
    /// same superframe. The return value tells whether the CPU needs to wake up.
    pub fn set_access_allowed_cb(&mut self, cb: &'a dyn Fn() -> bool) {
        self.access_allowed_cb = Some(cb);
    }

    pub fn address(&self) -> NodeAddress {
        self.address
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn coordinator(&self) -> Option<NodeAddress> {
        self.coordinator
    }

    /// The start of the current superframe on the local clock.
    pub fn beacon_sync_time(&self) -> Instant {
        self.beacon_sync_time
    }

    pub fn missed_beacons(&self) -> u8 {
        self.missed_beacons
    }

    pub fn outbox(&self) -> &'a Mailbox {
        self.outbox
    }

    pub fn phy(&self) -> &P {
        &self.phy
    }

    pub fn phy_mut(&mut self) -> &mut P {
        &mut self.phy
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Entry point for timer interrupts. Returns whether the CPU needs to wake up.
    pub fn on_alarm(&mut self, channel: AlarmChannel) -> bool {
        let result = match channel {
            AlarmChannel::Beacon => match self.beacon_alarm.take() {
                Some(BeaconAlarm::OpenWindow) => self.open_window(),
                Some(BeaconAlarm::WindowTimeout) => self.window_timeout(),
                None => {
                    trace!("Beacon alarm without purpose");
                    Ok(false)
                }
            },
            AlarmChannel::Transmit => self.transmit(),
            AlarmChannel::Slot => {
                warn!("Node got an alarm on {:?}", channel);
                Ok(false)
            }
        };

        wake_or_log::<P>("Alarm", result)
    }

    /// Entry point for radio interrupts. Returns whether the CPU needs to wake up.
    pub fn on_radio_irq(&mut self, irq: RadioIrq) -> bool {
        let result = match irq {
            RadioIrq::SyncDetected => {
                if self.packet_handler == Some(PacketHandler::Beacon) {
                    self.sync_timestamp = Some(self.timer.now());
                }
                Ok(false)
            }
            RadioIrq::EndOfPacket => match self.packet_handler.take() {
                Some(PacketHandler::Beacon) => self.receive_beacon(),
                Some(PacketHandler::TransmitDone) => self.transmit_done(),
                None => {
                    trace!("End of packet without handler");
                    Ok(false)
                }
            },
        };

        wake_or_log::<P>("Packet handler", result)
    }

    fn start_search(&mut self) -> Result<(), P::Error> {
        info!("Node {} searching for a beacon", self.address);

        self.state = NodeState::BeaconSearch;
        self.coordinator = None;
        self.missed_beacons = 0;
        self.tx_frame.clear();
        self.beacon_alarm = None;
        self.timer.unset_alarm(AlarmChannel::Beacon);
        self.timer.unset_alarm(AlarmChannel::Transmit);

        self.phy.idle()?;
        self.phy.flush_rx()?;
        self.phy.calibrate()?;
        self.phy.receive()?;
        self.listen_for_beacon()
    }

    fn listen_for_beacon(&mut self) -> Result<(), P::Error> {
        self.packet_handler = Some(PacketHandler::Beacon);
        self.sync_timestamp = None;
        self.phy.arm_interrupt(RadioIrq::SyncDetected)?;
        self.phy.arm_interrupt(RadioIrq::EndOfPacket)
    }

    fn receive_beacon(&mut self) -> Result<bool, MacError<P::Error>> {
        let sync_timestamp = self.sync_timestamp.take();

        let lengths = BEACON_LENGTH..=BEACON_LENGTH;
        let beacon = match receive_frame(&mut self.phy, &mut self.rx_buffer, lengths)? {
            Reception::Frame { bytes, .. } => decode::<Beacon>(bytes, FrameType::Beacon),
            Reception::Rejected(rejection) => Err(rejection),
        };
        let beacon = match beacon {
            Ok(beacon) => beacon,
            Err(rejection) => {
                trace!("Not a beacon: {:?}", rejection);
                self.listen_for_beacon()?;
                return Ok(false);
            }
        };

        let Some(sync_timestamp) = sync_timestamp else {
            debug!("Beacon without sync timestamp");
            self.listen_for_beacon()?;
            return Ok(false);
        };

        if self
            .coordinator
            .is_some_and(|coordinator| coordinator != beacon.coordinator())
        {
            trace!("Ignoring beacon of coordinator {}", beacon.coordinator());
            self.listen_for_beacon()?;
            return Ok(false);
        }

        self.beacon_sync_time = sync_timestamp - BEACON_OVERHEAD;
        self.missed_beacons = 0;
        trace!(
            "Beacon {} synced at {}",
            beacon.sequence_number,
            self.beacon_sync_time
        );

        let wake = self.process_beacon(&beacon)?;

        if self.state != NodeState::BeaconSearch {
            self.phy.power_down()?;
            self.schedule_window();
        }

        Ok(wake)
    }

    fn process_beacon(&mut self, beacon: &Beacon) -> Result<bool, MacError<P::Error>> {
        match self.state {
            NodeState::BeaconSearch => {
                let backoff = (self.rng.next_u32() % u32::from(ATTACH_BACKOFF_MAX)) as u8 + 1;
                info!(
                    "Found coordinator {}, attaching after {} beacons",
                    beacon.coordinator(),
                    backoff
                );
                self.coordinator = Some(beacon.coordinator());
                self.state = NodeState::AttachingWaitTx { backoff };
                return Ok(false);
            }
            NodeState::AttachingWaitTx { backoff } => {
                let backoff = backoff.saturating_sub(1);
                if backoff > 0 {
                    self.state = NodeState::AttachingWaitTx { backoff };
                    return Ok(false);
                }

                let request = ControlFrame::attach_request(self.address);
                self.schedule_transmission(CTRL_SLOT, &request.to_bytes());
                self.state = NodeState::AttachingWaitRx;
                return Ok(false);
            }
            NodeState::AttachingWaitRx => {
                let response = beacon.control;
                let slot = beacon.data;
                if response.control_type == ControlType::AttachOk
                    && response.address == self.address
                    && (1..=DATA_SLOT_MAX).contains(&slot)
                {
                    info!("Node {} attached to slot {}", self.address, slot);
                    self.state = NodeState::Attached { slot };
                } else {
                    info!("Attach of node {} failed: {:?}", self.address, response);
                    self.start_search()?;
                    return Ok(false);
                }
            }
            NodeState::Attached { .. } => {}
        }

        let NodeState::Attached { slot } = self.state else {
            return Ok(false);
        };

        let wake = self.access_allowed_cb.is_some_and(|cb| cb());

        if let Some(payload) = self.outbox.take() {
            let frame = DataFrame::new(self.address, payload.data);
            self.schedule_transmission(slot, &frame.to_bytes());
        }

        Ok(wake)
    }

    /// Arm the transmit alarm for the start of `slot` in the current superframe.
    fn schedule_transmission(&mut self, slot: u8, frame: &[u8]) {
        self.tx_frame.clear();
        if self.tx_frame.try_extend_from_slice(frame).is_err() {
            error!("Frame of {} bytes does not fit the radio", frame.len());
            return;
        }

        let offset = SLOT_LENGTH * u16::from(slot);
        self.timer.set_alarm_from(
            AlarmChannel::Transmit,
            offset,
            Duration::ZERO,
            self.beacon_sync_time,
        );
        trace!("Transmission scheduled in slot {}", slot);
    }

    fn transmit(&mut self) -> Result<bool, MacError<P::Error>> {
        if self.tx_frame.is_empty() {
            return Ok(false);
        }

        self.phy.idle()?;
        self.phy.flush_tx()?;
        self.phy.transmit()?;
        self.phy.write_fifo(&self.tx_frame)?;
        self.tx_frame.clear();

        self.packet_handler = Some(PacketHandler::TransmitDone);
        self.phy.arm_interrupt(RadioIrq::EndOfPacket)?;

        Ok(false)
    }

    fn transmit_done(&mut self) -> Result<bool, MacError<P::Error>> {
        if self.state == NodeState::BeaconSearch {
            self.phy.receive()?;
            self.listen_for_beacon()?;
        } else {
            self.phy.power_down()?;
        }
        Ok(false)
    }

    /// The receive window is widened for every beacon missed in a row.
    fn window_scale(&self) -> u16 {
        1 << self.missed_beacons
    }

    fn schedule_window(&mut self) {
        let expected = BEACON_PERIOD * u16::from(self.missed_beacons + 1);
        let opens = expected - SAFETY_TIME * self.window_scale();

        self.timer.set_alarm_from(
            AlarmChannel::Beacon,
            opens,
            Duration::ZERO,
            self.beacon_sync_time,
        );
        self.beacon_alarm = Some(BeaconAlarm::OpenWindow);
    }

    fn open_window(&mut self) -> Result<bool, MacError<P::Error>> {
        self.phy.idle()?;
        self.phy.flush_rx()?;
        self.phy.calibrate()?;
        self.phy.receive()?;
        self.listen_for_beacon()?;

        self.timer.set_alarm(
            AlarmChannel::Beacon,
            TIMEOUT_TIME * self.window_scale(),
            Duration::ZERO,
        );
        self.beacon_alarm = Some(BeaconAlarm::WindowTimeout);

        Ok(false)
    }

    fn window_timeout(&mut self) -> Result<bool, MacError<P::Error>> {
        self.missed_beacons += 1;
        self.packet_handler = None;
        self.sync_timestamp = None;

        debug!(
            "Missed beacon {}/{}",
            self.missed_beacons, TIMEOUT_COUNT_MAX
        );

        if self.state == NodeState::AttachingWaitRx || self.missed_beacons >= TIMEOUT_COUNT_MAX {
            warn!("Node {} lost its coordinator", self.address);
            self.start_search()?;
            return Ok(false);
        }

        self.phy.disarm_interrupt(RadioIrq::SyncDetected)?;
        self.phy.disarm_interrupt(RadioIrq::EndOfPacket)?;
        self.phy.power_down()?;
        self.schedule_window();

        Ok(false)
    }
}
