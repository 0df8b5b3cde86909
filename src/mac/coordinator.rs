//! The access point side of the protocol.
//!
//! The coordinator owns the superframe. Its periodic slot alarm sends the
//! beacon, then tells the radio handler which frame kind the next slot
//! carries: data from the slot owner, or attach requests in the control slot.

use super::{
    attachment::AttachmentTable,
    mailbox::{MacSlots, Payload},
    reception::{decode, receive_frame, restart_receive, Reception},
    wake_or_log, MacConfig, MacError,
};
use crate::{
    consts::{
        BEACON_SLOT, CONTROL_LENGTH, CTRL_SLOT, DATA_LENGTH, HEADER_LENGTH, MAX_PACKET_SIZE,
        SLOT_INVALID, SLOT_LENGTH,
    },
    phy::{Phy, RadioIrq},
    time::{AlarmChannel, Timer},
    wire::{Beacon, Control, ControlFrame, ControlType, DataFrame, FrameType, NodeAddress},
};

/// What the next end-of-packet interrupt means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
enum PacketHandler {
    /// Our own beacon left the radio
    BeaconSent,
    /// A frame arrived in the data slot with this number
    DataSlot(u8),
    /// A frame arrived in the control slot
    ControlSlot,
}

pub struct Coordinator<'a, P: Phy, T: Timer> {
    phy: P,
    timer: T,
    slots: &'a MacSlots,
    address: NodeAddress,
    attachments: AttachmentTable,
    /// The slot currently running
    slot_count: u8,
    /// The next beacon to send, with the pending attach response if there is one
    beacon: Beacon,
    packet_handler: Option<PacketHandler>,
    new_data_cb: Option<&'a dyn Fn(usize) -> bool>,
    rx_buffer: [u8; MAX_PACKET_SIZE],
}

impl<'a, P: Phy, T: Timer> Coordinator<'a, P, T> {
    /// Bring the radio up and start the superframe.
    ///
    /// The first beacon goes out one slot length from now. Received data is
    /// delivered in `slots`.
    pub fn new(
        mut phy: P,
        mut timer: T,
        slots: &'a MacSlots,
        config: MacConfig,
    ) -> Result<Self, MacError<P::Error>> {
        let address = config.address();

        phy.init(config.channel)?;
        timer.set_alarm(AlarmChannel::Slot, SLOT_LENGTH, SLOT_LENGTH);

        info!(
            "Coordinator {} running on channel {}",
            address, config.channel
        );

        Ok(Self {
            phy,
            timer,
            slots,
            address,
            attachments: AttachmentTable::new(),
            slot_count: CTRL_SLOT,
            beacon: Beacon::new(address, 0),
            packet_handler: None,
            new_data_cb: None,
            rx_buffer: [0; MAX_PACKET_SIZE],
        })
    }

    /// Set the function called after a payload was stored.
    ///
    /// It gets the index into the slot table and returns whether the CPU
    /// needs to wake up.
    pub fn set_new_data_cb(&mut self, cb: &'a dyn Fn(usize) -> bool) {
        self.new_data_cb = Some(cb);
    }

    pub fn address(&self) -> NodeAddress {
        self.address
    }

    pub fn slot_count(&self) -> u8 {
        self.slot_count
    }

    pub fn slots(&self) -> &'a MacSlots {
        self.slots
    }

    pub fn attachments(&self) -> &AttachmentTable {
        &self.attachments
    }

    /// The beacon that goes out at the start of the next superframe.
    pub fn pending_beacon(&self) -> &Beacon {
        &self.beacon
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
        match channel {
            AlarmChannel::Slot => {
                let result = self.slot_alarm();
                wake_or_log::<P>("Slot alarm", result)
            }
            other => {
                warn!("Coordinator got an alarm on {:?}", other);
                false
            }
        }
    }

    /// Entry point for radio interrupts. Returns whether the CPU needs to wake up.
    pub fn on_radio_irq(&mut self, irq: RadioIrq) -> bool {
        if irq != RadioIrq::EndOfPacket {
            return false;
        }

        let Some(handler) = self.packet_handler.take() else {
            trace!("End of packet without handler");
            return false;
        };

        let result = match handler {
            PacketHandler::BeaconSent => self.phy.receive().map(|()| false).map_err(Into::into),
            PacketHandler::DataSlot(slot) => self.receive_data(slot),
            PacketHandler::ControlSlot => self.receive_control(),
        };

        wake_or_log::<P>("Packet handler", result)
    }

    fn slot_alarm(&mut self) -> Result<bool, MacError<P::Error>> {
        self.slot_count += 1;

        if self.slot_count > CTRL_SLOT {
            self.slot_count = BEACON_SLOT;
            self.send_beacon()?;
            return Ok(false);
        }

        self.listen()?;

        let handler = if self.slot_count == CTRL_SLOT {
            PacketHandler::ControlSlot
        } else {
            PacketHandler::DataSlot(self.slot_count)
        };
        self.expect_packet(handler)?;

        Ok(false)
    }

    fn send_beacon(&mut self) -> Result<(), P::Error> {
        let beacon = self.beacon;

        self.phy.idle()?;
        self.phy.flush_rx()?;
        self.phy.flush_tx()?;
        self.phy.calibrate()?;
        self.phy.write_fifo(&beacon.to_bytes())?;
        self.phy.transmit()?;

        trace!("Beacon {} sent", beacon.sequence_number);

        self.beacon.sequence_number = beacon.sequence_number.wrapping_add(1);
        self.beacon.control = Control::NONE;
        self.beacon.data = 0;

        self.expect_packet(PacketHandler::BeaconSent)
    }

    fn expect_packet(&mut self, handler: PacketHandler) -> Result<(), P::Error> {
        self.packet_handler = Some(handler);
        self.phy.arm_interrupt(RadioIrq::EndOfPacket)
    }

    /// Put the radio in receive for the slot that just started.
    ///
    /// A frame nobody handled in the previous slot would be read as the
    /// start of the next one, so leftover bytes are flushed first. This also
    /// recovers the receiver when the end of the beacon was missed.
    fn listen(&mut self) -> Result<(), P::Error> {
        let stale = self.phy.rx_bytes()?;
        if stale > 0 {
            debug!("Flushing {} stale bytes before slot {}", stale, self.slot_count);
            return restart_receive(&mut self.phy);
        }
        self.phy.receive()
    }

    fn receive_data(&mut self, slot: u8) -> Result<bool, MacError<P::Error>> {
        let lengths = HEADER_LENGTH..=DATA_LENGTH;
        let frame = match receive_frame(&mut self.phy, &mut self.rx_buffer, lengths)? {
            Reception::Frame { bytes, .. } => decode::<DataFrame>(bytes, FrameType::Data),
            Reception::Rejected(rejection) => Err(rejection),
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(rejection) => {
                debug!("Dropped frame in slot {}: {:?}", slot, rejection);
                return Ok(false);
            }
        };

        let sender = frame.sender();
        if self.attachments.lookup(slot) != Some(sender) {
            debug!("Node {} is not the owner of slot {}", sender, slot);
            return Ok(false);
        }

        let index = usize::from(slot - 1);
        let Some(mailbox) = self.slots.get(index) else {
            return Ok(false);
        };

        let stored = mailbox.offer(Payload {
            source: sender,
            data: frame.payload,
        });
        if !stored {
            debug!("Slot {} still holds unread data, dropping", slot);
            return Ok(false);
        }

        trace!("Stored data of node {} in slot {}", sender, slot);

        Ok(self.new_data_cb.map_or(true, |cb| cb(index)))
    }

    fn receive_control(&mut self) -> Result<bool, MacError<P::Error>> {
        let lengths = CONTROL_LENGTH..=CONTROL_LENGTH;
        let frame = match receive_frame(&mut self.phy, &mut self.rx_buffer, lengths)? {
            Reception::Frame { bytes, .. } => decode::<ControlFrame>(bytes, FrameType::Control),
            Reception::Rejected(rejection) => Err(rejection),
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(rejection) => {
                debug!("Dropped frame in control slot: {:?}", rejection);
                return Ok(false);
            }
        };

        if frame.control.control_type != ControlType::AttachRequest {
            debug!("Ignoring control frame {:?}", frame.control);
            return Ok(false);
        }

        let node = frame.control.address;
        match self.attachments.attach(node) {
            Some(slot) => {
                info!("Node {} attached to slot {}", node, slot);
                self.beacon.control = Control::new(ControlType::AttachOk, node);
                self.beacon.data = slot;
            }
            None => {
                warn!("No slot left for node {}", node);
                self.beacon.control = Control::new(ControlType::AttachErr, node);
                self.beacon.data = SLOT_INVALID;
            }
        }

        Ok(false)
    }
}

#[cfg(all(test, feature = "test_helpers"))]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        consts::{BEACON_LENGTH, DATA_SLOT_MAX, MAC_PAYLOAD_SIZE},
        test_helpers::mock::{MockRadio, MockTimer, RadioCommand},
        time::Instant,
    };

    type TestCoordinator<'a> = Coordinator<'a, MockRadio, MockTimer>;

    const COORDINATOR_ID: u64 = 0xDEAD_BEEF_0000_0001;

    fn coordinator(slots: &MacSlots) -> TestCoordinator<'_> {
        let config = MacConfig::new(&mut { COORDINATOR_ID }, 7);
        let mut c = Coordinator::new(
            MockRadio::new(),
            MockTimer::new(Instant::from_ticks(100)),
            slots,
            config,
        )
        .unwrap();
        c.phy_mut().take_commands();
        c
    }

    /// Fire slot alarms until `slot` is running.
    fn advance_to(c: &mut TestCoordinator, slot: u8) {
        loop {
            c.timer_mut().expire(AlarmChannel::Slot);
            c.on_alarm(AlarmChannel::Slot);
            if c.slot_count() == slot {
                break;
            }
        }
        c.phy_mut().take_commands();
        c.phy_mut().tx_fifo.clear();
    }

    fn end_of_packet(c: &mut TestCoordinator) -> bool {
        assert!(c.phy_mut().fire(RadioIrq::EndOfPacket));
        c.on_radio_irq(RadioIrq::EndOfPacket)
    }

    fn data_frame(sender: u8, fill: u8) -> [u8; DATA_LENGTH] {
        DataFrame::new(NodeAddress::new(sender), [fill; MAC_PAYLOAD_SIZE]).to_bytes()
    }

    fn attach_request(node: u8) -> [u8; CONTROL_LENGTH] {
        ControlFrame::attach_request(NodeAddress::new(node)).to_bytes()
    }

    #[test]
    fn init_starts_the_slot_timer() {
        let slots = MacSlots::new();
        let config = MacConfig::new(&mut { COORDINATOR_ID }, 7);
        let c = Coordinator::new(
            MockRadio::new(),
            MockTimer::new(Instant::from_ticks(100)),
            &slots,
            config,
        )
        .unwrap();

        assert_eq!(c.address(), NodeAddress::new(1));
        assert_eq!(c.phy().commands, vec![RadioCommand::Init(7)]);

        let alarm = c.timer().alarm(AlarmChannel::Slot).unwrap();
        assert_eq!(alarm.at, Instant::from_ticks(100) + SLOT_LENGTH);
        assert_eq!(alarm.period, SLOT_LENGTH);
    }

    #[test]
    fn first_slot_alarm_sends_a_beacon() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        c.timer_mut().expire(AlarmChannel::Slot);
        assert!(!c.on_alarm(AlarmChannel::Slot));

        assert_eq!(c.slot_count(), BEACON_SLOT);
        assert_eq!(
            c.phy_mut().take_commands(),
            vec![
                RadioCommand::Idle,
                RadioCommand::FlushRx,
                RadioCommand::FlushTx,
                RadioCommand::Calibrate,
                RadioCommand::Transmit,
                RadioCommand::Arm(RadioIrq::EndOfPacket),
            ]
        );
        assert_eq!(c.phy().tx_fifo, vec![0x04, 0x11, 0x00, 0x00, 0x00]);

        // The end of the beacon turns the receiver on.
        end_of_packet(&mut c);
        assert_eq!(c.phy_mut().take_commands(), vec![RadioCommand::Receive]);
    }

    #[test]
    fn slots_cycle_through_the_superframe() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        let mut seen = vec![];
        for _ in 0..2 * (CTRL_SLOT as usize + 1) {
            c.timer_mut().expire(AlarmChannel::Slot);
            c.on_alarm(AlarmChannel::Slot);
            seen.push(c.slot_count());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 0, 1, 2, 3, 4, 5]);

        // Two beacons went out with consecutive sequence numbers.
        assert_eq!(c.pending_beacon().sequence_number, 2);
    }

    #[test]
    fn every_receive_slot_turns_the_receiver_on() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.attachments.attach(NodeAddress::new(3));

        // The end of the beacon never arrives.
        c.timer_mut().expire(AlarmChannel::Slot);
        c.on_alarm(AlarmChannel::Slot);
        c.phy_mut().take_commands();

        for slot in 1..=CTRL_SLOT {
            c.timer_mut().expire(AlarmChannel::Slot);
            c.on_alarm(AlarmChannel::Slot);
            assert_eq!(c.slot_count(), slot);
            assert_eq!(
                c.phy_mut().take_commands(),
                vec![RadioCommand::Receive, RadioCommand::Arm(RadioIrq::EndOfPacket)]
            );

            if slot == 1 {
                c.phy_mut().receive_frame(&data_frame(3, 0x42), true);
                assert!(end_of_packet(&mut c));
            }
        }

        assert_eq!(slots.take(0).unwrap().data, [0x42; MAC_PAYLOAD_SIZE]);
    }

    #[test]
    fn each_slot_selects_its_handler() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        advance_to(&mut c, 1);
        assert_eq!(c.packet_handler, Some(PacketHandler::DataSlot(1)));

        advance_to(&mut c, DATA_SLOT_MAX);
        assert_eq!(c.packet_handler, Some(PacketHandler::DataSlot(DATA_SLOT_MAX)));

        advance_to(&mut c, CTRL_SLOT);
        assert_eq!(c.packet_handler, Some(PacketHandler::ControlSlot));
        assert!(c.phy().is_armed(RadioIrq::EndOfPacket));
    }

    #[test]
    fn attach_request_is_answered_in_the_next_beacon() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        advance_to(&mut c, CTRL_SLOT);
        c.phy_mut().receive_frame(&attach_request(3), true);
        assert!(!end_of_packet(&mut c));

        assert_eq!(c.attachments().lookup(1), Some(NodeAddress::new(3)));

        c.timer_mut().expire(AlarmChannel::Slot);
        c.on_alarm(AlarmChannel::Slot);

        let mut expected = Beacon::new(NodeAddress::new(1), 1);
        expected.control = Control::new(ControlType::AttachOk, NodeAddress::new(3));
        expected.data = 1;
        assert_eq!(c.phy().tx_fifo, expected.to_bytes().to_vec());
        assert_eq!(c.phy().tx_fifo[3], 0x23);

        // The response is only sent once.
        assert_eq!(c.pending_beacon().control, Control::NONE);
        assert_eq!(c.pending_beacon().data, 0);
    }

    #[test]
    fn full_table_answers_with_an_attach_error() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        for node in [2, 3, 4, 5] {
            c.attachments.attach(NodeAddress::new(node));
        }
        let before = c.attachments().clone();

        advance_to(&mut c, CTRL_SLOT);
        c.phy_mut().receive_frame(&attach_request(9), true);
        end_of_packet(&mut c);

        assert_eq!(
            c.pending_beacon().control,
            Control::new(ControlType::AttachErr, NodeAddress::new(9))
        );
        assert_eq!(c.pending_beacon().data, SLOT_INVALID);
        assert_eq!(c.attachments(), &before);

        c.timer_mut().expire(AlarmChannel::Slot);
        c.on_alarm(AlarmChannel::Slot);
        assert_eq!(&c.phy().tx_fifo[3..BEACON_LENGTH], &[0x39, 0xFF]);
    }

    #[test]
    fn data_is_accepted_from_the_slot_owner_only() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.attachments.attach(NodeAddress::new(3));
        c.attachments.attach(NodeAddress::new(7));

        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&data_frame(7, 0xAB), true);
        assert!(!end_of_packet(&mut c));
        assert!(slots.iter().all(|slot| !slot.is_ready()));

        advance_to(&mut c, 2);
        c.phy_mut().receive_frame(&data_frame(7, 0xAB), true);
        assert!(end_of_packet(&mut c));

        let payload = slots.take(1).unwrap();
        assert_eq!(payload.source, NodeAddress::new(7));
        assert_eq!(payload.data, [0xAB; MAC_PAYLOAD_SIZE]);
        assert_eq!(slots.take(0), None);
    }

    #[test]
    fn short_data_frame_is_stored_zero_padded() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.attachments.attach(NodeAddress::new(3));

        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&[9, 0x23, 1, 2, 3, 4, 5, 6, 7, 8], true);
        assert!(end_of_packet(&mut c));

        assert!(c.phy().rx_fifo.is_empty());
        assert!(c.phy_mut().take_commands().is_empty());

        let payload = slots.take(0).unwrap();
        assert_eq!(payload.source, NodeAddress::new(3));
        assert_eq!(&payload.data[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(payload.data[8..].iter().all(|b| *b == 0));

        // A bare header is a frame without payload.
        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&[1, 0x23], true);
        assert!(end_of_packet(&mut c));
        assert_eq!(slots.take(0).unwrap().data, [0; MAC_PAYLOAD_SIZE]);
    }

    #[test]
    fn zero_length_data_frame_is_drained() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.attachments.attach(NodeAddress::new(3));

        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&[0], true);
        assert!(!end_of_packet(&mut c));

        assert!(c.phy().rx_fifo.is_empty());
        assert!(c.phy_mut().take_commands().is_empty());
        assert!(!slots.get(0).unwrap().is_ready());
    }

    #[test]
    fn unowned_slots_drop_everything() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&data_frame(3, 1), true);
        end_of_packet(&mut c);

        assert!(slots.iter().all(|slot| !slot.is_ready()));
    }

    #[test]
    fn unread_payload_blocks_the_slot() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.attachments.attach(NodeAddress::new(3));

        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&data_frame(3, 0x11), true);
        assert!(end_of_packet(&mut c));

        for fill in 0x20..0x25 {
            advance_to(&mut c, 1);
            c.phy_mut().receive_frame(&data_frame(3, fill), true);
            assert!(!end_of_packet(&mut c));
        }

        let waiting = slots.get(0).unwrap().peek().unwrap();
        assert_eq!(waiting.data, [0x11; MAC_PAYLOAD_SIZE]);

        slots.take(0);
        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&data_frame(3, 0x30), true);
        assert!(end_of_packet(&mut c));
        assert_eq!(slots.take(0).unwrap().data, [0x30; MAC_PAYLOAD_SIZE]);
    }

    #[test]
    fn bad_crc_is_dropped_before_dispatch() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.attachments.attach(NodeAddress::new(3));

        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&data_frame(3, 0x11), false);
        assert!(!end_of_packet(&mut c));
        assert!(!slots.get(0).unwrap().is_ready());

        advance_to(&mut c, CTRL_SLOT);
        c.phy_mut().receive_frame(&attach_request(9), false);
        end_of_packet(&mut c);
        assert_eq!(c.pending_beacon().control, Control::NONE);
        assert_eq!(c.attachments().lookup(2), None);

        // Neither frame needed a flush, they were consumed normally.
        assert!(c.phy().rx_fifo.is_empty());
        assert!(!c.phy().commands.contains(&RadioCommand::FlushRx));
    }

    #[test]
    fn oversized_length_flushes_both_fifos() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.attachments.attach(NodeAddress::new(3));

        advance_to(&mut c, 1);
        let mut garbage = [0x5A; 20];
        garbage[0] = 70;
        garbage[1] = 0x23;
        c.phy_mut().receive_raw(&garbage);
        c.phy_mut().tx_fifo.push(0x99);

        assert!(!end_of_packet(&mut c));
        assert_eq!(
            c.phy_mut().take_commands(),
            vec![
                RadioCommand::Idle,
                RadioCommand::FlushRx,
                RadioCommand::FlushTx,
                RadioCommand::Receive,
            ]
        );
        assert!(c.phy().rx_fifo.is_empty());
        assert!(c.phy().tx_fifo.is_empty());
        assert!(slots.iter().all(|slot| !slot.is_ready()));
    }

    #[test]
    fn fifo_overflow_is_flushed() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        advance_to(&mut c, 2);
        c.phy_mut().receive_raw(&[0x3A; MAX_PACKET_SIZE + 6]);
        end_of_packet(&mut c);

        assert!(c.phy().rx_fifo.is_empty());
        assert!(c.phy().commands.contains(&RadioCommand::FlushRx));
    }

    #[test]
    fn short_control_frame_is_drained() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        advance_to(&mut c, CTRL_SLOT);
        c.phy_mut().receive_frame(&[0x01, 0x33], true);
        end_of_packet(&mut c);

        assert!(c.phy().rx_fifo.is_empty());
        assert!(c.phy_mut().take_commands().is_empty());
        assert!(c.attachments().is_empty());
    }

    #[test]
    fn long_control_frame_is_flushed() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        advance_to(&mut c, CTRL_SLOT);
        c.phy_mut().receive_frame(&[0x03, 0x33, 0x13, 0x00], true);
        end_of_packet(&mut c);

        assert!(c.phy().commands.contains(&RadioCommand::FlushRx));
        assert!(c.attachments().is_empty());
    }

    #[test]
    fn spurious_end_of_packet_is_ignored() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        advance_to(&mut c, 1);
        assert!(!end_of_packet(&mut c));
        assert!(c.phy_mut().take_commands().is_empty());
    }

    #[test]
    fn wrong_frame_type_in_data_slot() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.attachments.attach(NodeAddress::new(3));

        advance_to(&mut c, 1);
        let mut frame = data_frame(3, 0x11);
        frame[1] = 0x33;
        c.phy_mut().receive_frame(&frame, true);
        end_of_packet(&mut c);

        assert!(!slots.get(0).unwrap().is_ready());
    }

    #[test]
    fn stale_bytes_are_flushed_at_slot_start() {
        let slots = MacSlots::new();
        let mut c = coordinator(&slots);

        advance_to(&mut c, 1);
        c.phy_mut().receive_frame(&attach_request(4), true);

        c.timer_mut().expire(AlarmChannel::Slot);
        c.on_alarm(AlarmChannel::Slot);

        assert!(c.phy().rx_fifo.is_empty());
        assert_eq!(
            c.phy_mut().take_commands(),
            vec![
                RadioCommand::Idle,
                RadioCommand::FlushRx,
                RadioCommand::FlushTx,
                RadioCommand::Receive,
                RadioCommand::Arm(RadioIrq::EndOfPacket),
            ]
        );
    }

    #[test]
    fn new_data_callback_decides_the_wake_up() {
        let calls = core::cell::RefCell::new(vec![]);
        let cb = |index: usize| {
            calls.borrow_mut().push(index);
            false
        };

        let slots = MacSlots::new();
        let mut c = coordinator(&slots);
        c.set_new_data_cb(&cb);
        c.attachments.attach(NodeAddress::new(3));
        c.attachments.attach(NodeAddress::new(4));

        advance_to(&mut c, 2);
        c.phy_mut().receive_frame(&data_frame(4, 0), true);
        assert!(!end_of_packet(&mut c));

        assert_eq!(*calls.borrow(), vec![1]);
        assert!(slots.get(1).unwrap().is_ready());
    }
}
