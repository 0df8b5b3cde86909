//! Scripted collaborators for driving a single MAC instance by hand.
//!
//! The [`MockRadio`] records every command it receives and lets a test put
//! arbitrary bytes in its receive FIFO. The [`MockTimer`] records the alarms
//! the MAC arms and has a clock the test sets.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::{
    phy::{Phy, RadioIrq},
    time::{AlarmChannel, Duration, Instant, Timer},
    wire::Footer,
};

const RSSI: u8 = 0xC0;
const LQI: u8 = 0x2F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCommand {
    Init(u8),
    Idle,
    FlushRx,
    FlushTx,
    Calibrate,
    Transmit,
    Receive,
    PowerDown,
    Arm(RadioIrq),
    Disarm(RadioIrq),
}

#[derive(Debug, Default)]
pub struct MockRadio {
    pub commands: Vec<RadioCommand>,
    pub rx_fifo: VecDeque<u8>,
    pub tx_fifo: Vec<u8>,
    pub armed: BTreeSet<RadioIrq>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a received frame followed by its footer.
    pub fn receive_frame(&mut self, frame: &[u8], crc_ok: bool) {
        self.rx_fifo.extend(frame);
        let footer = Footer::new(RSSI, crc_ok, LQI);
        self.rx_fifo.extend([footer.rssi, footer.crc]);
    }

    /// Queue bytes as-is.
    pub fn receive_raw(&mut self, bytes: &[u8]) {
        self.rx_fifo.extend(bytes);
    }

    /// Everything the radio was told since the last call.
    pub fn take_commands(&mut self) -> Vec<RadioCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn is_armed(&self, irq: RadioIrq) -> bool {
        self.armed.contains(&irq)
    }

    /// Simulate an interrupt line firing, which disarms it.
    pub fn fire(&mut self, irq: RadioIrq) -> bool {
        self.armed.remove(&irq)
    }
}

impl Phy for MockRadio {
    type Error = core::convert::Infallible;

    fn init(&mut self, channel: u8) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::Init(channel));
        Ok(())
    }

    fn idle(&mut self) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::Idle);
        Ok(())
    }

    fn flush_rx(&mut self) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::FlushRx);
        self.rx_fifo.clear();
        Ok(())
    }

    fn flush_tx(&mut self) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::FlushTx);
        self.tx_fifo.clear();
        Ok(())
    }

    fn calibrate(&mut self) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::Calibrate);
        Ok(())
    }

    fn transmit(&mut self) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::Transmit);
        Ok(())
    }

    fn receive(&mut self) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::Receive);
        Ok(())
    }

    fn power_down(&mut self) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::PowerDown);
        Ok(())
    }

    fn write_fifo(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.tx_fifo.extend_from_slice(data);
        Ok(())
    }

    fn read_fifo(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        for byte in buffer {
            *byte = self.rx_fifo.pop_front().unwrap_or_default();
        }
        Ok(())
    }

    fn rx_bytes(&mut self) -> Result<u8, Self::Error> {
        Ok(self.rx_fifo.len().min(u8::MAX as usize) as u8)
    }

    fn arm_interrupt(&mut self, irq: RadioIrq) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::Arm(irq));
        self.armed.insert(irq);
        Ok(())
    }

    fn disarm_interrupt(&mut self, irq: RadioIrq) -> Result<(), Self::Error> {
        self.commands.push(RadioCommand::Disarm(irq));
        self.armed.remove(&irq);
        Ok(())
    }
}

/// An alarm as the MAC armed it, resolved to an absolute instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedAlarm {
    pub at: Instant,
    pub period: Duration,
}

#[derive(Debug)]
pub struct MockTimer {
    pub now: Instant,
    pub alarms: BTreeMap<AlarmChannel, ArmedAlarm>,
}

impl MockTimer {
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            alarms: BTreeMap::new(),
        }
    }

    pub fn alarm(&self, channel: AlarmChannel) -> Option<ArmedAlarm> {
        self.alarms.get(&channel).copied()
    }

    /// Move the clock to the alarm on `channel` and consume it if it is a one-shot.
    ///
    /// Panics when nothing is armed on the channel.
    pub fn expire(&mut self, channel: AlarmChannel) -> Instant {
        let alarm = self.alarms[&channel];
        self.now = alarm.at;
        if alarm.period == Duration::ZERO {
            self.alarms.remove(&channel);
        } else {
            self.alarms.insert(
                channel,
                ArmedAlarm {
                    at: alarm.at + alarm.period,
                    period: alarm.period,
                },
            );
        }
        alarm.at
    }
}

impl Timer for MockTimer {
    fn now(&self) -> Instant {
        self.now
    }

    fn set_alarm(&mut self, channel: AlarmChannel, ticks: Duration, period: Duration) {
        let at = self.now + ticks;
        self.alarms.insert(channel, ArmedAlarm { at, period });
    }

    fn set_alarm_from(
        &mut self,
        channel: AlarmChannel,
        ticks: Duration,
        period: Duration,
        reference: Instant,
    ) {
        let at = reference + ticks;
        self.alarms.insert(channel, ArmedAlarm { at, period });
    }

    fn unset_alarm(&mut self, channel: AlarmChannel) {
        self.alarms.remove(&channel);
    }
}
