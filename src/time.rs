use core::{
    fmt::Display,
    ops::{Add, AddAssign, Mul, Sub, SubAssign},
};

pub const TICKS_PER_SECOND: u32 = 32_768;

/// An instant of time on the 16-bit free-running timer.
///
/// Every tick is one period of the 32768 Hz low-frequency clock.
/// The counter wraps every 2 seconds, so all arithmetic is modular
/// and an instant is only meaningful relative to another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Instant {
    ticks: u16,
}

impl Instant {
    pub const fn from_ticks(ticks: u16) -> Self {
        Self { ticks }
    }

    pub const fn ticks(&self) -> u16 {
        self.ticks
    }

    /// The time elapsed from `earlier` to `self`, assuming less than one
    /// counter period separates them.
    #[must_use]
    pub const fn wrapping_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_ticks(self.ticks.wrapping_sub(earlier.ticks))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        Self::from_ticks(self.ticks.wrapping_add(rhs.ticks))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self::from_ticks(self.ticks.wrapping_sub(rhs.ticks))
    }
}

impl SubAssign<Duration> for Instant {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Self::Output {
        self.wrapping_duration_since(rhs)
    }
}

impl Display for Instant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "@{}", self.ticks)
    }
}

/// A non-negative span of timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Duration {
    ticks: u16,
}

impl Duration {
    pub const ZERO: Self = Self::from_ticks(0);

    pub const fn from_ticks(ticks: u16) -> Self {
        Self { ticks }
    }

    /// Rounds down to whole ticks. Saturates at the largest representable span.
    pub const fn from_millis(millis: u32) -> Self {
        let ticks = millis as u64 * TICKS_PER_SECOND as u64 / 1000;
        if ticks > u16::MAX as u64 {
            Self::from_ticks(u16::MAX)
        } else {
            Self::from_ticks(ticks as u16)
        }
    }

    pub const fn ticks(&self) -> u16 {
        self.ticks
    }

    pub const fn as_micros(&self) -> u32 {
        (self.ticks as u64 * 1_000_000 / TICKS_PER_SECOND as u64) as u32
    }

    #[must_use]
    pub const fn checked_mul(self, rhs: u16) -> Option<Self> {
        match self.ticks.checked_mul(rhs) {
            Some(ticks) => Some(Self::from_ticks(ticks)),
            None => None,
        }
    }

    #[must_use]
    pub const fn saturating_mul(self, rhs: u16) -> Self {
        Self::from_ticks(self.ticks.saturating_mul(rhs))
    }

    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self::from_ticks(self.ticks.saturating_sub(rhs.ticks))
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Self) -> Self::Output {
        Self::from_ticks(self.ticks.saturating_add(rhs.ticks))
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Mul<u16> for Duration {
    type Output = Duration;

    fn mul(self, rhs: u16) -> Self::Output {
        self.saturating_mul(rhs)
    }
}

impl Display for Duration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ticks", self.ticks)
    }
}

/// The comparator channels of the hardware timer used by the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[repr(u8)]
pub enum AlarmChannel {
    /// Periodic slot tick of the coordinator
    Slot = 0,
    /// Beacon listening window of a node
    Beacon = 1,
    /// Slot-aligned transmission of a node
    Transmit = 2,
}

/// A free-running tick counter with per-channel compare alarms.
///
/// An alarm firing must be routed back to the MAC by the interrupt glue
/// (see [`crate::mac::coordinator::Coordinator::on_alarm`] and
/// [`crate::mac::node::Node::on_alarm`]).
pub trait Timer {
    /// Read the free-running counter.
    fn now(&self) -> Instant;

    /// Arm `channel` to fire `ticks` from now, then every `period` if the period is not zero.
    ///
    /// Arming a channel replaces any alarm that was pending on it.
    fn set_alarm(&mut self, channel: AlarmChannel, ticks: Duration, period: Duration);

    /// Arm `channel` to fire at `reference + ticks`, then every `period` if the period is not zero.
    fn set_alarm_from(
        &mut self,
        channel: AlarmChannel,
        ticks: Duration,
        period: Duration,
        reference: Instant,
    );

    /// Disable `channel`.
    fn unset_alarm(&mut self, channel: AlarmChannel);
}
