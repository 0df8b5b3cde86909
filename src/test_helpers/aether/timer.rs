use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    test_helpers::aether::{AetherInner, Alarm, NodeId},
    time::{AlarmChannel, Duration, Instant, Timer},
};

/// The 16-bit low-frequency timer of a device in the [`Aether`](super::Aether)
#[derive(Debug)]
pub struct AetherTimer {
    pub(super) inner: Arc<Mutex<AetherInner>>,
    pub(super) node_id: NodeId,
}

impl AetherTimer {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn aether(&self) -> MutexGuard<AetherInner> {
        self.inner.lock().unwrap()
    }
}

impl Timer for AetherTimer {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.aether().local_now(self.node_id))
    }

    fn set_alarm(&mut self, channel: AlarmChannel, ticks: Duration, period: Duration) {
        let mut aether = self.aether();
        let alarm = Alarm {
            at: aether.now + u64::from(ticks.ticks()),
            period: period.ticks(),
        };
        aether.alarms.insert((self.node_id, channel), alarm);
    }

    fn set_alarm_from(
        &mut self,
        channel: AlarmChannel,
        ticks: Duration,
        period: Duration,
        reference: Instant,
    ) {
        let mut aether = self.aether();
        let now = Instant::from_ticks(aether.local_now(self.node_id));
        // Like the hardware comparator, a moment just passed only matches after the counter wrapped.
        let delay = (reference + ticks).wrapping_duration_since(now);
        let alarm = Alarm {
            at: aether.now + u64::from(delay.ticks()),
            period: period.ticks(),
        };
        aether.alarms.insert((self.node_id, channel), alarm);
    }

    fn unset_alarm(&mut self, channel: AlarmChannel) {
        self.aether().alarms.remove(&(self.node_id, channel));
    }
}
