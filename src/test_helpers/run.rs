use std::collections::BTreeMap;

use rand::{rngs::StdRng, SeedableRng};

use super::aether::{Aether, AetherRadio, AetherTimer, Interrupt, NodeId};
use crate::{
    consts::BEACON_PERIOD,
    mac::{Coordinator, MacConfig, MacSlots, Mailbox, Node},
};

/// The radio channel all simulated devices use.
pub const CHANNEL: u8 = 2;

pub type SimCoordinator = Coordinator<'static, AetherRadio, AetherTimer>;
pub type SimNode = Node<'static, AetherRadio, AetherTimer, StdRng>;

enum Device {
    Coordinator(SimCoordinator),
    Node(SimNode),
}

impl Device {
    fn handle(&mut self, interrupt: Interrupt) -> bool {
        match (self, interrupt) {
            (Device::Coordinator(c), Interrupt::Alarm(channel)) => c.on_alarm(channel),
            (Device::Coordinator(c), Interrupt::Radio(irq)) => c.on_radio_irq(irq),
            (Device::Node(n), Interrupt::Alarm(channel)) => n.on_alarm(channel),
            (Device::Node(n), Interrupt::Radio(irq)) => n.on_radio_irq(irq),
        }
    }
}

/// A network of MAC instances in one [`Aether`]
///
/// The slot table of a coordinator and the outbox of a node are leaked so
/// the test can keep using them while the MAC holds on to them.
#[derive(Default)]
pub struct Simulation {
    pub aether: Aether,
    devices: BTreeMap<NodeId, Device>,
    wakes: BTreeMap<NodeId, usize>,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a coordinator. Its first beacon goes out one slot from now.
    pub fn add_coordinator(&mut self, unique_id: u64) -> (NodeId, &'static MacSlots) {
        let slots: &'static MacSlots = Box::leak(Box::new(MacSlots::new()));
        let (radio, timer) = self.aether.radio(0);
        let id = radio.node_id();

        let config = MacConfig::new(&mut { unique_id }, CHANNEL);
        let coordinator = Coordinator::new(radio, timer, slots, config).unwrap();
        self.devices.insert(id, Device::Coordinator(coordinator));

        (id, slots)
    }

    /// Start a node searching for a coordinator.
    pub fn add_node(&mut self, unique_id: u64) -> (NodeId, &'static Mailbox) {
        self.add_node_with_clock_offset(unique_id, 0)
    }

    /// Start a node whose timer reads `clock_offset` ticks ahead of the others.
    pub fn add_node_with_clock_offset(
        &mut self,
        unique_id: u64,
        clock_offset: u16,
    ) -> (NodeId, &'static Mailbox) {
        let outbox: &'static Mailbox = Box::leak(Box::new(Mailbox::new()));
        let (radio, timer) = self.aether.radio(clock_offset);
        let id = radio.node_id();

        let config = MacConfig::new(&mut { unique_id }, CHANNEL);
        let rng = StdRng::seed_from_u64(unique_id);
        let node = Node::new(radio, timer, outbox, config, rng).unwrap();
        self.devices.insert(id, Device::Node(node));

        (id, outbox)
    }

    /// Switch a device off.
    pub fn remove(&mut self, id: NodeId) {
        self.devices.remove(&id);
        self.aether.remove(id);
    }

    /// Global time in ticks.
    pub fn now(&self) -> u64 {
        self.aether.now()
    }

    pub fn run_for(&mut self, ticks: u64) {
        let deadline = self.aether.now() + ticks;

        while let Some(interrupts) = self.aether.advance(deadline) {
            for (id, interrupt) in interrupts {
                let Some(device) = self.devices.get_mut(&id) else {
                    continue;
                };
                if device.handle(interrupt) {
                    *self.wakes.entry(id).or_default() += 1;
                }
            }
        }
    }

    pub fn run_superframes(&mut self, count: u64) {
        self.run_for(count * u64::from(BEACON_PERIOD.ticks()));
    }

    /// How many times the MAC of `id` asked to wake up the CPU.
    pub fn wakes(&self, id: NodeId) -> usize {
        self.wakes.get(&id).copied().unwrap_or_default()
    }

    pub fn coordinator(&self, id: NodeId) -> &SimCoordinator {
        match self.devices.get(&id) {
            Some(Device::Coordinator(c)) => c,
            _ => panic!("{id:?} is not a coordinator"),
        }
    }

    pub fn coordinator_mut(&mut self, id: NodeId) -> &mut SimCoordinator {
        match self.devices.get_mut(&id) {
            Some(Device::Coordinator(c)) => c,
            _ => panic!("{id:?} is not a coordinator"),
        }
    }

    pub fn node(&self, id: NodeId) -> &SimNode {
        match self.devices.get(&id) {
            Some(Device::Node(n)) => n,
            _ => panic!("{id:?} is not a node"),
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SimNode {
        match self.devices.get_mut(&id) {
            Some(Device::Node(n)) => n,
            _ => panic!("{id:?} is not a node"),
        }
    }
}
