use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use tdma_mac::{
    mac::NodeState,
    test_helpers::run::Simulation,
    wire::NodeAddress,
};

const COORDINATOR_ID: u64 = 0x70AD_0000_0000_1001;

/// Enough superframes for any backoff to run out and the answer to arrive.
const ATTACH_SUPERFRAMES: u64 = 25;

#[test_log::test]
fn node_attaches_to_the_first_free_slot() {
    let mut sim = Simulation::new();
    let (coordinator, _) = sim.add_coordinator(COORDINATOR_ID);
    let (node, _) = sim.add_node(0x4E0D_0000_0000_0003);

    assert_eq!(sim.node(node).state(), NodeState::BeaconSearch);

    sim.run_superframes(ATTACH_SUPERFRAMES);

    let n = sim.node(node);
    assert_eq!(n.state(), NodeState::Attached { slot: 1 });
    assert_eq!(n.coordinator(), Some(NodeAddress::new(1)));
    assert!(n.is_access_allowed());
    assert_eq!(n.missed_beacons(), 0);

    let c = sim.coordinator(coordinator);
    assert_eq!(c.attachments().lookup(1), Some(NodeAddress::new(3)));
    assert_eq!(c.attachments().len(), 1);
}

#[test_log::test]
fn node_stays_attached() {
    let mut sim = Simulation::new();
    sim.add_coordinator(COORDINATOR_ID);
    let (node, _) = sim.add_node(0x4E0D_0000_0000_0003);

    sim.run_superframes(ATTACH_SUPERFRAMES);
    let attached = sim.node(node).state();
    assert!(matches!(attached, NodeState::Attached { .. }));

    for _ in 0..20 {
        sim.run_superframes(1);
        assert_eq!(sim.node(node).state(), attached);
    }
}

#[test_log::test]
fn fifth_node_gets_no_slot() {
    let mut sim = Simulation::new();
    let (coordinator, _) = sim.add_coordinator(COORDINATOR_ID);
    let nodes: Vec<_> = (2..=6)
        .map(|address| sim.add_node(0x4E0D_0000_0000_0000 | address).0)
        .collect();

    sim.run_superframes(200);

    let slots: BTreeSet<u8> = nodes
        .iter()
        .filter_map(|node| match sim.node(*node).state() {
            NodeState::Attached { slot } => Some(slot),
            _ => None,
        })
        .collect();
    assert_eq!(slots, BTreeSet::from([1, 2, 3, 4]));

    let table = sim.coordinator(coordinator).attachments();
    assert!(table.is_full());
    for slot in 1..=4 {
        let owner = table.lookup(slot).unwrap();
        let node = nodes
            .iter()
            .find(|node| sim.node(**node).address() == owner)
            .unwrap();
        assert_eq!(sim.node(*node).state(), NodeState::Attached { slot });
    }
}

#[test_log::test]
fn node_searches_again_after_losing_the_coordinator() {
    let mut sim = Simulation::new();
    let (coordinator, _) = sim.add_coordinator(COORDINATOR_ID);
    let (node, _) = sim.add_node(0x4E0D_0000_0000_0003);

    sim.run_superframes(ATTACH_SUPERFRAMES);
    assert!(sim.node(node).is_access_allowed());

    sim.remove(coordinator);
    sim.run_superframes(2);
    assert!(sim.node(node).is_access_allowed());
    assert_eq!(sim.node(node).missed_beacons(), 2);

    sim.run_superframes(2);
    assert_eq!(sim.node(node).state(), NodeState::BeaconSearch);
    assert_eq!(sim.node(node).coordinator(), None);

    sim.add_coordinator(0x70AD_0000_0000_1007);
    sim.run_superframes(ATTACH_SUPERFRAMES);

    let n = sim.node(node);
    assert_eq!(n.coordinator(), Some(NodeAddress::new(7)));
    assert_eq!(n.state(), NodeState::Attached { slot: 1 });
}

#[test_log::test]
fn nodes_ignore_a_second_coordinator_once_synced() {
    let mut sim = Simulation::new();
    let (first, _) = sim.add_coordinator(COORDINATOR_ID);
    let (node, _) = sim.add_node(0x4E0D_0000_0000_0003);

    sim.run_superframes(ATTACH_SUPERFRAMES);
    assert_eq!(sim.node(node).coordinator(), Some(NodeAddress::new(1)));

    // Beacons of the second one fall in the fourth data slot of the first.
    sim.run_for(4 * 1638);
    let (second, _) = sim.add_coordinator(0x70AD_0000_0000_1009);
    sim.run_superframes(10);

    assert_eq!(sim.node(node).coordinator(), Some(NodeAddress::new(1)));
    assert!(sim.node(node).is_access_allowed());
    assert_eq!(sim.coordinator(first).attachments().len(), 1);
    assert!(sim.coordinator(second).attachments().is_empty());
}
