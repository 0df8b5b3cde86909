use std::fs::File;

use pcap_file::pcapng::PcapNgReader;
use pretty_assertions::assert_eq;
use tdma_mac::{
    mac::{NodeState, SendError},
    test_helpers::{aether::NodeId, run::Simulation},
    wire::NodeAddress,
};

const COORDINATOR_ID: u64 = 0x70AD_0000_0000_1001;
const NODE_ID: u64 = 0x4E0D_0000_0000_0003;

/// A coordinator with one attached node.
fn attached_network() -> (Simulation, NodeId, NodeId) {
    attached_network_with_clock_offset(0)
}

fn attached_network_with_clock_offset(clock_offset: u16) -> (Simulation, NodeId, NodeId) {
    let mut sim = Simulation::new();
    let (coordinator, _) = sim.add_coordinator(COORDINATOR_ID);
    let (node, _) = sim.add_node_with_clock_offset(NODE_ID, clock_offset);

    sim.run_superframes(25);
    assert_eq!(sim.node(node).state(), NodeState::Attached { slot: 1 });

    (sim, coordinator, node)
}

#[test_log::test]
fn data_arrives_in_the_slot_of_the_sender() {
    let (mut sim, coordinator, node) = attached_network();
    let slots = sim.coordinator(coordinator).slots();

    sim.node(node).send(b"hello").unwrap();
    assert!(sim.node(node).outbox().is_ready());

    sim.run_superframes(2);

    assert!(!sim.node(node).outbox().is_ready());
    let payload = slots.take(0).unwrap();
    assert_eq!(payload.source, NodeAddress::new(3));
    assert_eq!(&payload.data[..5], b"hello");
    assert!(payload.data[5..].iter().all(|b| *b == 0));

    assert!(slots.iter().all(|slot| !slot.is_ready()));
}

#[test_log::test]
fn unread_data_blocks_the_slot() {
    let (mut sim, coordinator, node) = attached_network();
    let slots = sim.coordinator(coordinator).slots();

    sim.node(node).send(b"first").unwrap();
    sim.run_superframes(2);
    assert!(slots.get(0).unwrap().is_ready());

    sim.node(node).send(b"second").unwrap();
    sim.run_superframes(2);
    assert_eq!(&slots.take(0).unwrap().data[..5], b"first");

    sim.node(node).send(b"third").unwrap();
    sim.run_superframes(2);
    assert_eq!(&slots.take(0).unwrap().data[..5], b"third");
}

#[test_log::test]
fn one_payload_per_superframe() {
    let (sim, _, node) = attached_network();

    assert_eq!(sim.node(node).send(b"one"), Ok(()));
    assert_eq!(sim.node(node).send(b"two"), Err(SendError::Busy));
    assert_eq!(
        sim.node(node).send(&[0; 100]),
        Err(SendError::TooLong(100))
    );
}

#[test_log::test]
fn clocks_do_not_need_to_agree() {
    let (mut sim, coordinator, node) = attached_network_with_clock_offset(0x7A12);
    let slots = sim.coordinator(coordinator).slots();

    for round in 0..5u8 {
        sim.node(node).send(&[round; 8]).unwrap();
        sim.run_superframes(2);
        assert_eq!(&slots.take(0).unwrap().data[..8], &[round; 8]);
    }
}

#[test_log::test]
fn every_node_uses_its_own_slot() {
    let mut sim = Simulation::new();
    let (coordinator, slots) = sim.add_coordinator(COORDINATOR_ID);
    let nodes: Vec<_> = [0x2, 0x5, 0xA]
        .into_iter()
        .map(|address| sim.add_node(0x4E0D_0000_0000_0000 | address).0)
        .collect();

    sim.run_superframes(100);

    for node in &nodes {
        let n = sim.node(*node);
        assert!(n.is_access_allowed());
        n.send(&[n.address().get(); 4]).unwrap();
    }
    sim.run_superframes(2);

    for node in &nodes {
        let NodeState::Attached { slot } = sim.node(*node).state() else {
            unreachable!();
        };
        let payload = slots.take(usize::from(slot - 1)).unwrap();
        let address = sim.node(*node).address();
        assert_eq!(payload.source, address);
        assert_eq!(&payload.data[..4], &[address.get(); 4]);
    }
    assert_eq!(sim.coordinator(coordinator).attachments().len(), 3);
}

#[test_log::test]
fn callbacks_decide_the_wake_up() {
    let mut sim = Simulation::new();
    let (coordinator, slots) = sim.add_coordinator(COORDINATOR_ID);
    let (node, outbox) = sim.add_node(NODE_ID);

    sim.coordinator_mut(coordinator)
        .set_new_data_cb(Box::leak(Box::new(|_slot: usize| false)));
    sim.node_mut(node)
        .set_access_allowed_cb(Box::leak(Box::new(|| true)));

    sim.run_superframes(25);
    assert!(sim.node(node).is_access_allowed());
    assert!(sim.wakes(node) > 0);

    let wakes = sim.wakes(node);
    sim.run_superframes(3);
    assert_eq!(sim.wakes(node), wakes + 3);

    sim.node(node).send(b"quiet").unwrap();
    assert!(outbox.is_ready());
    sim.run_superframes(2);
    assert!(slots.get(0).unwrap().is_ready());
    assert_eq!(sim.wakes(coordinator), 0);
}

#[test_log::test]
fn network_can_be_traced() {
    let path = std::env::temp_dir().join("tdma_mac_network.pcapng");

    let mut sim = Simulation::new();
    sim.aether.start_trace(File::create(&path).unwrap());
    sim.add_coordinator(COORDINATOR_ID);
    sim.run_superframes(3);
    sim.aether.stop_trace();

    let mut reader = PcapNgReader::new(File::open(&path).unwrap()).unwrap();
    let mut beacons = vec![];
    while let Some(block) = reader.next_block() {
        if let Some(packet) = block.unwrap().into_enhanced_packet() {
            beacons.push(packet.data.to_vec());
        }
    }

    assert_eq!(
        beacons,
        [
            vec![4, 0x11, 0, 0, 0],
            vec![4, 0x11, 1, 0, 0],
            vec![4, 0x11, 2, 0, 0],
        ]
    );
}
