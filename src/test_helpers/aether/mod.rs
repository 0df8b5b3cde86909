//! Radio simulation infrastructure
//!
//! This module provides a simulated [Aether](https://en.wikipedia.org/wiki/Luminiferous_aether) to connect several radios.
//!
//! The aether runs on a global tick count at the resolution of the MAC timer.
//! Every radio gets a [`AetherTimer`] reading that global count through its
//! own 16-bit clock, optionally offset to model devices that booted at
//! different moments.
//!
//! A frame is on the air from the moment a radio is in transmit mode with
//! data in its FIFO. Receivers that are listening on the same channel lock
//! on to it when its sync word has been sent and get the frame plus footer
//! in their FIFO when it ends. Two frames on the air at the same time
//! corrupt each other.
//!
//! # Example
//! ```
//! use tdma_mac::phy::{Phy, RadioIrq};
//! use tdma_mac::test_helpers::aether::{Aether, Interrupt};
//!
//! let mut aether = Aether::new();
//!
//! let (mut alice, _) = aether.radio(0);
//! let (mut bob, _) = aether.radio(0);
//!
//! bob.receive().unwrap();
//! bob.arm_interrupt(RadioIrq::EndOfPacket).unwrap();
//!
//! alice.write_fifo(&[2, 0x21, 0x42]).unwrap();
//! alice.transmit().unwrap();
//!
//! let mut interrupts = vec![];
//! while let Some(fired) = aether.advance(1000) {
//!     interrupts.extend(fired);
//! }
//! assert_eq!(interrupts, [(bob.node_id(), Interrupt::Radio(RadioIrq::EndOfPacket))]);
//!
//! let mut frame = [0; 5];
//! bob.read_fifo(&mut frame).unwrap();
//! assert_eq!(&frame[..3], &[2, 0x21, 0x42]);
//! ```

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    fs::File,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use arraydeque::ArrayDeque;
use arrayvec::ArrayVec;
use pcap_file::{
    pcapng::{
        blocks::{
            enhanced_packet::EnhancedPacketBlock,
            interface_description::{InterfaceDescriptionBlock, InterfaceDescriptionOption},
        },
        PcapNgWriter,
    },
    DataLink,
};

use crate::{
    consts::{BEACON_OVERHEAD, MAX_PACKET_SIZE},
    phy::RadioIrq,
    time::{AlarmChannel, TICKS_PER_SECOND},
    wire::Footer,
};

mod radio;
mod timer;

pub use radio::AetherRadio;
pub use timer::AetherTimer;

/// Air time of one byte, about 38.4 kBaud.
pub const BYTE_TICKS: u64 = 7;

const RSSI: u8 = 0xD0;
const LQI: u8 = 0x20;

/// A medium to which radios are connected
///
/// This takes care of routing the packets to the right radios and of
/// raising their interrupts at the right moment.
pub struct Aether {
    inner: Arc<Mutex<AetherInner>>,
}

impl Default for Aether {
    fn default() -> Self {
        Self::new()
    }
}

impl Aether {
    /// Create a new empty aether
    pub fn new() -> Self {
        let inner = AetherInner {
            now: 0,
            nodes: BTreeMap::new(),
            alarms: BTreeMap::new(),
            packets: Vec::new(),
            next_packet_id: 0,
            stats: AirStats::default(),
            pcap_dump: None,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Create a radio and its timer which live in the aether.
    ///
    /// The timer reads the global clock plus `clock_offset`.
    pub fn radio(&mut self, clock_offset: u16) -> (AetherRadio, AetherTimer) {
        let node_id = NodeId::new();
        let node = Node {
            channel: 0,
            mode: Mode::Off,
            rx_fifo: ArrayDeque::new(),
            rx_overflow: false,
            tx_fifo: ArrayVec::new(),
            sync_armed: false,
            eop_armed: false,
            clock_offset,
            receiving: None,
            transmitting: None,
        };

        let old = self.inner().nodes.insert(node_id, node);
        assert!(old.is_none(), "node_id must be unique");

        let radio = AetherRadio {
            inner: Arc::clone(&self.inner),
            node_id,
        };
        let timer = AetherTimer {
            inner: Arc::clone(&self.inner),
            node_id,
        };

        (radio, timer)
    }

    /// Take a radio out of the aether together with its alarms.
    ///
    /// Frames it already put on the air still arrive.
    pub fn remove(&mut self, node_id: NodeId) {
        let mut inner = self.inner();
        inner.nodes.remove(&node_id);
        inner.alarms.retain(|(id, _), _| *id != node_id);
    }

    /// The global time in ticks since the aether was created.
    pub fn now(&self) -> u64 {
        self.inner().now
    }

    pub fn stats(&self) -> AirStats {
        self.inner().stats
    }

    pub fn start_trace(&mut self, file: File) {
        self.inner().start_trace(file);
    }

    pub fn stop_trace(&mut self) {
        self.inner().stop_trace();
    }

    /// Move time to the next event, but not past `deadline`.
    ///
    /// Returns the interrupts raised at that moment or `None` once the
    /// deadline is reached. The aether is not locked while the caller
    /// handles the interrupts, so handlers are free to use their radio and timer.
    pub fn advance(&mut self, deadline: u64) -> Option<Vec<(NodeId, Interrupt)>> {
        let mut inner = self.inner();

        let Some(at) = inner.next_event().filter(|at| *at <= deadline) else {
            inner.now = inner.now.max(deadline);
            return None;
        };
        inner.now = at;

        let mut interrupts = Vec::new();
        inner.end_packets(&mut interrupts);
        inner.sync_packets(&mut interrupts);
        inner.fire_alarms(&mut interrupts);

        Some(interrupts)
    }

    fn inner(&self) -> MutexGuard<AetherInner> {
        self.inner.lock().unwrap()
    }
}

/// An interrupt line of a simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Alarm(AlarmChannel),
    Radio(RadioIrq),
}

/// Counters of what happened on the air.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AirStats {
    /// Frames put on the air
    pub sent: usize,
    /// Frames that ended up in a receive FIFO
    pub delivered: usize,
    /// Frames damaged by another frame on the air
    pub collisions: usize,
}

pub struct AetherInner {
    now: u64,
    nodes: BTreeMap<NodeId, Node>,
    alarms: BTreeMap<(NodeId, AlarmChannel), Alarm>,
    packets: Vec<AirPacket>,
    next_packet_id: u64,
    stats: AirStats,
    pcap_dump: Option<(PcapNgWriter<File>, HashMap<NodeId, u32>)>,
}

impl Debug for AetherInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("AetherInner")
            .field("now", &self.now)
            .field("nodes", &self.nodes)
            .field("alarms", &self.alarms)
            .field("packets", &self.packets)
            .field("pcap_dump", &self.pcap_dump.as_ref().map(|(_, h)| ((), h)))
            .finish()
    }
}

impl AetherInner {
    pub fn start_trace(&mut self, file: File) {
        if self.pcap_dump.is_some() {
            panic!("Already capturing pcap");
        }
        self.pcap_dump = Some((PcapNgWriter::new(file).unwrap(), HashMap::new()));
    }

    pub fn stop_trace(&mut self) {
        self.pcap_dump = None;
    }

    fn node(&mut self, node_id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(&node_id)
            .expect("a radio is never used after its removal")
    }

    fn local_now(&self, node_id: NodeId) -> u16 {
        let offset = self
            .nodes
            .get(&node_id)
            .expect("a timer is never used after its removal")
            .clock_offset;
        (self.now as u16).wrapping_add(offset)
    }

    fn next_event(&self) -> Option<u64> {
        let packets = self
            .packets
            .iter()
            .map(|p| if p.synced { p.end_at } else { p.sync_at });
        let alarms = self.alarms.values().map(|alarm| alarm.at);

        packets.chain(alarms).min()
    }

    fn trace(&mut self, node_id: NodeId, data: &[u8]) {
        let now = self.now;
        let Some((pcap, nodes)) = &mut self.pcap_dump else {
            return;
        };

        let len = nodes.len();
        let interface_id = *nodes.entry(node_id).or_insert_with(|| {
            pcap.write_pcapng_block(InterfaceDescriptionBlock {
                linktype: DataLink::USER0,
                snaplen: MAX_PACKET_SIZE as u32,
                options: vec![InterfaceDescriptionOption::IfName(
                    format!("{node_id:?}").into(),
                )],
            })
            .unwrap();

            len as u32
        });

        let nanos = now * 1_000_000_000 / u64::from(TICKS_PER_SECOND);
        let block = EnhancedPacketBlock {
            interface_id,
            timestamp: std::time::Duration::from_nanos(nanos),
            original_len: data.len() as u32,
            data: Cow::Borrowed(data),
            options: vec![],
        };
        pcap.write_pcapng_block(block).unwrap();
    }

    /// Put the content of the transmit FIFO on the air if the radio is ready for it.
    fn start_transmission(&mut self, node_id: NodeId) {
        let now = self.now;
        let id = self.next_packet_id;

        let node = self.node(node_id);
        if node.mode != Mode::Tx || node.tx_fifo.is_empty() || node.transmitting.is_some() {
            return;
        }
        node.transmitting = Some(id);

        let data = node.tx_fifo.clone();
        let sync_at = now + u64::from(BEACON_OVERHEAD.ticks());
        let packet = AirPacket {
            id,
            from: node_id,
            channel: node.channel,
            end_at: sync_at + data.len() as u64 * BYTE_TICKS,
            sync_at,
            synced: false,
            data,
        };

        log::trace!("{node_id:?} sends {:02X?} at {now}", &packet.data[..]);

        self.trace(node_id, &packet.data);
        self.next_packet_id += 1;
        self.stats.sent += 1;
        self.packets.push(packet);
    }

    fn end_packets(&mut self, interrupts: &mut Vec<(NodeId, Interrupt)>) {
        let now = self.now;
        let (ended, in_flight): (Vec<_>, Vec<_>) = std::mem::take(&mut self.packets)
            .into_iter()
            .partition(|p| p.synced && p.end_at <= now);
        self.packets = in_flight;

        for packet in ended {
            for (id, node) in &mut self.nodes {
                if *id == packet.from && node.transmitting == Some(packet.id) {
                    node.transmitting = None;
                    node.tx_fifo.clear();
                    node.mode = Mode::Idle;
                    if std::mem::take(&mut node.eop_armed) {
                        interrupts.push((*id, Interrupt::Radio(RadioIrq::EndOfPacket)));
                    }
                    continue;
                }

                let Some(reception) = node.receiving.filter(|r| r.packet == packet.id) else {
                    continue;
                };
                node.receiving = None;

                let footer = Footer::new(RSSI, !reception.corrupted, LQI);
                for byte in packet.data.iter().chain(&[footer.rssi, footer.crc]) {
                    if node.rx_fifo.push_back(*byte).is_err() {
                        node.rx_overflow = true;
                    }
                }
                self.stats.delivered += 1;

                if std::mem::take(&mut node.eop_armed) {
                    interrupts.push((*id, Interrupt::Radio(RadioIrq::EndOfPacket)));
                }
            }
        }
    }

    fn sync_packets(&mut self, interrupts: &mut Vec<(NodeId, Interrupt)>) {
        let now = self.now;

        for index in 0..self.packets.len() {
            let packet = &self.packets[index];
            if packet.synced || packet.sync_at > now {
                continue;
            }
            let (id, channel) = (packet.id, packet.channel);

            let collision = self
                .packets
                .iter()
                .any(|other| other.id != id && other.channel == channel && other.synced);
            if collision {
                self.stats.collisions += 1;
            }
            self.packets[index].synced = true;

            for (node_id, node) in &mut self.nodes {
                if node.mode != Mode::Rx || node.channel != channel {
                    continue;
                }

                match &mut node.receiving {
                    Some(current) => current.corrupted = true,
                    None => {
                        node.receiving = Some(Reception {
                            packet: id,
                            corrupted: collision,
                        });
                        if std::mem::take(&mut node.sync_armed) {
                            interrupts.push((*node_id, Interrupt::Radio(RadioIrq::SyncDetected)));
                        }
                    }
                }
            }
        }
    }

    fn fire_alarms(&mut self, interrupts: &mut Vec<(NodeId, Interrupt)>) {
        let now = self.now;

        let due: Vec<_> = self
            .alarms
            .iter()
            .filter(|(_, alarm)| alarm.at <= now)
            .map(|(key, _)| *key)
            .collect();

        for key in due {
            let alarm = self.alarms[&key];
            if alarm.period == 0 {
                self.alarms.remove(&key);
            } else {
                self.alarms.insert(
                    key,
                    Alarm {
                        at: alarm.at + u64::from(alarm.period),
                        period: alarm.period,
                    },
                );
            }

            let (node_id, channel) = key;
            interrupts.push((node_id, Interrupt::Alarm(channel)));
        }
    }
}

#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy)]
pub struct NodeId(usize);

impl NodeId {
    fn new() -> Self {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Off,
    Idle,
    Rx,
    Tx,
}

#[derive(Debug)]
struct Node {
    channel: u8,
    mode: Mode,
    rx_fifo: ArrayDeque<u8, MAX_PACKET_SIZE>,
    rx_overflow: bool,
    tx_fifo: ArrayVec<u8, MAX_PACKET_SIZE>,
    sync_armed: bool,
    eop_armed: bool,
    clock_offset: u16,
    receiving: Option<Reception>,
    transmitting: Option<u64>,
}

impl Node {
    fn set_mode(&mut self, mode: Mode) {
        if mode != Mode::Rx {
            self.receiving = None;
        }
        if mode != Mode::Tx {
            self.transmitting = None;
        }
        self.mode = mode;
    }
}

#[derive(Debug, Clone, Copy)]
struct Reception {
    packet: u64,
    corrupted: bool,
}

#[derive(Debug, Clone, Copy)]
struct Alarm {
    at: u64,
    period: u16,
}

#[derive(Debug, Clone)]
struct AirPacket {
    id: u64,
    from: NodeId,
    channel: u8,
    data: ArrayVec<u8, MAX_PACKET_SIZE>,
    sync_at: u64,
    end_at: u64,
    synced: bool,
}
