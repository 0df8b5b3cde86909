use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    phy::{Phy, RadioIrq},
    test_helpers::aether::{AetherInner, Mode, Node, NodeId},
};

/// Single radio connected to an [`Aether`](super::Aether)
#[derive(Debug)]
pub struct AetherRadio {
    pub(super) inner: Arc<Mutex<AetherInner>>,
    pub(super) node_id: NodeId,
}

impl AetherRadio {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn aether(&mut self) -> MutexGuard<AetherInner> {
        self.inner.lock().unwrap()
    }

    fn with_node<R>(&mut self, f: impl FnOnce(&mut Node) -> R) -> R {
        let node_id = self.node_id;
        let mut aether = self.aether();
        f(aether.node(node_id))
    }

    fn set_mode(&mut self, mode: Mode) {
        let node_id = self.node_id;
        let mut aether = self.aether();
        aether.node(node_id).set_mode(mode);
        aether.start_transmission(node_id);
    }
}

impl Phy for AetherRadio {
    type Error = core::convert::Infallible;

    fn init(&mut self, channel: u8) -> Result<(), Self::Error> {
        self.with_node(|node| {
            node.channel = channel;
            node.rx_fifo.clear();
            node.rx_overflow = false;
            node.tx_fifo.clear();
            node.sync_armed = false;
            node.eop_armed = false;
            node.set_mode(Mode::Idle);
        });
        Ok(())
    }

    fn idle(&mut self) -> Result<(), Self::Error> {
        self.set_mode(Mode::Idle);
        Ok(())
    }

    fn flush_rx(&mut self) -> Result<(), Self::Error> {
        self.with_node(|node| {
            node.rx_fifo.clear();
            node.rx_overflow = false;
        });
        Ok(())
    }

    fn flush_tx(&mut self) -> Result<(), Self::Error> {
        self.with_node(|node| node.tx_fifo.clear());
        Ok(())
    }

    fn calibrate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn transmit(&mut self) -> Result<(), Self::Error> {
        self.set_mode(Mode::Tx);
        Ok(())
    }

    fn receive(&mut self) -> Result<(), Self::Error> {
        self.set_mode(Mode::Rx);
        Ok(())
    }

    fn power_down(&mut self) -> Result<(), Self::Error> {
        self.set_mode(Mode::Off);
        Ok(())
    }

    fn write_fifo(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let node_id = self.node_id;
        let mut aether = self.aether();
        if aether.node(node_id).tx_fifo.try_extend_from_slice(data).is_err() {
            log::warn!("Transmit FIFO of {node_id:?} is full");
        }
        aether.start_transmission(node_id);
        Ok(())
    }

    fn read_fifo(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.with_node(|node| {
            for byte in buffer {
                *byte = node.rx_fifo.pop_front().unwrap_or_default();
            }
        });
        Ok(())
    }

    fn rx_bytes(&mut self) -> Result<u8, Self::Error> {
        Ok(self.with_node(|node| {
            let count = node.rx_fifo.len() as u8;
            if node.rx_overflow {
                // The overflow flag sits on top of the byte count.
                0x80 | count
            } else {
                count
            }
        }))
    }

    fn arm_interrupt(&mut self, irq: RadioIrq) -> Result<(), Self::Error> {
        self.with_node(|node| match irq {
            RadioIrq::SyncDetected => node.sync_armed = true,
            RadioIrq::EndOfPacket => node.eop_armed = true,
        });
        Ok(())
    }

    fn disarm_interrupt(&mut self, irq: RadioIrq) -> Result<(), Self::Error> {
        self.with_node(|node| match irq {
            RadioIrq::SyncDetected => node.sync_armed = false,
            RadioIrq::EndOfPacket => node.eop_armed = false,
        });
        Ok(())
    }
}
