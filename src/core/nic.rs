//! The bridge between raw Ethernet frames and the stack's link endpoint.

use std::sync::{
    Arc,
    Weak,
};

use crate::core::dev::{
    Device,
    Receiver,
};
use crate::core::link::{
    Endpoint as LinkEndpoint,
    PacketBuffer,
    TransmitNotifiable,
};
use crate::core::neighbor::NeighborCache;
use crate::core::repr::{
    ethernet,
    EthernetAddress,
    EthernetFrame,
};
use crate::core::stack::NetworkProtocol;
use crate::{
    Error,
    Result,
};

/// A virtual Ethernet NIC bound to a physical device.
///
/// `receive` and `drain_and_transmit` are driven by two independent triggers
/// (the device receive handler and link endpoint notifications) which may run
/// concurrently. Neither blocks or reports errors upwards; a bad frame is
/// simply lost.
pub struct Nic {
    mac: EthernetAddress,
    link: Arc<LinkEndpoint>,
    device: Option<Arc<dyn Device>>,
    neighbors: Arc<NeighborCache>,
}

/// Registered with the device and the link endpoint. Holds a weak reference
/// so neither keeps the NIC alive.
struct Hook {
    nic: Weak<Nic>,
}

impl Receiver for Hook {
    fn receive(&self, frame: &[u8]) {
        if let Some(nic) = self.nic.upgrade() {
            nic.receive(frame);
        }
    }
}

impl TransmitNotifiable for Hook {
    fn write_notify(&self) {
        if let Some(nic) = self.nic.upgrade() {
            nic.drain_and_transmit();
        }
    }
}

impl Nic {
    /// Creates a NIC and binds it to the device and link endpoint.
    ///
    /// The MAC must be exactly 6 bytes and a link endpoint is required. With a
    /// device present, the hardware is initialized with the MAC, its receive
    /// handler is pointed at this NIC and the NIC starts listening for
    /// transmit notifications. Without a device, frames can only be moved by
    /// calling `receive` and `tx` directly.
    pub fn new(
        mac: &[u8],
        link: Option<Arc<LinkEndpoint>>,
        device: Option<Arc<dyn Device>>,
        neighbors: Arc<NeighborCache>,
    ) -> Result<Arc<Nic>> {
        let link = link.ok_or_else(|| {
            Error::InvalidConfiguration("missing link endpoint".to_string())
        })?;
        let mac = EthernetAddress::try_new(mac)?;

        let nic = Arc::new(Nic {
            mac,
            link,
            device,
            neighbors,
        });
        nic.init()?;

        Ok(nic)
    }

    fn init(self: &Arc<Self>) -> Result<()> {
        let device = match self.device {
            Some(ref device) => device,
            None => return Ok(()),
        };

        let hook = Arc::new(Hook {
            nic: Arc::downgrade(self),
        });

        device.set_receive_handler(hook.clone());
        device.init(self.mac)?;
        self.link.add_notify(hook);

        debug!("NIC {} bound to device.", self.mac);
        Ok(())
    }

    pub fn mac(&self) -> EthernetAddress {
        self.mac
    }

    pub fn link(&self) -> &Arc<LinkEndpoint> {
        &self.link
    }

    /// Returns the link address currently used for a protocol's gateway.
    pub fn gateway_link_addr(&self, protocol: NetworkProtocol) -> EthernetAddress {
        self.neighbors.gateway_link_addr(protocol)
    }

    /// Receives a single Ethernet frame and injects it into the link endpoint.
    /// Frames shorter than an Ethernet header are dropped.
    pub fn receive(&self, buffer: &[u8]) {
        let frame = match ethernet::decode(buffer) {
            Some(frame) => frame,
            None => {
                trace!(
                    "Dropping {} byte frame, shorter than {} byte header.",
                    buffer.len(),
                    EthernetFrame::<&[u8]>::HEADER_LEN
                );
                return;
            }
        };

        let packet = PacketBuffer::inbound(frame.header(), frame.payload());

        self.link
            .inject_inbound(NetworkProtocol(frame.payload_type()), packet);
    }

    /// Dequeues a single packet from the link endpoint and returns it as an
    /// encoded Ethernet frame, or None if nothing is queued.
    pub fn tx(&self) -> Option<Vec<u8>> {
        let packet = self.link.read()?;
        let dst_addr = self.resolve(&packet);

        Some(ethernet::encode(
            dst_addr,
            self.mac,
            packet.protocol().0,
            packet.as_slices(),
        ))
    }

    /// Sends every queued packet to the device, one device call per packet.
    pub fn drain_and_transmit(&self) {
        let device = match self.device {
            Some(ref device) => device,
            None => return,
        };

        while let Some(frame) = self.tx() {
            if let Err(err) = device.transmit(&frame) {
                warn!("Error transmitting {} byte frame with {:?}.", frame.len(), err);
            }
        }
    }

    /// Prefers the link address the stack resolved for the route. Otherwise
    /// traffic for the gateway goes to its cached link address and everything
    /// else is broadcast.
    fn resolve(&self, packet: &PacketBuffer) -> EthernetAddress {
        let route = packet.egress_route();

        match route.and_then(|route| route.remote_link_addr) {
            Some(addr) => addr,
            None => self
                .neighbors
                .resolve(packet.protocol(), route.and_then(|route| route.next_hop)),
        }
    }
}
