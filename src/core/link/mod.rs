//! Virtual link endpoint shared by the bridge and the protocol stack.
//!
//! Inbound packets are handed straight to the stack's dispatcher. Outbound
//! packets are queued in a bounded FIFO and every enqueue raises a transmit
//! notification, upon which the NIC drains the queue towards the hardware.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use spin::RwLock;

use crate::core::repr::{
    EthernetAddress,
    IpAddress,
};
use crate::core::stack::NetworkProtocol;
use crate::{
    Error,
    Result,
};

bitflags! {
    /// Link endpoint features reported to the stack.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LinkCapabilities: u32 {
        /// Outgoing packets need a resolved link address, i.e. ARP/NDP.
        const RESOLUTION_REQUIRED = 1 << 0;
    }
}

/// Where an outgoing packet is headed, as computed by the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EgressRoute {
    /// Next hop network address, the gateway for off-link destinations.
    pub next_hop: Option<IpAddress>,
    /// Link address of the next hop when the stack already resolved it.
    pub remote_link_addr: Option<EthernetAddress>,
}

/// A network layer packet travelling through the link endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketBuffer {
    protocol: NetworkProtocol,
    link_header: Vec<u8>,
    views: Vec<Vec<u8>>,
    egress_route: Option<EgressRoute>,
}

impl PacketBuffer {
    /// Creates a packet received from the wire. The protocol is set when the
    /// packet is injected.
    pub fn inbound(link_header: &[u8], payload: &[u8]) -> PacketBuffer {
        PacketBuffer {
            protocol: NetworkProtocol(0),
            link_header: link_header.to_vec(),
            views: vec![payload.to_vec()],
            egress_route: None,
        }
    }

    /// Creates a packet to be sent, made of the on-wire views in order
    /// (typically network header, transport header, payload).
    pub fn outbound(
        protocol: NetworkProtocol,
        egress_route: EgressRoute,
        views: Vec<Vec<u8>>,
    ) -> PacketBuffer {
        PacketBuffer {
            protocol,
            link_header: Vec::new(),
            views,
            egress_route: Some(egress_route),
        }
    }

    pub fn protocol(&self) -> NetworkProtocol {
        self.protocol
    }

    pub fn link_header(&self) -> &[u8] {
        &self.link_header
    }

    pub fn egress_route(&self) -> Option<&EgressRoute> {
        self.egress_route.as_ref()
    }

    /// Iterates over the on-wire byte slices of the packet.
    pub fn as_slices(&self) -> impl Iterator<Item = &[u8]> {
        self.views.iter().map(|view| &view[..])
    }

    /// Returns the number of network layer bytes.
    pub fn size(&self) -> usize {
        self.views.iter().map(|view| view.len()).sum()
    }

    /// Returns the network layer bytes as a single buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        self.views.concat()
    }
}

/// The stack side sink for inbound packets.
pub trait NetworkDispatcher: Send + Sync {
    fn deliver_network_packet(&self, protocol: NetworkProtocol, packet: PacketBuffer);
}

/// Notified whenever a packet is queued for transmission.
pub trait TransmitNotifiable: Send + Sync {
    fn write_notify(&self);
}

/// A channel style link endpoint with a bounded outbound queue.
pub struct Endpoint {
    queue: ArrayQueue<PacketBuffer>,
    mtu: usize,
    link_addr: EthernetAddress,
    capabilities: LinkCapabilities,
    dispatcher: RwLock<Option<Arc<dyn NetworkDispatcher>>>,
    notify: RwLock<Vec<Arc<dyn TransmitNotifiable>>>,
}

impl Endpoint {
    /// Creates an endpoint queueing at most capacity outbound packets.
    pub fn new(capacity: usize, mtu: usize, link_addr: EthernetAddress) -> Endpoint {
        Endpoint {
            queue: ArrayQueue::new(capacity.max(1)),
            mtu,
            link_addr,
            capabilities: LinkCapabilities::empty(),
            dispatcher: RwLock::new(None),
            notify: RwLock::new(Vec::new()),
        }
    }

    /// Adds capabilities, only possible before the endpoint is shared.
    pub fn with_capabilities(mut self, capabilities: LinkCapabilities) -> Endpoint {
        self.capabilities |= capabilities;
        self
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn link_address(&self) -> EthernetAddress {
        self.link_addr
    }

    pub fn capabilities(&self) -> LinkCapabilities {
        self.capabilities
    }

    /// Returns the maximum number of queued outbound packets.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Returns the number of queued outbound packets.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Attaches the stack, replacing any previous dispatcher.
    pub fn attach(&self, dispatcher: Arc<dyn NetworkDispatcher>) {
        *self.dispatcher.write() = Some(dispatcher);
    }

    pub fn is_attached(&self) -> bool {
        self.dispatcher.read().is_some()
    }

    /// Registers an observer for transmit notifications.
    pub fn add_notify(&self, notify: Arc<dyn TransmitNotifiable>) {
        self.notify.write().push(notify);
    }

    /// Hands a received packet to the stack. Packets arriving before the stack
    /// is attached are dropped.
    pub fn inject_inbound(&self, protocol: NetworkProtocol, mut packet: PacketBuffer) {
        packet.protocol = protocol;

        match *self.dispatcher.read() {
            Some(ref dispatcher) => dispatcher.deliver_network_packet(protocol, packet),
            None => trace!("Dropping inbound {} packet, link is not attached.", protocol),
        }
    }

    /// Queues a packet for transmission and notifies observers. Fails with
    /// `Error::Exhausted` when the queue is full.
    pub fn write_packet(&self, packet: PacketBuffer) -> Result<()> {
        if self.queue.push(packet).is_err() {
            warn!("Link queue is full, dropping outbound packet.");
            return Err(Error::Exhausted);
        }

        for notify in self.notify.read().iter() {
            notify.write_notify();
        }

        Ok(())
    }

    /// Dequeues the oldest outbound packet, if any, without blocking.
    pub fn read(&self) -> Option<PacketBuffer> {
        self.queue.pop()
    }
}
