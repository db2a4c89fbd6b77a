//! Link address tracking for the configured gateways.

use std::sync::atomic::{
    AtomicU64,
    Ordering,
};

use byteorder::{
    ByteOrder,
    NetworkEndian,
};

use crate::core::repr::{
    EthernetAddress,
    IpAddress,
};
use crate::core::stack::{
    NeighborEntry,
    NeighborObserver,
    NetworkProtocol,
    NicId,
};

/// The resolved link address of a gateway.
///
/// Written by neighbor events, read for every transmitted frame. The 48 bit
/// address is packed into a single atomic word so readers never see a torn
/// value and never block. Unknown is represented by the broadcast address.
#[derive(Debug)]
pub struct GatewayLinkAddress(AtomicU64);

impl GatewayLinkAddress {
    pub fn new() -> GatewayLinkAddress {
        GatewayLinkAddress(AtomicU64::new(pack(EthernetAddress::BROADCAST)))
    }

    pub fn get(&self) -> EthernetAddress {
        unpack(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, addr: EthernetAddress) {
        self.0.store(pack(addr), Ordering::Release);
    }

    /// Falls back to the broadcast address.
    pub fn reset(&self) {
        self.set(EthernetAddress::BROADCAST);
    }
}

impl Default for GatewayLinkAddress {
    fn default() -> GatewayLinkAddress {
        GatewayLinkAddress::new()
    }
}

fn pack(addr: EthernetAddress) -> u64 {
    NetworkEndian::read_uint(addr.as_bytes(), 6)
}

fn unpack(word: u64) -> EthernetAddress {
    let mut addr = [0; 6];
    NetworkEndian::write_uint(&mut addr, word, 6);
    EthernetAddress::new(addr)
}

/// A configured gateway and the link address it last resolved to.
#[derive(Debug)]
struct Gateway {
    addr: IpAddress,
    link_addr: GatewayLinkAddress,
}

impl Gateway {
    fn new(addr: IpAddress) -> Gateway {
        Gateway {
            addr,
            link_addr: GatewayLinkAddress::new(),
        }
    }
}

/// Observes the stack's neighbor table and mirrors the entries of the
/// configured gateways, one per address family, each into its own
/// `GatewayLinkAddress`.
#[derive(Debug, Default)]
pub struct NeighborCache {
    ipv4: Option<Gateway>,
    ipv6: Option<Gateway>,
}

impl NeighborCache {
    /// Creates a cache tracking the given gateways. Unspecified addresses are
    /// ignored, a later gateway of the same family replaces an earlier one.
    pub fn new(gateways: Vec<IpAddress>) -> NeighborCache {
        let mut cache = NeighborCache::default();

        for addr in gateways.into_iter().filter(|addr| !addr.is_unspecified()) {
            match addr {
                IpAddress::Ipv4(_) => cache.ipv4 = Some(Gateway::new(addr)),
                IpAddress::Ipv6(_) => cache.ipv6 = Some(Gateway::new(addr)),
            }
        }

        cache
    }

    /// Returns the tracked gateway of a network protocol, if any.
    pub fn gateway(&self, protocol: NetworkProtocol) -> Option<IpAddress> {
        self.by_protocol(protocol).map(|gateway| gateway.addr)
    }

    /// Returns the link address of a protocol's gateway, broadcast while
    /// unresolved or when no gateway is configured.
    pub fn gateway_link_addr(&self, protocol: NetworkProtocol) -> EthernetAddress {
        match self.by_protocol(protocol) {
            Some(gateway) => gateway.link_addr.get(),
            None => EthernetAddress::BROADCAST,
        }
    }

    /// Picks the destination link address for a packet the stack did not
    /// resolve itself.
    ///
    /// Packets headed for the protocol's gateway (or with no next hop) use the
    /// gateway's cached link address. Anything else, on-link neighbors and
    /// ARP included, is broadcast.
    pub fn resolve(&self, protocol: NetworkProtocol, next_hop: Option<IpAddress>) -> EthernetAddress {
        match self.by_protocol(protocol) {
            Some(gateway) if next_hop.map_or(true, |hop| hop == gateway.addr) => {
                gateway.link_addr.get()
            }
            _ => EthernetAddress::BROADCAST,
        }
    }

    fn by_protocol(&self, protocol: NetworkProtocol) -> Option<&Gateway> {
        match protocol {
            NetworkProtocol::IPV4 => self.ipv4.as_ref(),
            NetworkProtocol::IPV6 => self.ipv6.as_ref(),
            _ => None,
        }
    }

    fn by_addr(&self, addr: &IpAddress) -> Option<&Gateway> {
        self.ipv4
            .iter()
            .chain(self.ipv6.iter())
            .find(|gateway| gateway.addr == *addr)
    }

    fn update(&self, nic: NicId, entry: &NeighborEntry) {
        let gateway = match self.by_addr(&entry.addr) {
            Some(gateway) => gateway,
            None => return,
        };

        if let Some(link_addr) = entry.link_addr {
            debug!(
                "Gateway {} on NIC {} resolved to {}.",
                entry.addr, nic, link_addr
            );
            gateway.link_addr.set(link_addr);
        }
    }
}

impl NeighborObserver for NeighborCache {
    fn on_neighbor_added(&self, nic: NicId, entry: &NeighborEntry) {
        self.update(nic, entry);
    }

    fn on_neighbor_changed(&self, nic: NicId, entry: &NeighborEntry) {
        self.update(nic, entry);
    }

    fn on_neighbor_removed(&self, nic: NicId, entry: &NeighborEntry) {
        if let Some(gateway) = self.by_addr(&entry.addr) {
            debug!(
                "Gateway {} on NIC {} removed, falling back to broadcast.",
                entry.addr, nic
            );
            gateway.link_addr.reset();
        }
    }
}
