//! The protocol stack the bridge feeds.
//!
//! TCP, IP, ARP and NDP logic live behind the `Stack` trait. The bridge only
//! needs to create a NIC on top of a link endpoint, install addresses and
//! routes, open endpoints and hand dial/listen requests through.

use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use std::io::{
    Read,
    Write,
};
use std::sync::Arc;
use std::time::Instant;

use crate::core::link::Endpoint as LinkEndpoint;
use crate::core::repr::{
    eth_types,
    EthernetAddress,
    FullAddress,
    IpAddress,
    IpCidr,
};

/// Numeric identifier of a NIC within a stack.
pub type NicId = u32;

/// Network layer protocol number, which is the protocol's EtherType.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NetworkProtocol(pub u16);

impl NetworkProtocol {
    pub const ARP: NetworkProtocol = NetworkProtocol(eth_types::ARP);

    pub const IPV4: NetworkProtocol = NetworkProtocol(eth_types::IPV4);

    pub const IPV6: NetworkProtocol = NetworkProtocol(eth_types::IPV6);
}

impl Display for NetworkProtocol {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{:#06x}", self.0)
    }
}

/// Transport layer protocol number as carried in the IP header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransportProtocol(pub u8);

impl TransportProtocol {
    pub const ICMPV4: TransportProtocol = TransportProtocol(1);

    pub const TCP: TransportProtocol = TransportProtocol(6);

    pub const UDP: TransportProtocol = TransportProtocol(17);

    pub const ICMPV6: TransportProtocol = TransportProtocol(58);
}

/// Protocols a stack is created with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackOptions {
    pub network_protocols: Vec<NetworkProtocol>,
    pub transport_protocols: Vec<TransportProtocol>,
}

lazy_static! {
    /// IPv4 only stack: ARP and IPv4 with TCP, ICMPv4 and UDP.
    pub static ref DEFAULT_STACK_OPTIONS: StackOptions = StackOptions {
        network_protocols: vec![NetworkProtocol::ARP, NetworkProtocol::IPV4],
        transport_protocols: vec![
            TransportProtocol::TCP,
            TransportProtocol::ICMPV4,
            TransportProtocol::UDP,
        ],
    };
}

impl Default for StackOptions {
    fn default() -> StackOptions {
        DEFAULT_STACK_OPTIONS.clone()
    }
}

impl StackOptions {
    pub fn has_network_protocol(&self, protocol: NetworkProtocol) -> bool {
        self.network_protocols.contains(&protocol)
    }

    pub fn has_transport_protocol(&self, protocol: TransportProtocol) -> bool {
        self.transport_protocols.contains(&protocol)
    }
}

/// An address with prefix bound to a network protocol on a NIC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolAddress {
    pub protocol: NetworkProtocol,
    pub address: IpCidr,
}

/// A route table entry. Routes without a gateway are directly connected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub destination: IpCidr,
    pub gateway: Option<IpAddress>,
    pub nic: NicId,
}

/// A neighbor table entry as reported by the stack's link address resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighborEntry {
    pub addr: IpAddress,
    /// None while resolution is incomplete.
    pub link_addr: Option<EthernetAddress>,
}

/// Receives neighbor table events. Registered when the stack is created.
pub trait NeighborObserver: Send + Sync {
    fn on_neighbor_added(&self, nic: NicId, entry: &NeighborEntry);

    fn on_neighbor_changed(&self, nic: NicId, entry: &NeighborEntry);

    fn on_neighbor_removed(&self, nic: NicId, entry: &NeighborEntry);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates a protocol the stack was not created with.
    UnknownProtocol,
    /// Indicates a NIC id that is already in use.
    DuplicateNicId(NicId),
    /// Indicates a NIC id that does not exist.
    UnknownNicId(NicId),
    /// Indicates an address that is already assigned.
    DuplicateAddress,
    /// Indicates a NIC without an address for the protocol.
    NoAddress,
    /// Indicates a port that is already bound.
    PortInUse(u16),
    /// Indicates a destination with no matching route.
    NoRoute,
    /// Indicates a peer refused the connection.
    ConnectionRefused,
    /// Indicates a deadline expired before the operation completed.
    Timeout,
    /// Indicates an operation would block.
    WouldBlock,
    /// Indicates a miscellaneous error with a message.
    Unknown(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Error::UnknownProtocol => write!(f, "unknown protocol"),
            Error::DuplicateNicId(id) => write!(f, "duplicate NIC id {}", id),
            Error::UnknownNicId(id) => write!(f, "unknown NIC id {}", id),
            Error::DuplicateAddress => write!(f, "duplicate address"),
            Error::NoAddress => write!(f, "no address"),
            Error::PortInUse(port) => write!(f, "port {} in use", port),
            Error::NoRoute => write!(f, "no route to host"),
            Error::ConnectionRefused => write!(f, "connection refused"),
            Error::Timeout => write!(f, "operation timed out"),
            Error::WouldBlock => write!(f, "operation would block"),
            Error::Unknown(ref msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A stream or datagram connection.
pub trait Conn: Read + Write + Send {
    fn local_addr(&self) -> FullAddress;

    /// None for unconnected datagram sockets.
    fn remote_addr(&self) -> Option<FullAddress>;
}

/// A listening stream socket.
pub trait Listener: Send {
    /// Accepts a pending connection.
    fn accept(&mut self) -> Result<Box<dyn Conn>>;

    fn local_addr(&self) -> FullAddress;
}

/// A raw transport endpoint.
pub trait Endpoint: Send {
    fn bind(&mut self, addr: FullAddress) -> Result<()>;
}

/// A TCP/IP protocol stack.
///
/// Implementations synchronize internally, every method takes `&self` and may
/// be called concurrently with frames entering or leaving the NIC.
pub trait Stack: Send + Sync {
    /// Creates a stack with the given protocols. The observer receives every
    /// neighbor table event for the lifetime of the stack.
    fn new(options: &StackOptions, observer: Arc<dyn NeighborObserver>) -> Result<Self>
    where
        Self: Sized;

    /// Creates a NIC on top of a link endpoint. The stack attaches itself to
    /// the endpoint to receive inbound packets.
    fn create_nic(&self, id: NicId, link: Arc<LinkEndpoint>) -> Result<()>;

    fn add_protocol_address(&self, id: NicId, addr: ProtocolAddress) -> Result<()>;

    /// Returns the primary address of a NIC for a protocol.
    fn main_nic_address(&self, id: NicId, protocol: NetworkProtocol) -> Result<IpCidr>;

    fn route_table(&self) -> Vec<Route>;

    /// Replaces the whole route table.
    fn set_route_table(&self, routes: Vec<Route>);

    fn new_endpoint(
        &self,
        transport: TransportProtocol,
        network: NetworkProtocol,
    ) -> Result<Box<dyn Endpoint>>;

    fn listen_tcp(&self, addr: FullAddress, network: NetworkProtocol) -> Result<Box<dyn Listener>>;

    /// Connects to a TCP endpoint, failing with `Error::Timeout` once the
    /// deadline passes. Partially established state is released on failure.
    fn dial_tcp(
        &self,
        addr: FullAddress,
        network: NetworkProtocol,
        deadline: Option<Instant>,
    ) -> Result<Box<dyn Conn>>;

    fn dial_udp(
        &self,
        local: Option<FullAddress>,
        remote: Option<FullAddress>,
        network: NetworkProtocol,
    ) -> Result<Box<dyn Conn>>;
}
