//! An in-memory stack and device for driving an interface end to end.

#![allow(dead_code)]

use std::collections::{
    HashMap,
    HashSet,
};
use std::io::{
    Read,
    Result as IoResult,
    Write,
};
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex,
};
use std::time::Instant;

use ethbridge::core::dev::{
    Device,
    Receiver,
    Result as DeviceResult,
};
use ethbridge::core::interface::{
    IpConfig,
    Interface,
    Options,
};
use ethbridge::core::link::{
    Endpoint as LinkEndpoint,
    NetworkDispatcher,
    PacketBuffer,
};
use ethbridge::core::repr::{
    EthernetAddress,
    FullAddress,
    IpAddress,
    IpCidr,
    Ipv4Address,
    Ipv4AddressCidr,
};
use ethbridge::core::stack::{
    Conn,
    Endpoint,
    Error,
    Listener,
    NeighborObserver,
    NetworkProtocol,
    NicId,
    ProtocolAddress,
    Result,
    Route,
    Stack,
    StackOptions,
    TransportProtocol,
};

pub const NIC_ID: NicId = 1;

pub const MAC: &str = "1a:55:89:a2:69:41";

lazy_static! {
    /// Default interface MAC address.
    pub static ref DEFAULT_ETH_ADDR: EthernetAddress = MAC.parse().unwrap();

    /// Default interface IPv4 address with a subnet mask.
    pub static ref DEFAULT_IPV4_ADDR_CIDR: Ipv4AddressCidr = {
        Ipv4AddressCidr::new(Ipv4Address::new([10, 0, 0, 2]), 24)
    };

    /// Default interface IPv4 gateway.
    pub static ref DEFAULT_IPV4_GATEWAY: Ipv4Address = Ipv4Address::new([10, 0, 0, 1]);
}

/// Collects packets the link endpoint hands to the stack.
#[derive(Default)]
pub struct Inbound(Mutex<Vec<(NetworkProtocol, PacketBuffer)>>);

impl NetworkDispatcher for Inbound {
    fn deliver_network_packet(&self, protocol: NetworkProtocol, packet: PacketBuffer) {
        self.0.lock().unwrap().push((protocol, packet));
    }
}

pub struct MockConn {
    local: FullAddress,
    remote: Option<FullAddress>,
}

impl Read for MockConn {
    fn read(&mut self, _: &mut [u8]) -> IoResult<usize> {
        Ok(0)
    }
}

impl Write for MockConn {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl Conn for MockConn {
    fn local_addr(&self) -> FullAddress {
        self.local
    }

    fn remote_addr(&self) -> Option<FullAddress> {
        self.remote
    }
}

pub struct MockListener {
    addr: FullAddress,
}

impl Listener for MockListener {
    fn accept(&mut self) -> Result<Box<dyn Conn>> {
        Err(Error::WouldBlock)
    }

    fn local_addr(&self) -> FullAddress {
        self.addr
    }
}

pub struct MockEndpoint {
    binds: Arc<Mutex<Vec<FullAddress>>>,
}

impl Endpoint for MockEndpoint {
    fn bind(&mut self, addr: FullAddress) -> Result<()> {
        if addr.addr.is_unspecified() {
            return Err(Error::NoAddress);
        }
        self.binds.lock().unwrap().push(addr);
        Ok(())
    }
}

/// A stack recording every configuration call, with just enough connection
/// semantics to tell dial from listen.
pub struct MockStack {
    pub options: StackOptions,
    pub observer: Arc<dyn NeighborObserver>,
    pub inbound: Arc<Inbound>,
    pub binds: Arc<Mutex<Vec<FullAddress>>>,
    nics: Mutex<HashMap<NicId, Arc<LinkEndpoint>>>,
    addresses: Mutex<Vec<(NicId, ProtocolAddress)>>,
    routes: Mutex<Vec<Route>>,
    ports: Mutex<HashSet<u16>>,
    tcp_dials: AtomicUsize,
}

impl MockStack {
    pub fn link(&self, id: NicId) -> Arc<LinkEndpoint> {
        self.nics.lock().unwrap()[&id].clone()
    }

    /// Sends a packet the way the stack's network layer would.
    pub fn write_packet(&self, id: NicId, packet: PacketBuffer) -> ethbridge::Result<()> {
        self.link(id).write_packet(packet)
    }

    pub fn addresses(&self) -> Vec<(NicId, ProtocolAddress)> {
        self.addresses.lock().unwrap().clone()
    }

    /// Returns how many TCP dials reached the stack.
    pub fn tcp_dials(&self) -> usize {
        self.tcp_dials.load(Ordering::SeqCst)
    }

    pub fn inbound(&self) -> Vec<(NetworkProtocol, PacketBuffer)> {
        self.inbound.0.lock().unwrap().clone()
    }

    fn has_route(&self, addr: &IpAddress) -> bool {
        self.routes.lock().unwrap().iter().any(|route| {
            match (route.destination, *addr) {
                (IpCidr::Ipv4(cidr), IpAddress::Ipv4(addr)) => cidr.contains(addr),
                _ => false,
            }
        })
    }
}

impl Stack for MockStack {
    fn new(options: &StackOptions, observer: Arc<dyn NeighborObserver>) -> Result<MockStack> {
        if options.network_protocols.is_empty() {
            return Err(Error::UnknownProtocol);
        }

        Ok(MockStack {
            options: options.clone(),
            observer,
            inbound: Arc::new(Inbound::default()),
            binds: Arc::new(Mutex::new(Vec::new())),
            nics: Mutex::new(HashMap::new()),
            addresses: Mutex::new(Vec::new()),
            routes: Mutex::new(Vec::new()),
            ports: Mutex::new(HashSet::new()),
            tcp_dials: AtomicUsize::new(0),
        })
    }

    fn create_nic(&self, id: NicId, link: Arc<LinkEndpoint>) -> Result<()> {
        let mut nics = self.nics.lock().unwrap();
        if nics.contains_key(&id) {
            return Err(Error::DuplicateNicId(id));
        }
        link.attach(self.inbound.clone());
        nics.insert(id, link);
        Ok(())
    }

    fn add_protocol_address(&self, id: NicId, addr: ProtocolAddress) -> Result<()> {
        if !self.nics.lock().unwrap().contains_key(&id) {
            return Err(Error::UnknownNicId(id));
        }
        if !self.options.has_network_protocol(addr.protocol) {
            return Err(Error::UnknownProtocol);
        }

        let mut addresses = self.addresses.lock().unwrap();
        if addresses.iter().any(|&(_, ref a)| a.address == addr.address) {
            return Err(Error::DuplicateAddress);
        }
        addresses.push((id, addr));
        Ok(())
    }

    fn main_nic_address(&self, id: NicId, protocol: NetworkProtocol) -> Result<IpCidr> {
        if !self.nics.lock().unwrap().contains_key(&id) {
            return Err(Error::UnknownNicId(id));
        }

        self.addresses
            .lock()
            .unwrap()
            .iter()
            .find(|&&(nic, ref addr)| nic == id && addr.protocol == protocol)
            .map(|&(_, ref addr)| addr.address)
            .ok_or(Error::NoAddress)
    }

    fn route_table(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }

    fn set_route_table(&self, routes: Vec<Route>) {
        *self.routes.lock().unwrap() = routes;
    }

    fn new_endpoint(
        &self,
        transport: TransportProtocol,
        network: NetworkProtocol,
    ) -> Result<Box<dyn Endpoint>> {
        if !self.options.has_transport_protocol(transport)
            || !self.options.has_network_protocol(network)
        {
            return Err(Error::UnknownProtocol);
        }

        Ok(Box::new(MockEndpoint {
            binds: self.binds.clone(),
        }))
    }

    fn listen_tcp(&self, addr: FullAddress, _: NetworkProtocol) -> Result<Box<dyn Listener>> {
        if !self.ports.lock().unwrap().insert(addr.port) {
            return Err(Error::PortInUse(addr.port));
        }
        Ok(Box::new(MockListener { addr }))
    }

    fn dial_tcp(
        &self,
        addr: FullAddress,
        _: NetworkProtocol,
        deadline: Option<Instant>,
    ) -> Result<Box<dyn Conn>> {
        self.tcp_dials.fetch_add(1, Ordering::SeqCst);

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
        }
        if !self.has_route(&addr.addr) {
            return Err(Error::NoRoute);
        }

        Ok(Box::new(MockConn {
            local: FullAddress::ipv4(**DEFAULT_IPV4_ADDR_CIDR, 49152),
            remote: Some(addr),
        }))
    }

    fn dial_udp(
        &self,
        local: Option<FullAddress>,
        remote: Option<FullAddress>,
        _: NetworkProtocol,
    ) -> Result<Box<dyn Conn>> {
        Ok(Box::new(MockConn {
            local: local.unwrap_or_else(|| FullAddress::ipv4(Ipv4Address::UNSPECIFIED, 0)),
            remote,
        }))
    }
}

/// A device recording transmitted frames.
#[derive(Default)]
pub struct MockDevice {
    pub mac: Mutex<Option<EthernetAddress>>,
    handler: Mutex<Option<Arc<dyn Receiver>>>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockDevice {
    /// Hands a frame to the receive handler as the hardware would.
    pub fn deliver(&self, frame: &[u8]) {
        let handler = self.handler.lock().unwrap().clone();
        handler.expect("receive handler not set").receive(frame);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl Device for MockDevice {
    fn init(&self, mac: EthernetAddress) -> DeviceResult<()> {
        *self.mac.lock().unwrap() = Some(mac);
        Ok(())
    }

    fn set_receive_handler(&self, handler: Arc<dyn Receiver>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    fn transmit(&self, frame: &[u8]) -> DeviceResult<()> {
        self.sent.lock().unwrap().push(frame.to_vec());
        Ok(())
    }
}

/// Default options: 10.0.0.2/24 via 10.0.0.1.
pub fn options() -> Options {
    let mut options = Options::new(*DEFAULT_ETH_ADDR);
    options.ipv4 = Some(IpConfig::ipv4(
        *DEFAULT_IPV4_ADDR_CIDR,
        *DEFAULT_IPV4_GATEWAY,
    ));
    options
}

pub fn interface_with(options: Options) -> (Interface<MockStack>, Arc<MockDevice>) {
    let _ = env_logger::try_init();

    let device = Arc::new(MockDevice::default());
    let dev: Arc<dyn Device> = device.clone();
    let interface = Interface::init_with_options(Some(dev), NIC_ID, options)
        .expect("interface init");

    (interface, device)
}

pub fn interface() -> (Interface<MockStack>, Arc<MockDevice>) {
    interface_with(options())
}
