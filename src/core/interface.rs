//! Wiring of a protocol stack on top of a NIC.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::dev::Device;
use crate::core::link::{
    Endpoint as LinkEndpoint,
    LinkCapabilities,
};
use crate::core::neighbor::NeighborCache;
use crate::core::nic::Nic;
use crate::core::repr::{
    EthernetAddress,
    FullAddress,
    IpAddress,
    IpCidr,
    Ipv4Address,
    Ipv4AddressCidr,
    Ipv6Address,
    Ipv6AddressCidr,
};
use crate::core::socket::{
    address_families,
    Context,
};
use crate::core::stack::{
    Conn,
    Endpoint,
    Error as StackError,
    Listener,
    NetworkProtocol,
    NicId,
    ProtocolAddress,
    Route,
    Stack,
    StackOptions,
    TransportProtocol,
};
use crate::{
    Error,
    Result,
};

/// Number of outbound packets the link endpoint can hold.
pub const LINK_QUEUE_CAPACITY: usize = 256;

/// Default Ethernet MTU, excluding the link header.
pub const DEFAULT_MTU: usize = 1500;

/// Address and gateway of one IP protocol. An unspecified gateway means no
/// default route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpConfig {
    pub address: IpCidr,
    pub gateway: IpAddress,
}

impl IpConfig {
    pub fn ipv4(address: Ipv4AddressCidr, gateway: Ipv4Address) -> IpConfig {
        IpConfig {
            address: IpCidr::Ipv4(address),
            gateway: IpAddress::Ipv4(gateway),
        }
    }

    pub fn ipv6(address: Ipv6AddressCidr, gateway: Ipv6Address) -> IpConfig {
        IpConfig {
            address: IpCidr::Ipv6(address),
            gateway: IpAddress::Ipv6(gateway),
        }
    }

    fn is_ipv4(&self) -> bool {
        match (self.address, self.gateway) {
            (IpCidr::Ipv4(_), IpAddress::Ipv4(_)) => true,
            _ => false,
        }
    }

    fn is_ipv6(&self) -> bool {
        match (self.address, self.gateway) {
            (IpCidr::Ipv6(_), IpAddress::Ipv6(_)) => true,
            _ => false,
        }
    }
}

/// Parameters for configuring an interface.
#[derive(Clone, Debug)]
pub struct Options {
    /// Link layer address of the NIC.
    pub mac: EthernetAddress,
    /// Largest network layer packet the link carries.
    pub mtu: usize,
    /// Protocols to create the stack with, `DEFAULT_STACK_OPTIONS` if unset.
    pub stack_options: Option<StackOptions>,
    pub ipv4: Option<IpConfig>,
    pub ipv6: Option<IpConfig>,
}

impl Options {
    /// Creates options with the default MTU and no IP configuration.
    pub fn new(mac: EthernetAddress) -> Options {
        Options {
            mac,
            mtu: DEFAULT_MTU,
            stack_options: None,
            ipv4: None,
            ipv6: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.mtu == 0 {
            return Err(Error::InvalidConfiguration("MTU must not be 0".to_string()));
        }

        if let Some(ref config) = self.ipv4 {
            if !config.is_ipv4() {
                return Err(Error::InvalidConfiguration(format!(
                    "IPv4 configuration with non IPv4 address {} or gateway {}",
                    config.address, config.gateway
                )));
            }
        }

        if let Some(ref config) = self.ipv6 {
            if !config.is_ipv6() {
                return Err(Error::InvalidConfiguration(format!(
                    "IPv6 configuration with non IPv6 address {} or gateway {}",
                    config.address, config.gateway
                )));
            }
        }

        Ok(())
    }

    fn gateways(&self) -> Vec<IpAddress> {
        self.ipv4
            .iter()
            .chain(self.ipv6.iter())
            .map(|config| config.gateway)
            .collect()
    }
}

/// An Ethernet interface: a protocol stack, its link endpoint and the NIC
/// bridging the endpoint to a device.
pub struct Interface<S: Stack> {
    nic_id: NicId,
    stack: S,
    link: Arc<LinkEndpoint>,
    nic: Arc<Nic>,
    protos: HashMap<i32, NetworkProtocol>,
    icmp: Option<Box<dyn Endpoint>>,
}

impl<S: Stack> Interface<S> {
    /// Creates an IPv4 only interface from string literals, e.g.
    /// `("10.0.0.1", "255.255.255.0", "1a:55:89:a2:69:41", "10.0.0.2", 1)`.
    /// An empty gateway means none.
    pub fn init(
        device: Option<Arc<dyn Device>>,
        ip: &str,
        netmask: &str,
        mac: &str,
        gateway: &str,
        id: NicId,
    ) -> Result<Interface<S>> {
        let literal = |what: &str, s: &str| -> Result<Ipv4Address> {
            s.parse::<Ipv4Address>().map_err(|_| {
                Error::InvalidConfiguration(format!("invalid {} {:?}", what, s))
            })
        };

        let mac = mac.parse::<EthernetAddress>()?;
        let address = Ipv4AddressCidr::from_netmask(literal("IP", ip)?, literal("netmask", netmask)?)?;
        let gateway = if gateway.is_empty() {
            Ipv4Address::UNSPECIFIED
        } else {
            literal("gateway", gateway)?
        };

        let mut options = Options::new(mac);
        options.ipv4 = Some(IpConfig::ipv4(address, gateway));

        Interface::init_with_options(device, id, options)
    }

    /// Creates an interface with full control over the stack configuration.
    ///
    /// The stack is created and configured before the NIC is bound to the
    /// device, so on error no frame ever reached the stack and nothing is
    /// returned.
    pub fn init_with_options(
        device: Option<Arc<dyn Device>>,
        id: NicId,
        options: Options,
    ) -> Result<Interface<S>> {
        options.validate()?;

        let stack_options = options.stack_options.clone().unwrap_or_default();
        let neighbors = Arc::new(NeighborCache::new(options.gateways()));

        let stack = S::new(&stack_options, neighbors.clone()).map_err(Error::Stack)?;
        let (link, protos) = configure(&stack, id, &options)?;
        let nic = Nic::new(options.mac.as_bytes(), Some(link.clone()), device, neighbors)?;

        info!("Interface {} up with MAC {}.", id, options.mac);

        Ok(Interface {
            nic_id: id,
            stack,
            link,
            nic,
            protos,
            icmp: None,
        })
    }

    pub fn nic_id(&self) -> NicId {
        self.nic_id
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn link(&self) -> &Arc<LinkEndpoint> {
        &self.link
    }

    pub fn nic(&self) -> &Arc<Nic> {
        &self.nic
    }

    /// Returns the network protocol configured for an address family.
    pub fn protocol(&self, family: i32) -> Option<NetworkProtocol> {
        self.protos.get(&family).cloned()
    }

    pub fn is_icmp_enabled(&self) -> bool {
        self.icmp.is_some()
    }

    /// Adds an ICMP endpoint bound to the interface's IPv4 address so the
    /// stack answers echo requests. The endpoint lives as long as the
    /// interface.
    pub fn enable_icmp(&mut self) -> Result<()> {
        let mut endpoint = self.stack
            .new_endpoint(TransportProtocol::ICMPV4, NetworkProtocol::IPV4)
            .map_err(Error::Endpoint)?;

        let addr = self.ipv4_addr(0)?;
        endpoint.bind(addr).map_err(Error::Bind)?;

        debug!("ICMP enabled on {}.", addr.addr);
        self.icmp = Some(endpoint);
        Ok(())
    }

    /// Returns a listener accepting IPv4 TCP connections on a port of the
    /// interface's address.
    pub fn listen_tcp4(&self, port: u16) -> Result<Box<dyn Listener>> {
        let addr = self.ipv4_addr(port)?;
        self.stack
            .listen_tcp(addr, NetworkProtocol::IPV4)
            .map_err(Error::Bind)
    }

    /// Connects to an IPv4 TCP `host:port`.
    pub fn dial_tcp4(&self, address: &str) -> Result<Box<dyn Conn>> {
        self.dial_context_tcp4(&Context::background(), address)
    }

    /// Connects to an IPv4 TCP `host:port`, giving up once the context's
    /// deadline passes.
    pub fn dial_context_tcp4(&self, ctx: &Context, address: &str) -> Result<Box<dyn Conn>> {
        let addr = remote_addr(address)?;
        if ctx.is_expired() {
            return Err(Error::Connect(StackError::Timeout));
        }

        self.stack
            .dial_tcp(addr, NetworkProtocol::IPV4, ctx.deadline())
            .map_err(Error::Connect)
    }

    /// Creates a UDP connection to a remote `host:port`, optionally bound to a
    /// local `host:port`. Empty strings are treated as absent.
    pub fn dial_udp4(&self, local: Option<&str>, remote: Option<&str>) -> Result<Box<dyn Conn>> {
        let local = match local {
            Some(addr) if !addr.is_empty() => Some(FullAddress::parse_ipv4(addr)?),
            _ => None,
        };
        let remote = match remote {
            Some(addr) if !addr.is_empty() => Some(remote_addr(addr)?),
            _ => None,
        };

        self.stack
            .dial_udp(local, remote, NetworkProtocol::IPV4)
            .map_err(Error::Connect)
    }

    fn ipv4_addr(&self, port: u16) -> Result<FullAddress> {
        let cidr = self.stack
            .main_nic_address(self.nic_id, NetworkProtocol::IPV4)
            .map_err(Error::Stack)?;

        Ok(FullAddress {
            nic: self.nic_id,
            addr: cidr.address(),
            port,
        })
    }
}

/// Parses a dial target, which must carry a port.
fn remote_addr(address: &str) -> Result<FullAddress> {
    let addr = FullAddress::parse_ipv4(address)?;
    if addr.port == 0 {
        return Err(Error::AddressParse(address.to_string()));
    }
    Ok(addr)
}

/// Creates the link endpoint, attaches it to the stack and installs the
/// addresses and routes of every configured protocol.
fn configure<S: Stack>(
    stack: &S,
    id: NicId,
    options: &Options,
) -> Result<(Arc<LinkEndpoint>, HashMap<i32, NetworkProtocol>)> {
    let link = Arc::new(
        LinkEndpoint::new(LINK_QUEUE_CAPACITY, options.mtu, options.mac)
            .with_capabilities(LinkCapabilities::RESOLUTION_REQUIRED),
    );

    stack.create_nic(id, link.clone()).map_err(Error::Stack)?;

    let mut routes = stack.route_table();
    let mut protos = HashMap::new();

    if let Some(ref config) = options.ipv4 {
        routes.extend(configure_protocol(stack, id, NetworkProtocol::IPV4, config)?);
        protos.insert(address_families::INET, NetworkProtocol::IPV4);
    }

    if let Some(ref config) = options.ipv6 {
        routes.extend(configure_protocol(stack, id, NetworkProtocol::IPV6, config)?);
        protos.insert(address_families::INET6, NetworkProtocol::IPV6);
    }

    // The table is replaced in one go so the stack never sees a partial set.
    stack.set_route_table(routes);

    Ok((link, protos))
}

/// Registers the address of a protocol on a NIC and returns the routes to
/// install for it: the directly connected subnet and, given a gateway, a
/// default route through it.
pub fn configure_protocol<S: Stack>(
    stack: &S,
    id: NicId,
    protocol: NetworkProtocol,
    config: &IpConfig,
) -> Result<Vec<Route>> {
    stack
        .add_protocol_address(
            id,
            ProtocolAddress {
                protocol,
                address: config.address,
            },
        )
        .map_err(Error::Stack)?;

    let mut routes = vec![Route {
        destination: config.address.subnet(),
        gateway: None,
        nic: id,
    }];

    if !config.gateway.is_unspecified() {
        let destination = match (protocol, config.gateway) {
            (NetworkProtocol::IPV4, IpAddress::Ipv4(_)) => {
                Some(IpCidr::Ipv4(Ipv4AddressCidr::empty_subnet()))
            }
            (NetworkProtocol::IPV6, IpAddress::Ipv6(_)) => {
                Some(IpCidr::Ipv6(Ipv6AddressCidr::empty_subnet()))
            }
            _ => None,
        };

        if let Some(destination) = destination {
            routes.push(Route {
                destination,
                gateway: Some(config.gateway),
                nic: id,
            });
        }
    }

    debug!(
        "Configured {} on NIC {} with {} route(s).",
        config.address,
        id,
        routes.len()
    );

    Ok(routes)
}
