//! Protocol independent IP addresses.

use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};

use crate::core::repr::{
    ipv4,
    ipv6,
};
use crate::core::stack::NicId;
use crate::{
    Error,
    Result,
};

/// An IPv4 or IPv6 address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    Ipv4(ipv4::Address),
    Ipv6(ipv6::Address),
}

impl Address {
    pub fn is_unspecified(&self) -> bool {
        match *self {
            Address::Ipv4(ref addr) => addr.is_unspecified(),
            Address::Ipv6(ref addr) => addr.is_unspecified(),
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Address::Ipv4(ref addr) => write!(f, "{}", addr),
            Address::Ipv6(ref addr) => write!(f, "{}", addr),
        }
    }
}

impl From<ipv4::Address> for Address {
    fn from(addr: ipv4::Address) -> Address {
        Address::Ipv4(addr)
    }
}

impl From<ipv6::Address> for Address {
    fn from(addr: ipv6::Address) -> Address {
        Address::Ipv6(addr)
    }
}

/// An IPv4 or IPv6 address with a prefix length. Used both for interface
/// addresses and for route destinations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cidr {
    Ipv4(ipv4::AddressCidr),
    Ipv6(ipv6::AddressCidr),
}

impl Cidr {
    pub fn address(&self) -> Address {
        match *self {
            Cidr::Ipv4(ref cidr) => Address::Ipv4(**cidr),
            Cidr::Ipv6(ref cidr) => Address::Ipv6(**cidr),
        }
    }

    pub fn prefix_len(&self) -> u8 {
        match *self {
            Cidr::Ipv4(ref cidr) => cidr.prefix_len(),
            Cidr::Ipv6(ref cidr) => cidr.prefix_len(),
        }
    }

    /// Returns the directly connected network of the address.
    pub fn subnet(&self) -> Cidr {
        match *self {
            Cidr::Ipv4(ref cidr) => Cidr::Ipv4(cidr.subnet()),
            Cidr::Ipv6(ref cidr) => Cidr::Ipv6(cidr.subnet()),
        }
    }
}

impl Display for Cidr {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Cidr::Ipv4(ref cidr) => write!(f, "{}", cidr),
            Cidr::Ipv6(ref cidr) => write!(f, "{}", cidr),
        }
    }
}

impl From<ipv4::AddressCidr> for Cidr {
    fn from(cidr: ipv4::AddressCidr) -> Cidr {
        Cidr::Ipv4(cidr)
    }
}

impl From<ipv6::AddressCidr> for Cidr {
    fn from(cidr: ipv6::AddressCidr) -> Cidr {
        Cidr::Ipv6(cidr)
    }
}

/// A transport address, NIC 0 meaning any NIC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FullAddress {
    pub nic: NicId,
    pub addr: Address,
    pub port: u16,
}

impl FullAddress {
    /// Creates an IPv4 transport address not tied to a NIC.
    pub fn ipv4(addr: ipv4::Address, port: u16) -> FullAddress {
        FullAddress {
            nic: 0,
            addr: Address::Ipv4(addr),
            port,
        }
    }

    /// Parses an IPv4 `host:port` string.
    ///
    /// The port may be omitted, in which case it is 0. An empty host yields
    /// the unspecified address. Hostnames are not resolved.
    pub fn parse_ipv4(addr: &str) -> Result<FullAddress> {
        let invalid = || Error::AddressParse(addr.to_string());

        let (host, port) = match addr.rfind(':') {
            Some(i) => {
                let port = &addr[i + 1 ..];
                if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                (&addr[.. i], port.parse::<u16>().map_err(|_| invalid())?)
            }
            None => (addr, 0),
        };

        let host = if host.is_empty() {
            ipv4::Address::UNSPECIFIED
        } else {
            host.parse::<ipv4::Address>().map_err(|_| invalid())?
        };

        Ok(FullAddress::ipv4(host, port))
    }
}

impl Display for FullAddress {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}:{}", self.addr, self.port)
    }
}
