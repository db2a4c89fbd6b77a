use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use std::net::Ipv6Addr;
use std::ops::Deref;
use std::str::FromStr;

use crate::{
    Error,
    Result,
};

/// [IPv6 address](https://en.wikipedia.org/wiki/IPv6_address) in network byte
/// order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address([u8; 16]);

impl Address {
    pub const UNSPECIFIED: Address = Address([0; 16]);

    pub fn new(addr: [u8; 16]) -> Address {
        Address(addr)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Checks if this is the :: address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 16]
    }

    /// Returns the address with all bits past the prefix cleared.
    pub fn mask(&self, prefix_len: u8) -> Address {
        let mut addr = self.0;
        for (i, byte) in addr.iter_mut().enumerate() {
            let bits = (prefix_len as usize).saturating_sub(i * 8).min(8);
            *byte &= !(0xFFu16 >> bits) as u8;
        }
        Address(addr)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", Ipv6Addr::from(self.0))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(addr: &str) -> Result<Address> {
        addr.parse::<Ipv6Addr>()
            .map(Address::from)
            .map_err(|_| Error::AddressParse(addr.to_string()))
    }
}

impl From<Ipv6Addr> for Address {
    fn from(addr: Ipv6Addr) -> Address {
        Address(addr.octets())
    }
}

/// An IPv6 address with a subnet prefix length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AddressCidr {
    addr: Address,
    prefix_len: u8,
}

impl AddressCidr {
    /// Creates an address with a prefix length, clamped to 128.
    pub fn new(addr: Address, prefix_len: u8) -> AddressCidr {
        AddressCidr {
            addr,
            prefix_len: prefix_len.min(128),
        }
    }

    /// The ::/0 subnet matching every destination.
    pub fn empty_subnet() -> AddressCidr {
        AddressCidr::new(Address::UNSPECIFIED, 0)
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn subnet(&self) -> AddressCidr {
        AddressCidr::new(self.addr.mask(self.prefix_len), self.prefix_len)
    }
}

impl Deref for AddressCidr {
    type Target = Address;

    fn deref(&self) -> &Address {
        &self.addr
    }
}

impl Display for AddressCidr {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}
