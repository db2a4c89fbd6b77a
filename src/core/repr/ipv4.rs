use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use std::net::Ipv4Addr;
use std::ops::Deref;
use std::str::FromStr;

use byteorder::{
    ByteOrder,
    NetworkEndian,
};

use crate::{
    Error,
    Result,
};

/// [IPv4 address](https://en.wikipedia.org/wiki/IPv4) in network byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address([u8; 4]);

impl Address {
    pub const UNSPECIFIED: Address = Address([0; 4]);

    pub const BROADCAST: Address = Address([0xFF; 4]);

    /// Creates an IPv4 address from a network byte order buffer.
    pub fn new(addr: [u8; 4]) -> Address {
        Address(addr)
    }

    /// Returns a reference to the network byte order representation of the address.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Checks if this is the 0.0.0.0 address.
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 4]
    }

    /// Returns the address with all bits past the prefix cleared.
    pub fn mask(&self, prefix_len: u8) -> Address {
        let mut addr = [0; 4];
        NetworkEndian::write_u32(&mut addr, self.as_u32() & prefix_to_mask(prefix_len));
        Address(addr)
    }

    /// Converts a contiguous netmask such as 255.255.255.0 to a prefix length.
    pub fn netmask_prefix_len(&self) -> Result<u8> {
        let mask = self.as_u32();
        let prefix_len = mask.leading_ones();

        if prefix_to_mask(prefix_len as u8) != mask {
            return Err(Error::InvalidConfiguration(format!(
                "non-contiguous netmask {}",
                self
            )));
        }

        Ok(prefix_len as u8)
    }

    fn as_u32(&self) -> u32 {
        NetworkEndian::read_u32(&self.0)
    }
}

fn prefix_to_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        n if n >= 32 => u32::max_value(),
        n => !(u32::max_value() >> n),
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parses an Ipv4 address from an A.B.C.D style string.
    fn from_str(addr: &str) -> Result<Address> {
        let invalid = || Error::AddressParse(addr.to_string());

        let bytes = addr
            .split('.')
            .map(|token| {
                if token.is_empty() || token.len() > 3 || !token.bytes().all(|b| b.is_ascii_digit()) {
                    Err(invalid())
                } else {
                    token.parse::<u8>().map_err(|_| invalid())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        if bytes.len() != 4 {
            return Err(invalid());
        }

        let mut ipv4: [u8; 4] = [0; 4];
        ipv4.copy_from_slice(&bytes);

        Ok(Address::new(ipv4))
    }
}

impl From<Ipv4Addr> for Address {
    fn from(addr: Ipv4Addr) -> Address {
        Address(addr.octets())
    }
}

impl From<Address> for Ipv4Addr {
    fn from(addr: Address) -> Ipv4Addr {
        Ipv4Addr::from(addr.0)
    }
}

/// An IPv4 address with a subnet prefix length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AddressCidr {
    addr: Address,
    prefix_len: u8,
}

impl AddressCidr {
    /// Creates an address with a prefix length, clamped to 32.
    pub fn new(addr: Address, prefix_len: u8) -> AddressCidr {
        AddressCidr {
            addr,
            prefix_len: prefix_len.min(32),
        }
    }

    /// Creates an address with the prefix length of a contiguous netmask.
    pub fn from_netmask(addr: Address, netmask: Address) -> Result<AddressCidr> {
        Ok(AddressCidr::new(addr, netmask.netmask_prefix_len()?))
    }

    /// The 0.0.0.0/0 subnet matching every destination.
    pub fn empty_subnet() -> AddressCidr {
        AddressCidr::new(Address::UNSPECIFIED, 0)
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the network this address belongs to, e.g. 10.0.0.2/24 yields
    /// 10.0.0.0/24.
    pub fn subnet(&self) -> AddressCidr {
        AddressCidr::new(self.addr.mask(self.prefix_len), self.prefix_len)
    }

    /// Checks if an address is in the same subnet.
    pub fn contains(&self, addr: Address) -> bool {
        self.addr.mask(self.prefix_len) == addr.mask(self.prefix_len)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            "10.0.0.2".parse::<Address>().unwrap(),
            Address::new([10, 0, 0, 2])
        );
        assert_matches!("10.0.0".parse::<Address>(), Err(Error::AddressParse(_)));
        assert_matches!("10.0.0.256".parse::<Address>(), Err(Error::AddressParse(_)));
        assert_matches!("10.0.0.+2".parse::<Address>(), Err(Error::AddressParse(_)));
        assert_matches!("10..0.2".parse::<Address>(), Err(Error::AddressParse(_)));
        assert_matches!("localhost".parse::<Address>(), Err(Error::AddressParse(_)));
    }

    #[test]
    fn test_netmask_prefix_len() {
        let netmask = |s: &str| s.parse::<Address>().unwrap();
        assert_eq!(netmask("255.255.255.0").netmask_prefix_len().unwrap(), 24);
        assert_eq!(netmask("255.255.255.255").netmask_prefix_len().unwrap(), 32);
        assert_eq!(netmask("0.0.0.0").netmask_prefix_len().unwrap(), 0);
        assert_eq!(netmask("255.255.240.0").netmask_prefix_len().unwrap(), 20);
        assert_matches!(
            netmask("255.0.255.0").netmask_prefix_len(),
            Err(Error::InvalidConfiguration(_))
        );
    }

    #[test]
    fn test_subnet() {
        let cidr = AddressCidr::new(Address::new([10, 0, 0, 2]), 24);
        assert_eq!(
            cidr.subnet(),
            AddressCidr::new(Address::new([10, 0, 0, 0]), 24)
        );
        assert!(cidr.contains(Address::new([10, 0, 0, 200])));
        assert!(!cidr.contains(Address::new([10, 0, 1, 2])));
        assert_eq!(cidr.to_string(), "10.0.0.2/24");
    }

    #[test]
    fn test_empty_subnet_contains_everything() {
        let cidr = AddressCidr::empty_subnet();
        assert!(cidr.contains(Address::new([8, 8, 8, 8])));
        assert!(cidr.is_unspecified());
    }
}
