//! Serialization and deserialization of frames and network addresses.
//!
//! The `repr` module provides the Ethernet frame codec used on the boundary
//! between hardware and the protocol stack, plus the address types used to
//! configure the stack.

pub mod ethernet;
pub mod ip;
pub mod ipv4;
pub mod ipv6;

pub use self::ethernet::{
    eth_types,
    Address as EthernetAddress,
    Frame as EthernetFrame,
};
pub use self::ip::{
    Address as IpAddress,
    Cidr as IpCidr,
    FullAddress,
};
pub use self::ipv4::{
    Address as Ipv4Address,
    AddressCidr as Ipv4AddressCidr,
};
pub use self::ipv6::{
    Address as Ipv6Address,
    AddressCidr as Ipv6AddressCidr,
};
