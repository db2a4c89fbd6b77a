#[cfg(test)]
#[macro_use]
extern crate assert_matches;
#[macro_use]
extern crate bitflags;
extern crate byteorder;
extern crate crossbeam_queue;
#[macro_use]
extern crate lazy_static;
extern crate libc;
#[macro_use]
extern crate log;
extern crate spin;

pub mod core;

#[cfg(target_os = "linux")]
pub mod linux;

use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};

use crate::core::dev::Error as DeviceError;
use crate::core::stack::Error as StackError;

#[derive(Debug)]
pub enum Error {
    /// Indicates a malformed MAC, IP literal, netmask or a missing link endpoint.
    InvalidConfiguration(String),
    /// Indicates the protocol stack rejected NIC creation, address
    /// registration or a NIC address lookup.
    Stack(StackError),
    /// Indicates a transport endpoint could not be created.
    Endpoint(StackError),
    /// Indicates a transport endpoint could not be bound or listen.
    Bind(StackError),
    /// Indicates a dial failed, including deadline expiry.
    Connect(StackError),
    /// Indicates a malformed host:port string.
    AddressParse(String),
    /// Indicates an address family the dispatcher does not map.
    UnsupportedFamily(i32),
    /// Indicates a network name other than "tcp" or "udp".
    UnsupportedNetwork(String),
    /// Indicates a socket type that does not match the network.
    UnsupportedSocketType(i32),
    /// Indicates an error where a queue is full.
    Exhausted,
    /// Indicates a hardware device error.
    Device(DeviceError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Error::InvalidConfiguration(ref msg) => write!(f, "invalid configuration: {}", msg),
            Error::Stack(ref err) => write!(f, "stack error: {}", err),
            Error::Endpoint(ref err) => write!(f, "endpoint error: {}", err),
            Error::Bind(ref err) => write!(f, "bind error: {}", err),
            Error::Connect(ref err) => write!(f, "connect error: {}", err),
            Error::AddressParse(ref addr) => write!(f, "invalid address {:?}", addr),
            Error::UnsupportedFamily(family) => write!(f, "unsupported address family {}", family),
            Error::UnsupportedNetwork(ref network) => write!(f, "unsupported network {:?}", network),
            Error::UnsupportedSocketType(sotype) => write!(f, "unsupported socket type {}", sotype),
            Error::Exhausted => write!(f, "queue exhausted"),
            Error::Device(ref err) => write!(f, "device error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Stack(ref err)
            | Error::Endpoint(ref err)
            | Error::Bind(ref err)
            | Error::Connect(ref err) => Some(err),
            Error::Device(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<DeviceError> for Error {
    fn from(err: DeviceError) -> Self {
        Error::Device(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
