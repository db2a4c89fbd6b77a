use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use std::sync::Arc;

use crate::core::repr::EthernetAddress;

#[derive(Debug)]
pub enum Error {
    /// Indicates the device is busy and cannot take a frame right now.
    Busy,
    /// Indicates a frame larger than the device supports.
    Overflow,
    /// Indicates a generic IO error.
    IO(std::io::Error),
    /// Indicates a miscellaneous error with a message.
    Unknown(&'static str),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Error::Busy => write!(f, "device busy"),
            Error::Overflow => write!(f, "frame too large"),
            Error::IO(ref err) => write!(f, "{}", err),
            Error::Unknown(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::IO(ref err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Receives raw Ethernet frames from a device.
///
/// Called from interrupt or polling context, so implementations must return
/// quickly and never block.
pub trait Receiver: Send + Sync {
    fn receive(&self, frame: &[u8]);
}

/// A physical (or emulated) Ethernet controller.
///
/// Only the two directions of frame traffic and a one-time bring-up are
/// required; DMA rings, PHY setup and interrupts are the driver's business.
pub trait Device: Send + Sync {
    /// Brings up the hardware with a link address. Called once.
    fn init(&self, mac: EthernetAddress) -> Result<()>;

    /// Installs the handler invoked with every received frame.
    fn set_receive_handler(&self, handler: Arc<dyn Receiver>);

    /// Sends a single encoded frame.
    fn transmit(&self, frame: &[u8]) -> Result<()>;
}
