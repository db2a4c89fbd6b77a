//! BSD socket style entry point over an interface.

use std::fmt::{
    Debug,
    Formatter,
    Result as FmtResult,
};
use std::time::{
    Duration,
    Instant,
};

use crate::core::interface::Interface;
use crate::core::repr::{
    FullAddress,
    Ipv4Address,
};
use crate::core::stack::{
    Conn,
    Error as StackError,
    Listener,
    Stack,
};
use crate::{
    Error,
    Result,
};

/// Address family identifiers, using the Linux values.
pub mod address_families {
    pub const INET: i32 = 2;

    pub const INET6: i32 = 10;
}

/// Socket type identifiers, using the Linux values.
pub mod socket_types {
    pub const STREAM: i32 = 1;

    pub const DGRAM: i32 = 2;
}

/// Carries an optional deadline for blocking operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Context {
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never expires.
    pub fn background() -> Context {
        Context { deadline: None }
    }

    pub fn with_deadline(deadline: Instant) -> Context {
        Context {
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Context {
        Context::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Checks if the deadline has passed.
    pub fn is_expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// The outcome of a socket request: a connection when dialing or a listener
/// when listening.
pub enum Socket {
    Conn(Box<dyn Conn>),
    Listener(Box<dyn Listener>),
}

impl Socket {
    pub fn is_conn(&self) -> bool {
        match *self {
            Socket::Conn(_) => true,
            _ => false,
        }
    }

    pub fn is_listener(&self) -> bool {
        match *self {
            Socket::Listener(_) => true,
            _ => false,
        }
    }

    /// Returns the underlying connection.
    ///
    /// # Panics
    ///
    /// Panics if the socket is a listener.
    pub fn into_conn(self) -> Box<dyn Conn> {
        match self {
            Socket::Conn(conn) => conn,
            _ => panic!("Not a connection!"),
        }
    }

    /// Returns the underlying listener.
    ///
    /// # Panics
    ///
    /// Panics if the socket is a connection.
    pub fn into_listener(self) -> Box<dyn Listener> {
        match self {
            Socket::Listener(listener) => listener,
            _ => panic!("Not a listener!"),
        }
    }
}

impl Debug for Socket {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            Socket::Conn(ref conn) => write!(f, "Socket::Conn({})", conn.local_addr()),
            Socket::Listener(ref listener) => {
                write!(f, "Socket::Listener({})", listener.local_addr())
            }
        }
    }
}

fn parse_opt(addr: Option<&str>) -> Result<Option<FullAddress>> {
    match addr {
        Some(addr) if !addr.is_empty() => FullAddress::parse_ipv4(addr).map(Some),
        _ => Ok(None),
    }
}

fn require_port(addr: FullAddress) -> Result<FullAddress> {
    if addr.port == 0 {
        return Err(Error::AddressParse(addr.to_string()));
    }
    Ok(addr)
}

impl<S: Stack> Interface<S> {
    /// Creates a socket from a network name ("tcp" or "udp"), an address
    /// family, a socket type and optional local and remote addresses.
    ///
    /// UDP yields a connection, bound and/or connected as requested. TCP dials
    /// when a remote address is given, failing at once if the context already
    /// expired, and listens on the local address otherwise. Only IPv4 is
    /// supported. Addresses are parsed first, so a
    /// malformed address is reported before any capability error.
    pub fn socket(
        &self,
        ctx: &Context,
        network: &str,
        family: i32,
        sotype: i32,
        local: Option<&str>,
        remote: Option<&str>,
    ) -> Result<Socket> {
        let local = parse_opt(local)?;
        let remote = parse_opt(remote)?;

        let proto = match family {
            address_families::INET => self.protocol(family),
            _ => None,
        };
        let proto = proto.ok_or(Error::UnsupportedFamily(family))?;

        match network {
            "udp" => {
                if sotype != socket_types::DGRAM {
                    return Err(Error::UnsupportedSocketType(sotype));
                }

                let remote = remote.map(require_port).transpose()?;

                self.stack()
                    .dial_udp(local, remote, proto)
                    .map(Socket::Conn)
                    .map_err(Error::Connect)
            }
            "tcp" => {
                if sotype != socket_types::STREAM {
                    return Err(Error::UnsupportedSocketType(sotype));
                }

                match remote {
                    Some(remote) => {
                        let remote = require_port(remote)?;
                        if ctx.is_expired() {
                            return Err(Error::Connect(StackError::Timeout));
                        }

                        self.stack()
                            .dial_tcp(remote, proto, ctx.deadline())
                            .map(Socket::Conn)
                            .map_err(Error::Connect)
                    }
                    None => {
                        let local = local.unwrap_or_else(|| {
                            FullAddress::ipv4(Ipv4Address::UNSPECIFIED, 0)
                        });

                        self.stack()
                            .listen_tcp(local, proto)
                            .map(Socket::Listener)
                            .map_err(Error::Bind)
                    }
                }
            }
            _ => Err(Error::UnsupportedNetwork(network.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_never_expires() {
        let ctx = Context::background();
        assert_eq!(ctx.deadline(), None);
        assert!(!ctx.is_expired());
    }

    #[test]
    fn test_deadline() {
        let past = Context::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(past.is_expired());

        let future = Context::with_timeout(Duration::from_secs(60));
        assert!(!future.is_expired());
        assert!(future.deadline().is_some());
    }

    #[test]
    fn test_parse_opt() {
        assert_matches!(parse_opt(None), Ok(None));
        assert_matches!(parse_opt(Some("")), Ok(None));
        assert_eq!(
            parse_opt(Some(":8080")).unwrap(),
            Some(FullAddress::ipv4(Ipv4Address::UNSPECIFIED, 8080))
        );
        assert_matches!(parse_opt(Some("nope:80")), Err(Error::AddressParse(_)));
    }

    #[test]
    fn test_require_port() {
        let addr = FullAddress::ipv4(Ipv4Address::new([10, 0, 0, 2]), 0);
        assert_matches!(require_port(addr), Err(Error::AddressParse(_)));
        let addr = FullAddress::ipv4(Ipv4Address::new([10, 0, 0, 2]), 53);
        assert_eq!(require_port(addr).unwrap(), addr);
    }
}
