use std::io;
use std::sync::Arc;

use spin::RwLock;

use crate::core::dev::{
    Device,
    Error,
    Receiver,
    Result,
};
use crate::core::repr::EthernetAddress;
use crate::linux::libc as _libc;

/// Room for the Ethernet header and a VLAN tag on top of the MTU.
const FRAME_OVERHEAD: usize = 18;

/// [TAP interface](https://www.kernel.org/doc/Documentation/networking/tuntap.txt)
/// for sending and receiving raw ethernet frames.
///
/// Reception is polled: `poll()` reads every pending frame and passes it to
/// the receive handler.
pub struct Tap {
    fd: libc::c_int,
    mtu: usize,
    handler: RwLock<Option<Arc<dyn Receiver>>>,
}

impl Tap {
    /// Creates or binds to an existing TAP interface with the specified name.
    pub fn new(ifr_name: &str) -> Result<Tap> {
        let ifreq = _libc::c_ifreq::with_name(ifr_name)
            .ok_or(Error::Unknown("TAP interface name too long"))?;

        let fd = unsafe {
            libc::open(
                "/dev/net/tun\0".as_ptr() as *const libc::c_char,
                libc::O_RDWR | libc::O_NONBLOCK,
            )
        };

        if fd == -1 {
            return Err(Error::IO(io::Error::last_os_error()));
        }

        // From here on, drop closes the descriptor on error.
        let mut tap = Tap {
            fd,
            mtu: 0,
            handler: RwLock::new(None),
        };

        let mut _ifreq = ifreq;
        _ifreq.ifr_ifru.ifr_flags = _libc::IFF_TAP | _libc::IFF_NO_PI;
        if unsafe { libc::ioctl(fd, _libc::TUNSETIFF as _, &mut _ifreq as *mut _libc::c_ifreq) } == -1 {
            return Err(Error::IO(io::Error::last_os_error()));
        }

        tap.mtu = query_mtu(ifreq)?;

        debug!("Opened TAP {} with MTU {}.", ifr_name, tap.mtu);
        Ok(tap)
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Reads every pending frame and hands it to the receive handler. Returns
    /// the number of frames read.
    pub fn poll(&self) -> Result<usize> {
        let mut buffer = vec![0u8; self.mtu + FRAME_OVERHEAD];
        let mut count = 0;

        loop {
            let read = unsafe {
                libc::read(
                    self.fd,
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                )
            };

            if read < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    return Ok(count);
                }
                return Err(Error::IO(err));
            }

            count += 1;

            let handler = self.handler.read().clone();
            match handler {
                Some(handler) => handler.receive(&buffer[.. read as usize]),
                None => trace!("Dropping {} byte frame, no receive handler.", read),
            }
        }
    }
}

fn query_mtu(mut ifreq: _libc::c_ifreq) -> Result<usize> {
    unsafe {
        let sockfd = libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0);

        if sockfd == -1 {
            return Err(Error::IO(io::Error::last_os_error()));
        }

        let res = libc::ioctl(sockfd, _libc::SIOCGIFMTU as _, &mut ifreq as *mut _libc::c_ifreq);
        let err = io::Error::last_os_error();
        libc::close(sockfd);

        if res == -1 {
            return Err(Error::IO(err));
        }

        Ok(ifreq.ifr_ifru.ifr_mtu as usize)
    }
}

impl Device for Tap {
    fn init(&self, mac: EthernetAddress) -> Result<()> {
        // The kernel side of the TAP keeps its own address, frames from the
        // stack simply carry this one as their source.
        debug!("TAP fd {} sending as {}.", self.fd, mac);
        Ok(())
    }

    fn set_receive_handler(&self, handler: Arc<dyn Receiver>) {
        *self.handler.write() = Some(handler);
    }

    fn transmit(&self, frame: &[u8]) -> Result<()> {
        if frame.len() > self.mtu + FRAME_OVERHEAD {
            return Err(Error::Overflow);
        }

        let wrote = unsafe {
            libc::write(
                self.fd,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
            )
        };

        if wrote < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(Error::Busy);
            }
            return Err(Error::IO(err));
        }

        Ok(())
    }
}

impl Drop for Tap {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_too_long() {
        assert_matches!(
            Tap::new("tap-name-over-ifnamsiz").err(),
            Some(Error::Unknown(_))
        );
    }

    #[test]
    #[ignore]
    fn test_transmit_tap0() {
        let tap = Tap::new("tap0").unwrap();
        tap.init(EthernetAddress::new([0x1a, 0x55, 0x89, 0xa2, 0x69, 0x41]))
            .unwrap();

        let frame = vec![0xff; 64];
        tap.transmit(&frame).unwrap();
        assert_matches!(tap.transmit(&vec![0; tap.mtu() + 64]), Err(Error::Overflow));
    }
}
