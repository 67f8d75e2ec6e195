//! Online/offline detection by opening a TCP connection

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use super::Reachability;

pub struct TcpReachability {
    addr: String,
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    fn resolve(&self) -> Option<SocketAddr> {
        self.addr.to_socket_addrs().ok()?.next()
    }
}

impl Reachability for TcpReachability {
    fn is_online(&self) -> bool {
        let Some(addr) = self.resolve() else {
            debug!("cannot resolve probe address {}", self.addr);
            return false;
        };
        match TcpStream::connect_timeout(&addr, self.timeout) {
            Ok(_) => true,
            Err(e) => {
                debug!("reachability probe to {addr} failed: {e}");
                false
            }
        }
    }
}
