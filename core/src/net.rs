//! Local network checks.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener};

/// Whether something already listens on `port` on the loopback interface.
pub fn is_port_in_use(port: u16) -> bool {
    match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
        Ok(_) => false,
        Err(e) => e.kind() == ErrorKind::AddrInUse,
    }
}
