//! A router-attached network interface: a name, a MAC, and an IP.

use std::net::Ipv4Addr;

use super::wire::MacAddr;

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub mac: MacAddr,
    pub addr: Ipv4Addr,
}

impl Interface {
    pub fn new(name: impl Into<String>, mac: MacAddr, addr: Ipv4Addr) -> Self {
        Interface { name: name.into(), mac, addr }
    }
}
