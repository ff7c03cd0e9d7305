//! IP router: a tap device per interface, each fed by its own reader
//! thread into `Router::handle_frame`, plus a background sweep thread
//! retrying outstanding ARP requests. Mirrors `tcp::mod`'s tun-reader /
//! driver-thread split, generalized to N interfaces instead of one.

mod arp;
mod forward;
mod iface;
mod route;
pub mod wire;

pub use iface::Interface;
pub use route::{RouteEntry, RoutingTable};

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tidy_tuntap::Tun;

use crate::err::Error;
use arp::{ArpCache, PendingArpQueue, MAX_RETRIES};

/// One `Mutex<Tun>` per interface, mirroring `tcp::Manager`'s single
/// `Mutex<Tun>` generalized to N taps: each interface's reader thread and
/// any forwarder writing to it share that interface's own lock only.
pub struct Router {
    interfaces: HashMap<String, Interface>,
    taps: HashMap<String, Mutex<Tun>>,
    routes: Mutex<RoutingTable>,
    arp_cache: Mutex<ArpCache>,
    pending: Mutex<PendingArpQueue>,
}

impl Router {
    fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    fn interface_by_addr(&self, addr: Ipv4Addr) -> Option<&Interface> {
        self.interfaces.values().find(|i| i.addr == addr)
    }

    fn send_frame(&self, iface: &str, frame: &[u8]) -> Result<(), Error> {
        let tap = self.taps.get(iface).ok_or_else(|| Error::NoSuchInterface(iface.to_string()))?;
        tap.lock().unwrap().write(frame)?;
        Ok(())
    }

    fn sweep_arp_retries(&self) {
        let due = self.pending.lock().unwrap().due_for_retry();
        for target in due {
            let iface = {
                let mut pending = self.pending.lock().unwrap();
                let Some(retries) = pending.mark_retried(target) else { continue };
                if retries > MAX_RETRIES {
                    None
                } else {
                    pending.iface_for(target)
                }
            };

            match iface {
                Some(iface) => self.send_arp_request(&iface, target),
                None => {
                    if let Some(entry) = self.pending.lock().unwrap().take(target) {
                        for frame in entry.withheld {
                            self.give_up_on(&frame.iface, &frame.bytes);
                        }
                    }
                }
            }
        }
    }

    /// ARP resolution exhausted its retries: tell the original sender the
    /// next hop is unreachable, replying on the same link the frame would
    /// have gone out on. The sender's own MAC must already be known (it's
    /// the host that handed us the packet to forward in the first place).
    fn give_up_on(&self, iface: &str, ip_bytes: &[u8]) {
        use etherparse::Ipv4HeaderSlice;
        let Ok(slice) = Ipv4HeaderSlice::from_slice(ip_bytes) else { return };
        let Some(sender_mac) = self.arp_cache.lock().unwrap().lookup(slice.source_addr()) else { return };
        let Some(iface) = self.interface(iface) else { return };
        let fake_in_eth =
            wire::EthernetHeader { dst: iface.mac, src: sender_mac, ethertype: wire::ETHERTYPE_IPV4 };
        let msg = wire::IcmpMessage::unreachable(wire::ICMP_CODE_HOST_UNREACHABLE, ip_bytes);
        self.reply_icmp(iface, &fake_in_eth, ip_bytes, slice.source_addr(), msg);
    }
}

/// A running router instance: owns the per-interface reader threads and
/// the ARP-sweep thread, and joins them on drop.
pub struct RouterDaemon {
    router: Arc<Router>,
    readers: Vec<JoinHandle<()>>,
    sweep: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl RouterDaemon {
    pub fn new(interfaces: Vec<Interface>, routes: RoutingTable) -> Result<Self, Error> {
        let mut by_name = HashMap::new();
        let mut taps = HashMap::new();

        for iface in interfaces {
            let tun = Tun::new(&iface.name, true)?;
            tun.set_addr(iface.addr)?;
            tun.set_netmask(Ipv4Addr::new(255, 255, 255, 0))?;
            tun.bring_up()?;
            taps.insert(iface.name.clone(), Mutex::new(tun));
            by_name.insert(iface.name.clone(), iface);
        }

        let router = Arc::new(Router {
            interfaces: by_name,
            taps,
            routes: Mutex::new(routes),
            arp_cache: Mutex::new(ArpCache::new()),
            pending: Mutex::new(PendingArpQueue::new()),
        });

        let readers = router
            .interfaces
            .keys()
            .cloned()
            .map(|name| {
                let router = router.clone();
                thread::spawn(move || run_reader(router, name))
            })
            .collect();

        let stop = Arc::new(AtomicBool::new(false));
        let sweep = {
            let router = router.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    thread::sleep(arp::RETRY_INTERVAL);
                    router.sweep_arp_retries();
                }
            })
        };

        Ok(RouterDaemon { router, readers, sweep: Some(sweep), stop })
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn join(mut self) {
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
        self.stop.store(true, Ordering::Relaxed);
        if let Some(sweep) = self.sweep.take() {
            let _ = sweep.join();
        }
    }
}

fn run_reader(router: Arc<Router>, iface: String) {
    let mut buf = [0u8; 1600];
    loop {
        let n = {
            let mut tap = router.taps.get(&iface).unwrap().lock().unwrap();
            match tap.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => continue,
            }
        };
        router.handle_frame(&iface, &buf[..n]);
    }
}
