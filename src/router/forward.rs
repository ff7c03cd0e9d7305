//! Per-frame dispatch: EtherType routing, ARP request/reply handling, IPv4
//! longest-prefix forwarding and ICMP error synthesis. One thread per
//! interface feeds frames in here (see `mod.rs`'s driver loop); dispatch
//! itself runs single-threaded per call, serialized by the caller.

use std::net::Ipv4Addr;

use etherparse::{Ipv4Header, Ipv4HeaderSlice};

use super::arp::WithheldFrame;
use super::route::RoutingTable;
use super::wire::{
    ArpPacket, EthernetHeader, IcmpMessage, ARP_OPER_REPLY, ARP_OPER_REQUEST, ETHERTYPE_ARP,
    ETHERTYPE_IPV4, ICMP_CODE_HOST_UNREACHABLE, ICMP_CODE_NET_UNREACHABLE, ICMP_CODE_PORT_UNREACHABLE,
    ICMP_ECHO_REQUEST,
};
use super::Router;

impl Router {
    /// Entry point for a frame read off `in_iface`. Mirrors the tun reader
    /// loop in `tcp::mod`: parse, look at the dst, dispatch by EtherType.
    pub fn handle_frame(&self, in_iface: &str, frame: &[u8]) {
        let Some((eth, payload)) = EthernetHeader::parse(frame) else { return };

        match eth.ethertype {
            ETHERTYPE_IPV4 => self.handle_ipv4(in_iface, &eth, payload),
            ETHERTYPE_ARP => self.handle_arp(in_iface, payload),
            other => log::debug!("dropping frame with unhandled ethertype 0x{other:04x}"),
        }
    }

    fn handle_ipv4(&self, in_iface: &str, eth: &EthernetHeader, ip_bytes: &[u8]) {
        let Some(in_if) = self.interface(in_iface) else { return };
        if eth.dst != in_if.mac && eth.dst != super::wire::BROADCAST_MAC {
            return;
        }

        let Ok(ip4h) = Ipv4HeaderSlice::from_slice(ip_bytes) else { return };
        let dst = ip4h.destination_addr();
        let ttl = ip4h.ttl();
        let proto = ip4h.protocol();

        if let Some(owner) = self.interface_by_addr(dst) {
            if owner.name != in_if.name {
                self.send_icmp_unreachable(in_if, eth, ip_bytes, ICMP_CODE_HOST_UNREACHABLE);
                return;
            }
            if ttl <= 1 {
                self.send_icmp_time_exceeded(in_if, eth, ip_bytes);
                return;
            }
            match proto {
                6 | 17 => self.send_icmp_unreachable(in_if, eth, ip_bytes, ICMP_CODE_PORT_UNREACHABLE),
                1 => self.handle_icmp_to_router(in_if, eth, ip_bytes),
                _ => log::debug!("dropping unsupported protocol {proto} addressed to router"),
            }
            return;
        }

        if ttl <= 1 {
            self.send_icmp_time_exceeded(in_if, eth, ip_bytes);
            return;
        }

        let Some(route) = self.routes.lock().unwrap().lookup(dst).cloned() else {
            self.send_icmp_unreachable(in_if, eth, ip_bytes, ICMP_CODE_NET_UNREACHABLE);
            return;
        };
        let next_hop = RoutingTable::next_hop(&route, dst);

        let mac = self.arp_cache.lock().unwrap().lookup(next_hop);
        match mac {
            Some(mac) => self.forward_ip_packet(&route.iface, mac, ip_bytes),
            None => {
                let is_new = self.pending.lock().unwrap().enqueue(next_hop, route.iface.clone(), ip_bytes.to_vec());
                if is_new {
                    self.send_arp_request(&route.iface, next_hop);
                }
            }
        }
    }

    /// Decrement TTL and rewrite Ethernet addressing, or emit Time
    /// Exceeded in TTL's place, then transmit on `iface`.
    fn forward_ip_packet(&self, iface: &str, dst_mac: [u8; 6], ip_bytes: &[u8]) {
        let Ok(slice) = Ipv4HeaderSlice::from_slice(ip_bytes) else { return };
        let Some(out_if) = self.interface(iface) else { return };

        if slice.ttl() <= 1 {
            // Replaying a withheld frame whose TTL expired while it sat in
            // the pending-ARP queue: reply on the same outbound link,
            // resolving the original sender's MAC from the cache rather
            // than re-entering the pending-ARP machinery for it.
            let Some(sender_mac) = self.arp_cache.lock().unwrap().lookup(slice.source_addr()) else {
                log::debug!("dropping expired-ttl icmp reply: {} not in arp cache", slice.source_addr());
                return;
            };
            let fake_in_eth = EthernetHeader { dst: out_if.mac, src: sender_mac, ethertype: ETHERTYPE_IPV4 };
            self.reply_icmp(out_if, &fake_in_eth, ip_bytes, slice.source_addr(), IcmpMessage::time_exceeded(ip_bytes));
            return;
        }

        let header_len = (slice.ihl() as usize) * 4;
        let mut header = Ipv4Header::new(
            slice.payload_len(),
            slice.ttl() - 1,
            slice.protocol(),
            slice.source_addr().octets(),
            slice.destination_addr().octets(),
        );
        header.identification = slice.identification();

        let mut out = Vec::with_capacity(ip_bytes.len());
        let _ = header.write(&mut out);
        out.extend_from_slice(&ip_bytes[header_len..]);

        let eth = EthernetHeader { dst: dst_mac, src: out_if.mac, ethertype: ETHERTYPE_IPV4 };
        let mut frame = Vec::with_capacity(EthernetHeader::LEN + out.len());
        eth.write_to(&mut frame);
        frame.extend_from_slice(&out);

        if let Err(e) = self.send_frame(iface, &frame) {
            log::warn!("failed forwarding frame on {iface}: {e}");
        }
    }

    fn handle_icmp_to_router(&self, in_if: &super::Interface, eth: &EthernetHeader, ip_bytes: &[u8]) {
        let header_len = Ipv4HeaderSlice::from_slice(ip_bytes).map(|h| (h.ihl() as usize) * 4).unwrap_or(20);
        let Some(icmp) = IcmpMessage::parse(&ip_bytes[header_len..]) else { return };
        if icmp.icmp_type != ICMP_ECHO_REQUEST {
            return;
        }
        let Ok(slice) = Ipv4HeaderSlice::from_slice(ip_bytes) else { return };
        let reply = IcmpMessage::echo_reply_to(&icmp);
        self.reply_icmp(in_if, eth, ip_bytes, slice.source_addr(), reply);
    }

    fn send_icmp_unreachable(&self, in_if: &super::Interface, eth: &EthernetHeader, ip_bytes: &[u8], code: u8) {
        let Ok(slice) = Ipv4HeaderSlice::from_slice(ip_bytes) else { return };
        let msg = IcmpMessage::unreachable(code, ip_bytes);
        self.reply_icmp(in_if, eth, ip_bytes, slice.source_addr(), msg);
    }

    fn send_icmp_time_exceeded(&self, in_if: &super::Interface, eth: &EthernetHeader, ip_bytes: &[u8]) {
        let Ok(slice) = Ipv4HeaderSlice::from_slice(ip_bytes) else { return };
        let msg = IcmpMessage::time_exceeded(ip_bytes);
        self.reply_icmp(in_if, eth, ip_bytes, slice.source_addr(), msg);
    }

    /// Common ICMP-reply tail: Ethernet addresses swapped, IP src set to
    /// the in-interface address, checksum recomputed on write.
    pub(super) fn reply_icmp(
        &self,
        in_if: &super::Interface,
        in_eth: &EthernetHeader,
        _original_ip: &[u8],
        dst_ip: Ipv4Addr,
        msg: IcmpMessage,
    ) {
        let mut body = Vec::new();
        if msg.write_to(&mut body).is_err() {
            return;
        }

        let ip_header = Ipv4Header::new(body.len() as u16, 64, 1, in_if.addr.octets(), dst_ip.octets());
        let mut ip_bytes = Vec::with_capacity(ip_header.header_len() + body.len());
        if ip_header.write(&mut ip_bytes).is_err() {
            return;
        }
        ip_bytes.extend_from_slice(&body);

        let reply_eth = EthernetHeader { dst: in_eth.src, src: in_if.mac, ethertype: ETHERTYPE_IPV4 };
        let mut frame = Vec::with_capacity(EthernetHeader::LEN + ip_bytes.len());
        reply_eth.write_to(&mut frame);
        frame.extend_from_slice(&ip_bytes);

        if let Err(e) = self.send_frame(&in_if.name, &frame) {
            log::warn!("failed sending icmp reply on {}: {e}", in_if.name);
        }
    }

    fn handle_arp(&self, in_iface: &str, payload: &[u8]) {
        let Some(arp) = ArpPacket::parse(payload) else { return };
        let Some(in_if) = self.interface(in_iface) else { return };

        match arp.oper {
            ARP_OPER_REQUEST => {
                if let Some(owner) = self.interface_by_addr(arp.tpa) {
                    self.send_arp_reply(&owner.name, owner.mac, owner.addr, arp.sha, arp.spa);
                } else {
                    // No interface owns the queried address: synthesize a
                    // minimal "original packet" so the usual ICMP builder
                    // can still quote a source/dest pair back.
                    let synth = Ipv4Header::new(0, 0, 0, arp.spa.octets(), arp.tpa.octets());
                    let mut synth_bytes = Vec::new();
                    let _ = synth.write(&mut synth_bytes);
                    let msg = IcmpMessage::unreachable(ICMP_CODE_HOST_UNREACHABLE, &synth_bytes);
                    let fake_in_eth = EthernetHeader { dst: in_if.mac, src: arp.sha, ethertype: ETHERTYPE_ARP };
                    self.reply_icmp(in_if, &fake_in_eth, &synth_bytes, arp.spa, msg);
                }
            }
            ARP_OPER_REPLY => {
                self.arp_cache.lock().unwrap().insert(arp.spa, arp.sha);
                if let Some(entry) = self.pending.lock().unwrap().take(arp.spa) {
                    for WithheldFrame { bytes, iface } in entry.withheld {
                        self.forward_ip_packet(&iface, arp.sha, &bytes);
                    }
                }
            }
            other => log::debug!("dropping arp packet with unknown oper {other}"),
        }
    }

    fn send_arp_reply(&self, iface: &str, iface_mac: [u8; 6], iface_addr: Ipv4Addr, to_mac: [u8; 6], to_ip: Ipv4Addr) {
        let reply = ArpPacket { oper: ARP_OPER_REPLY, sha: iface_mac, spa: iface_addr, tha: to_mac, tpa: to_ip };
        let eth = EthernetHeader { dst: to_mac, src: iface_mac, ethertype: ETHERTYPE_ARP };
        let mut frame = Vec::new();
        eth.write_to(&mut frame);
        reply.write_to(&mut frame);
        if let Err(e) = self.send_frame(iface, &frame) {
            log::warn!("failed sending arp reply on {iface}: {e}");
        }
    }

    pub(crate) fn send_arp_request(&self, iface: &str, target: Ipv4Addr) {
        let Some(out_if) = self.interface(iface) else { return };
        let request = ArpPacket {
            oper: ARP_OPER_REQUEST,
            sha: out_if.mac,
            spa: out_if.addr,
            tha: [0; 6],
            tpa: target,
        };
        let eth = EthernetHeader { dst: super::wire::BROADCAST_MAC, src: out_if.mac, ethertype: ETHERTYPE_ARP };
        let mut frame = Vec::new();
        eth.write_to(&mut frame);
        request.write_to(&mut frame);
        if let Err(e) = self.send_frame(iface, &frame) {
            log::warn!("failed sending arp request on {iface}: {e}");
        }
    }
}
