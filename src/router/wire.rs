//! Ethernet, ARP and ICMP wire formats. None of these are covered by
//! `etherparse` (it only reaches as far as IPv4/TCP/UDP), so they're
//! hand-rolled here the same way `tcp::ioutil` builds segments: a plain
//! struct per header, parsed and written with `byteorder`.

use std::io::{self, Cursor, Read, Write};
use std::net::Ipv4Addr;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

pub type MacAddr = [u8; 6];

pub const BROADCAST_MAC: MacAddr = [0xff; 6];

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

pub const ARP_HTYPE_ETHERNET: u16 = 1;
pub const ARP_OPER_REQUEST: u16 = 1;
pub const ARP_OPER_REPLY: u16 = 2;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_DEST_UNREACHABLE: u8 = 3;
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_TIME_EXCEEDED: u8 = 11;

pub const ICMP_CODE_NET_UNREACHABLE: u8 = 0;
pub const ICMP_CODE_HOST_UNREACHABLE: u8 = 1;
pub const ICMP_CODE_PROTO_UNREACHABLE: u8 = 2;
pub const ICMP_CODE_PORT_UNREACHABLE: u8 = 3;
pub const ICMP_CODE_TTL_EXCEEDED: u8 = 0;

/// 16-bit ones-complement checksum over `data` (RFC 1071), with the
/// all-zero result mapped to the wire's reserved all-ones encoding.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum = 0u32;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    let csum = !(sum as u16);
    if csum == 0 {
        0xffff
    } else {
        csum
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    pub const LEN: usize = 14;

    pub fn parse(buf: &[u8]) -> Option<(Self, &[u8])> {
        if buf.len() < Self::LEN {
            return None;
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&buf[0..6]);
        src.copy_from_slice(&buf[6..12]);
        let ethertype = u16::from_be_bytes([buf[12], buf[13]]);
        Some((EthernetHeader { dst, src, ethertype }, &buf[Self::LEN..]))
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.dst);
        out.extend_from_slice(&self.src);
        out.extend_from_slice(&self.ethertype.to_be_bytes());
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ArpPacket {
    pub oper: u16,
    pub sha: MacAddr,
    pub spa: Ipv4Addr,
    pub tha: MacAddr,
    pub tpa: Ipv4Addr,
}

impl ArpPacket {
    pub const LEN: usize = 28;

    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::LEN {
            return None;
        }
        let mut cur = Cursor::new(buf);
        let htype = cur.read_u16::<BigEndian>().ok()?;
        let ptype = cur.read_u16::<BigEndian>().ok()?;
        let hlen = cur.read_u8().ok()?;
        let plen = cur.read_u8().ok()?;
        if htype != ARP_HTYPE_ETHERNET || ptype != ETHERTYPE_IPV4 || hlen != 6 || plen != 4 {
            return None;
        }
        let oper = cur.read_u16::<BigEndian>().ok()?;
        let mut sha = [0u8; 6];
        cur.read_exact(&mut sha).ok()?;
        let spa = Ipv4Addr::from(cur.read_u32::<BigEndian>().ok()?);
        let mut tha = [0u8; 6];
        cur.read_exact(&mut tha).ok()?;
        let tpa = Ipv4Addr::from(cur.read_u32::<BigEndian>().ok()?);
        Some(ArpPacket { oper, sha, spa, tha, tpa })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.write_u16::<BigEndian>(ARP_HTYPE_ETHERNET).unwrap();
        buf.write_u16::<BigEndian>(ETHERTYPE_IPV4).unwrap();
        buf.write_u8(6).unwrap();
        buf.write_u8(4).unwrap();
        buf.write_u16::<BigEndian>(self.oper).unwrap();
        buf.extend_from_slice(&self.sha);
        buf.extend_from_slice(&self.spa.octets());
        buf.extend_from_slice(&self.tha);
        buf.extend_from_slice(&self.tpa.octets());
        out.extend_from_slice(&buf);
    }
}

/// ICMP header plus body, carried as an opaque byte payload: the four
/// message kinds this router emits (echo reply, dest-unreachable,
/// time-exceeded) all share the 8-byte header and just differ in what
/// follows it, so there's no value in a variant-per-message type.
#[derive(Debug, Clone)]
pub struct IcmpMessage {
    pub icmp_type: u8,
    pub code: u8,
    pub rest: [u8; 4],
    pub payload: Vec<u8>,
}

impl IcmpMessage {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 8 {
            return None;
        }
        let mut rest = [0u8; 4];
        rest.copy_from_slice(&buf[4..8]);
        Some(IcmpMessage { icmp_type: buf[0], code: buf[1], rest, payload: buf[8..].to_vec() })
    }

    pub fn echo_reply_to(request: &IcmpMessage) -> IcmpMessage {
        IcmpMessage {
            icmp_type: ICMP_ECHO_REPLY,
            code: 0,
            rest: request.rest,
            payload: request.payload.clone(),
        }
    }

    pub fn unreachable(code: u8, original_ip_packet: &[u8]) -> IcmpMessage {
        let mut payload = original_ip_packet.to_vec();
        payload.truncate(original_header_len(original_ip_packet) + 8);
        IcmpMessage { icmp_type: ICMP_DEST_UNREACHABLE, code, rest: [0; 4], payload }
    }

    pub fn time_exceeded(original_ip_packet: &[u8]) -> IcmpMessage {
        let mut payload = original_ip_packet.to_vec();
        payload.truncate(original_header_len(original_ip_packet) + 8);
        IcmpMessage { icmp_type: ICMP_TIME_EXCEEDED, code: ICMP_CODE_TTL_EXCEEDED, rest: [0; 4], payload }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let mut body = Vec::with_capacity(8 + self.payload.len());
        body.push(self.icmp_type);
        body.push(self.code);
        body.extend_from_slice(&[0, 0]); // checksum placeholder
        body.extend_from_slice(&self.rest);
        body.extend_from_slice(&self.payload);

        let csum = internet_checksum(&body).to_be_bytes();
        body[2] = csum[0];
        body[3] = csum[1];

        out.write_all(&body)
    }
}

fn original_header_len(ip_packet: &[u8]) -> usize {
    ip_packet.first().map(|b| ((b & 0x0f) * 4) as usize).unwrap_or(20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_empty_is_all_ones() {
        assert_eq!(internet_checksum(&[]), 0xffff);
    }

    #[test]
    fn arp_round_trips() {
        let pkt = ArpPacket {
            oper: ARP_OPER_REQUEST,
            sha: [1, 2, 3, 4, 5, 6],
            spa: Ipv4Addr::new(10, 0, 0, 1),
            tha: [0; 6],
            tpa: Ipv4Addr::new(10, 0, 0, 2),
        };
        let mut buf = Vec::new();
        pkt.write_to(&mut buf);
        let parsed = ArpPacket::parse(&buf).unwrap();
        assert_eq!(parsed.oper, ARP_OPER_REQUEST);
        assert_eq!(parsed.spa, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(parsed.tpa, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn echo_reply_copies_identifier_and_payload() {
        let req = IcmpMessage { icmp_type: ICMP_ECHO_REQUEST, code: 0, rest: [0, 7, 0, 1], payload: vec![1, 2, 3] };
        let reply = IcmpMessage::echo_reply_to(&req);
        assert_eq!(reply.icmp_type, ICMP_ECHO_REPLY);
        assert_eq!(reply.rest, req.rest);
        assert_eq!(reply.payload, req.payload);
    }
}
