//! Wire encode/decode between `etherparse`'s IPv4/TCP header views and the
//! stack's own `SegmentIn`/`OutSegment`/`Quad` types, plus the raw-write
//! helper used for segments that have no owning `Tcb` (stateless resets).

use std::io::{Read, Write};

use etherparse::{Ipv4Header, Ipv4HeaderSlice, TcpHeader, TcpHeaderSlice};
use tidy_tuntap::Tun;

use super::types::{reset_for, Dual, OutSegment, Quad, SegmentIn};

/// Parse one IP packet pulled off the tun device. Returns `None` for
/// anything that isn't a well-formed IPv4/TCP segment; such packets are
/// silently dropped, matching the original stack's tun-reader loop.
pub fn parse_segment(buf: &[u8]) -> Option<(Quad, SegmentIn)> {
    let ip4h = Ipv4HeaderSlice::from_slice(buf).ok()?;
    if ip4h.protocol() != 6 {
        return None;
    }

    let l4_start = (ip4h.ihl() * 4) as usize;
    let tcph = TcpHeaderSlice::from_slice(&buf[l4_start..]).ok()?;
    let data_start = l4_start + (tcph.data_offset() * 4) as usize;
    let data = buf.get(data_start..)?.to_vec();

    let quad = Quad {
        src: Dual { ipv4: ip4h.source_addr(), port: tcph.source_port() },
        dst: Dual { ipv4: ip4h.destination_addr(), port: tcph.destination_port() },
    };

    let seg = SegmentIn {
        seq: tcph.sequence_number(),
        ack: tcph.acknowledgment_number(),
        wnd: tcph.window_size(),
        syn: tcph.syn(),
        ack_flag: tcph.ack(),
        fin: tcph.fin(),
        rst: tcph.rst(),
        data,
    };

    Some((quad, seg))
}

/// Write `seg` out on `quad` (whose `src` is the local address the segment
/// is sent *from* — i.e. the segment's source is `quad.src`).
pub fn write_segment(tun: &mut Tun, quad: &Quad, seg: &OutSegment) -> std::io::Result<()> {
    let mut tcph = TcpHeader::new(quad.src.port, quad.dst.port, seg.seq, seg.wnd);
    tcph.acknowledgment_number = seg.ack;
    tcph.syn = seg.syn;
    tcph.ack = seg.ack_flag;
    tcph.fin = seg.fin;
    tcph.rst = seg.rst;

    let ip4h = Ipv4Header::new(
        tcph.header_len() + seg.data.len() as u16,
        64,
        6,
        quad.src.ipv4.octets(),
        quad.dst.ipv4.octets(),
    );

    tcph.checksum = tcph
        .calc_checksum_ipv4(&ip4h, &seg.data)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let mut buf = Vec::with_capacity(ip4h.header_len() + tcph.header_len() as usize + seg.data.len());
    ip4h.write(&mut buf)?;
    tcph.write(&mut buf)?;
    buf.write_all(&seg.data)?;

    tun.write(&buf)?;
    Ok(())
}

/// A RST for a segment that arrived with nothing listening on its
/// destination port, so there's no `Tcb` to run it through.
pub fn write_stateless_reset(tun: &mut Tun, quad: &Quad, seg: &SegmentIn) -> std::io::Result<()> {
    if seg.rst {
        return Ok(());
    }
    // `reset_for` assumes it's being asked "reply to this inbound
    // segment", so the reply's source is the segment's destination.
    let reply_quad = Quad { src: quad.dst, dst: quad.src };
    write_segment(tun, &reply_quad, &reset_for(seg))
}

pub fn read_packet(tun: &mut Tun, buf: &mut [u8]) -> std::io::Result<usize> {
    tun.read(buf)
}
