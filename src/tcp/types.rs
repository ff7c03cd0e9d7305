use std::net::Ipv4Addr;
use std::time::Duration;

pub const TCP_MSS: u16 = 536;
pub const RECV_BUF_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dual {
    pub ipv4: Ipv4Addr,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quad {
    pub src: Dual,
    pub dst: Dual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Listen,
    SynSent,
    SynRcvd,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
    TimeWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Active,
    Passive,
}

/// A segment as handed from the network driver to a connection's event
/// queue: parsed header fields plus an owned copy of the payload.
#[derive(Debug, Clone)]
pub struct SegmentIn {
    pub seq: u32,
    pub ack: u32,
    pub wnd: u16,
    pub syn: bool,
    pub ack_flag: bool,
    pub fin: bool,
    pub rst: bool,
    pub data: Vec<u8>,
}

/// A segment the transition function wants the driver to put on the wire.
#[derive(Debug, Clone)]
pub struct OutSegment {
    pub seq: u32,
    pub ack: u32,
    pub wnd: u16,
    pub syn: bool,
    pub ack_flag: bool,
    pub fin: bool,
    pub rst: bool,
    pub data: Vec<u8>,
}

impl OutSegment {
    pub fn len(&self) -> u32 {
        self.data.len() as u32 + self.syn as u32 + self.fin as u32
    }
}

#[derive(Debug)]
pub enum Event {
    ApplicationConnect,
    /// New bytes were queued into the send buffer by the application.
    ApplicationSend,
    ApplicationClose,
    PacketArrival(SegmentIn),
    TimeoutRtx,
    TimeoutPersist,
    Cleanup,
}

/// One effect the transition function asks the driver to perform. A single
/// event may produce several actions (e.g. deliver data to the app AND ack
/// it AND re-arm a timer).
/// Build the reset segment §4.1's RST-handling calls for whenever a
/// segment arrives that has no business being accepted.
pub fn reset_for(seg: &SegmentIn) -> OutSegment {
    let seq = if seg.ack_flag { seg.ack } else { 0 };
    let ack = seg
        .seq
        .wrapping_add(seg.data.len() as u32)
        .wrapping_add(seg.syn as u32);
    OutSegment {
        seq,
        ack,
        wnd: 0,
        syn: false,
        ack_flag: !seg.ack_flag,
        fin: false,
        rst: true,
        data: Vec::new(),
    }
}

#[derive(Debug)]
pub enum Action {
    Send(OutSegment),
    ArmRtx(Duration),
    CancelRtx,
    ArmPersist(Duration),
    CancelPersist,
    NotifyReader,
    NotifyWriter,
    NotifyCloser,
    /// The TCB has just reached ESTABLISHED from a passive OPEN; move it
    /// from the pending map onto the listening port's accept queue.
    BecameEstablished,
    DeleteTcb,
    ConnectionRefused,
    Reset,
}
