//! The TCP state machine: one `Tcb` per connection, driven by
//! `Tcb::on_event`, a pure `(state, event) -> (state, actions)` transition.
//! All I/O — writing segments, arming timers, waking blocked readers/writers
//! — is pushed out as `Action`s for the owning connection actor to perform.

use std::cmp;
use std::collections::VecDeque;
use std::time::Instant;

use rand::Rng;

use super::buffer::SeqBuffer;
use super::reassembly::OutOfOrder;
use super::rto::RtoEstimator;
use super::seqnum::{is_between_wrapped, wrapping_lt};
use super::types::*;

/// Thresholds past which a segment that can never be acked gives up on the
/// connection (RFC 793 §3.8.3's R1/R2), carried over from the original
/// chitcpd/handshake retransmission back-off policy (see SPEC_FULL §B).
const R2_DATA: std::time::Duration = std::time::Duration::from_secs(100);
const R2_SYN: std::time::Duration = std::time::Duration::from_secs(3 * 60);

#[derive(Debug)]
pub struct RtxEntry {
    pub seq: u32,
    pub data: Vec<u8>,
    pub syn: bool,
    pub fin: bool,
    pub sent_at: Instant,
    pub expected_ack: u32,
    pub retransmitted: bool,
    pub total_retransmit_time: std::time::Duration,
}

impl RtxEntry {
    fn len(&self) -> u32 {
        self.data.len() as u32 + self.syn as u32 + self.fin as u32
    }

    fn to_out_segment(&self, ack: u32, wnd: u16) -> OutSegment {
        OutSegment {
            seq: self.seq,
            ack,
            wnd,
            syn: self.syn,
            ack_flag: true,
            fin: self.fin,
            rst: false,
            data: self.data.clone(),
        }
    }
}

#[derive(Debug)]
pub struct PersistProbe {
    pub byte: u8,
}

#[derive(Debug)]
pub struct Tcb {
    pub quad: Quad,
    pub kind: Kind,
    pub state: State,
    pub closing: bool,

    pub iss: u32,
    pub snd_una: u32,
    pub snd_nxt: u32,
    pub snd_wnd: u16,
    pub snd_wl1: u32,
    pub snd_wl2: u32,

    pub irs: u32,
    pub rcv_nxt: u32,
    pub rcv_wnd: u16,

    pub mss: u16,

    pub send_buf: SeqBuffer,
    pub recv_buf: SeqBuffer,
    pub ooo: OutOfOrder,

    pub rtx_queue: VecDeque<RtxEntry>,
    pub rto: RtoEstimator,
    pub persist_probe: Option<PersistProbe>,
}

fn random_iss() -> u32 {
    rand::thread_rng().gen()
}

impl Tcb {
    pub fn listen(quad: Quad) -> Self {
        Tcb {
            quad,
            kind: Kind::Passive,
            state: State::Listen,
            closing: false,
            iss: 0,
            snd_una: 0,
            snd_nxt: 0,
            snd_wnd: 0,
            snd_wl1: 0,
            snd_wl2: 0,
            irs: 0,
            rcv_nxt: 0,
            rcv_wnd: RECV_BUF_CAPACITY as u16,
            mss: TCP_MSS,
            send_buf: SeqBuffer::new(0, 0),
            recv_buf: SeqBuffer::new(0, RECV_BUF_CAPACITY),
            ooo: OutOfOrder::new(),
            rtx_queue: VecDeque::new(),
            rto: RtoEstimator::new(),
            persist_probe: None,
        }
    }

    pub fn active_open(quad: Quad) -> Self {
        let iss = random_iss();
        Tcb {
            quad,
            kind: Kind::Active,
            state: State::Closed,
            closing: false,
            iss,
            snd_una: iss,
            snd_nxt: iss,
            snd_wnd: 0,
            snd_wl1: 0,
            snd_wl2: 0,
            irs: 0,
            rcv_nxt: 0,
            rcv_wnd: RECV_BUF_CAPACITY as u16,
            mss: TCP_MSS,
            send_buf: SeqBuffer::new(iss, 64 * 1024),
            recv_buf: SeqBuffer::new(0, RECV_BUF_CAPACITY),
            ooo: OutOfOrder::new(),
            rtx_queue: VecDeque::new(),
            rto: RtoEstimator::new(),
            persist_probe: None,
        }
    }

    pub fn is_outgoing_full(&self) -> bool {
        self.send_buf.is_full()
    }

    fn is_fin_acked(&self) -> bool {
        self.rtx_queue.is_empty() && self.snd_una == self.snd_nxt && self.closing
    }

    pub fn recv(&mut self, buf: &mut [u8]) -> usize {
        self.recv_buf.read_front(buf)
    }

    pub fn on_event(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::ApplicationConnect => self.on_application_connect(),
            Event::ApplicationSend => self.pump_transmit(),
            Event::ApplicationClose => self.on_application_close(),
            Event::PacketArrival(seg) => self.on_packet_arrival(seg),
            Event::TimeoutRtx => self.on_timeout_rtx(),
            Event::TimeoutPersist => self.on_timeout_persist(),
            Event::Cleanup => self.on_cleanup(),
        }
    }

    // ---- connection establishment -----------------------------------

    fn on_application_connect(&mut self) -> Vec<Action> {
        self.state = State::SynSent;

        let entry = RtxEntry {
            seq: self.iss,
            data: Vec::new(),
            syn: true,
            fin: false,
            sent_at: Instant::now(),
            expected_ack: self.iss.wrapping_add(1),
            retransmitted: false,
            total_retransmit_time: std::time::Duration::ZERO,
        };
        self.snd_nxt = self.iss.wrapping_add(1);

        let seg = OutSegment {
            seq: entry.seq,
            ack: 0,
            wnd: self.rcv_wnd,
            syn: true,
            ack_flag: false,
            fin: false,
            rst: false,
            data: Vec::new(),
        };
        self.rtx_queue.push_back(entry);

        vec![Action::Send(seg), Action::ArmRtx(self.rto.rto())]
    }

    fn on_application_close(&mut self) -> Vec<Action> {
        self.closing = true;

        match self.state {
            State::Established => self.state = State::FinWait1,
            State::CloseWait => self.state = State::LastAck,
            _ => {}
        }

        let mut actions = self.pump_transmit();

        // pump_transmit only emits a FIN once the send buffer has drained;
        // if it's already empty there's nothing left to drain, so emit it
        // directly here.
        if self.send_buf.is_empty() && !self.fin_already_queued() {
            actions.extend(self.queue_fin());
        }

        actions
    }

    fn fin_already_queued(&self) -> bool {
        self.rtx_queue.back().is_some_and(|e| e.fin)
    }

    fn queue_fin(&mut self) -> Vec<Action> {
        let entry = RtxEntry {
            seq: self.snd_nxt,
            data: Vec::new(),
            syn: false,
            fin: true,
            sent_at: Instant::now(),
            expected_ack: self.snd_nxt.wrapping_add(1),
            retransmitted: false,
            total_retransmit_time: std::time::Duration::ZERO,
        };
        let seg = entry.to_out_segment(self.rcv_nxt, self.rcv_wnd);
        self.snd_nxt = self.snd_nxt.wrapping_add(1);

        let mut actions = vec![Action::Send(seg)];
        if self.rtx_queue.is_empty() {
            actions.push(Action::ArmRtx(self.rto.rto()));
        }
        self.rtx_queue.push_back(entry);
        actions
    }

    // ---- transmit pump (§4.1 point 4) --------------------------------

    fn pump_transmit(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();

        loop {
            let sent_len = self.snd_nxt.wrapping_sub(self.snd_una) as usize;
            let usable_window = (self.snd_una.wrapping_add(self.snd_wnd as u32))
                .wrapping_sub(self.snd_nxt) as usize;
            let available = self.send_buf.len().saturating_sub(sent_len);
            let to_send = cmp::min(available, usable_window);

            if to_send == 0 {
                break;
            }

            let data_len = cmp::min(to_send, self.mss as usize);
            let data = self.send_buf.peek_at(self.snd_nxt, data_len);
            let fin = data.len() == available && self.closing && to_send == available;

            let entry = RtxEntry {
                seq: self.snd_nxt,
                data: data.clone(),
                syn: false,
                fin,
                sent_at: Instant::now(),
                expected_ack: self
                    .snd_nxt
                    .wrapping_add(data.len() as u32)
                    .wrapping_add(fin as u32),
                retransmitted: false,
                total_retransmit_time: std::time::Duration::ZERO,
            };

            let seg = entry.to_out_segment(self.rcv_nxt, self.rcv_wnd);
            self.snd_nxt = entry.expected_ack;

            let arm_timer = self.rtx_queue.is_empty();
            self.rtx_queue.push_back(entry);

            actions.push(Action::Send(seg));
            if arm_timer {
                actions.push(Action::ArmRtx(self.rto.rto()));
            }
        }

        // If the application closed and the buffer has now drained, the
        // FIN still needs to go out even though the loop above only sends
        // from send_buf.
        if self.closing && self.send_buf.is_empty() && !self.fin_already_queued() {
            match self.state {
                State::Established => self.state = State::FinWait1,
                State::CloseWait => self.state = State::LastAck,
                _ => {}
            }
            actions.extend(self.queue_fin());
        }

        actions
    }

    // ---- packet arrival ------------------------------------------------

    fn on_packet_arrival(&mut self, seg: SegmentIn) -> Vec<Action> {
        match self.state {
            State::Listen => self.on_packet_listen(seg),
            State::SynSent => self.on_packet_syn_sent(seg),
            _ => self.on_packet_synchronized(seg),
        }
    }

    fn on_packet_listen(&mut self, seg: SegmentIn) -> Vec<Action> {
        if seg.rst {
            return vec![];
        }
        if seg.ack_flag {
            return vec![Action::Send(reset_for(&seg))];
        }
        if !seg.syn {
            return vec![];
        }

        self.iss = random_iss();
        self.irs = seg.seq;
        self.rcv_nxt = seg.seq.wrapping_add(1);
        self.snd_una = self.iss;
        self.snd_nxt = self.iss.wrapping_add(1);
        self.snd_wnd = seg.wnd;
        self.send_buf = SeqBuffer::new(self.snd_nxt, 64 * 1024);

        let entry = RtxEntry {
            seq: self.iss,
            data: Vec::new(),
            syn: true,
            fin: false,
            sent_at: Instant::now(),
            expected_ack: self.iss.wrapping_add(1),
            retransmitted: false,
            total_retransmit_time: std::time::Duration::ZERO,
        };
        let out = OutSegment {
            seq: entry.seq,
            ack: self.rcv_nxt,
            wnd: self.rcv_wnd,
            syn: true,
            ack_flag: true,
            fin: false,
            rst: false,
            data: Vec::new(),
        };
        self.rtx_queue.push_back(entry);
        self.state = State::SynRcvd;

        vec![Action::Send(out), Action::ArmRtx(self.rto.rto())]
    }

    fn on_packet_syn_sent(&mut self, seg: SegmentIn) -> Vec<Action> {
        if seg.ack_flag {
            let acceptable =
                is_between_wrapped(self.snd_una.wrapping_sub(1), seg.ack, self.snd_nxt.wrapping_add(1));
            if !acceptable {
                if seg.rst {
                    return vec![];
                }
                return vec![Action::Send(reset_for(&seg))];
            }
            if seg.rst {
                return vec![Action::Reset];
            }
        }

        if !seg.syn {
            return vec![];
        }

        self.irs = seg.seq;
        self.rcv_nxt = seg.seq.wrapping_add(1);
        self.snd_wnd = seg.wnd;
        self.snd_wl1 = seg.seq;

        if seg.ack_flag {
            self.snd_una = seg.ack;
            self.rtx_queue.clear();

            self.recv_buf = SeqBuffer::new(self.rcv_nxt, RECV_BUF_CAPACITY);
            self.state = State::Established;

            let ack_seg = OutSegment {
                seq: self.snd_nxt,
                ack: self.rcv_nxt,
                wnd: self.rcv_wnd,
                syn: false,
                ack_flag: true,
                fin: false,
                rst: false,
                data: Vec::new(),
            };
            vec![Action::Send(ack_seg), Action::CancelRtx, Action::BecameEstablished]
        } else {
            // simultaneous open
            self.state = State::SynRcvd;
            let synack = OutSegment {
                seq: self.iss,
                ack: self.rcv_nxt,
                wnd: self.rcv_wnd,
                syn: true,
                ack_flag: true,
                fin: false,
                rst: false,
                data: Vec::new(),
            };
            vec![Action::Send(synack)]
        }
    }

    /// §4.1 point 1: segment acceptability test.
    fn is_segment_valid(&self, seg: &SegmentIn) -> bool {
        let seg_len = seg.data.len() as u32 + seg.fin as u32;
        let wnd = self.rcv_wnd as u32;

        if seg_len == 0 && wnd == 0 {
            seg.seq == self.rcv_nxt
        } else if seg_len == 0 {
            is_between_wrapped(
                self.rcv_nxt.wrapping_sub(1),
                seg.seq,
                self.rcv_nxt.wrapping_add(wnd),
            )
        } else if wnd == 0 {
            false
        } else {
            is_between_wrapped(
                self.rcv_nxt.wrapping_sub(1),
                seg.seq,
                self.rcv_nxt.wrapping_add(wnd),
            ) || is_between_wrapped(
                self.rcv_nxt.wrapping_sub(1),
                seg.seq.wrapping_add(seg_len).wrapping_sub(1),
                self.rcv_nxt.wrapping_add(wnd),
            )
        }
    }

    fn on_packet_synchronized(&mut self, seg: SegmentIn) -> Vec<Action> {
        if !self.is_segment_valid(&seg) {
            if seg.rst {
                return vec![];
            }
            return vec![Action::Send(self.bare_ack())];
        }

        if seg.rst {
            return vec![Action::Reset];
        }

        if seg.syn {
            // RFC 5961 challenge ACK; we don't implement a genuine
            // mitigation, we just reset like the segment was unwelcome.
            return vec![Action::Send(reset_for(&seg)), Action::Reset];
        }

        if !seg.ack_flag {
            return vec![];
        }

        let mut actions = Vec::new();
        let mut wake_reader = false;
        let mut wake_writer = false;
        let mut wake_closer = false;

        if self.state == State::SynRcvd {
            if !is_between_wrapped(self.snd_una.wrapping_sub(1), seg.ack, self.snd_nxt.wrapping_add(1)) {
                return vec![Action::Send(reset_for(&seg))];
            }
            self.state = State::Established;
            self.snd_wnd = seg.wnd;
            self.snd_wl1 = seg.seq;
            self.snd_wl2 = seg.ack;
            self.rtx_queue.clear();
            actions.push(Action::CancelRtx);
            actions.push(Action::BecameEstablished);
        } else if matches!(
            self.state,
            State::Established | State::FinWait1 | State::FinWait2 | State::Closing
        ) {
            if is_between_wrapped(self.snd_una.wrapping_sub(1), seg.ack, self.snd_nxt.wrapping_add(1)) {
                let (drained, sample) = self.process_ack(seg.ack);
                if let Some(r) = sample {
                    self.rto.sample(r);
                }
                wake_writer = drained;

                if self.rtx_queue.is_empty() {
                    actions.push(Action::CancelRtx);
                } else {
                    actions.push(Action::ArmRtx(self.rto.rto()));
                }
            } else if wrapping_lt(self.snd_nxt, seg.ack) {
                return vec![Action::Send(self.bare_ack())];
            }

            if wrapping_lt(self.snd_wl1, seg.seq)
                || (self.snd_wl1 == seg.seq && !wrapping_lt(seg.ack, self.snd_wl2))
            {
                let was_zero = self.snd_wnd == 0;
                self.snd_wnd = seg.wnd;
                self.snd_wl1 = seg.seq;
                self.snd_wl2 = seg.ack;

                if self.snd_wnd == 0 && !self.send_buf.is_empty() {
                    actions.push(Action::ArmPersist(self.rto.rto()));
                } else if was_zero && self.snd_wnd > 0 {
                    self.persist_probe = None;
                    actions.push(Action::CancelPersist);
                }
            }
        } else if self.state == State::LastAck {
            let (_, _) = self.process_ack(seg.ack);
            if self.is_fin_acked() {
                return vec![Action::DeleteTcb];
            }
        } else if self.state == State::TimeWait {
            actions.push(Action::Send(self.bare_ack()));
        }

        if self.state == State::FinWait1 && self.is_fin_acked() {
            self.state = State::FinWait2;
        }
        if self.state == State::FinWait2 {
            wake_closer = true;
        }

        let mut process_fin = seg.fin;

        if matches!(self.state, State::Established | State::FinWait1 | State::FinWait2) {
            let offset = self.rcv_nxt.wrapping_sub(seg.seq) as usize;
            if offset <= seg.data.len() {
                let new_data = &seg.data[offset..];

                if seg.seq == self.rcv_nxt || offset > 0 {
                    let accept_len = cmp::min(new_data.len(), self.rcv_wnd as usize);
                    let accepted = &new_data[..accept_len];
                    process_fin &= accept_len == new_data.len();

                    let pre_nxt = self.rcv_nxt;
                    self.recv_buf.extend(accepted);
                    self.rcv_nxt = self.rcv_nxt.wrapping_add(accept_len as u32);
                    self.rcv_wnd = self.rcv_wnd.saturating_sub(accept_len as u16);

                    // drain any out-of-order segments this now makes contiguous
                    let (more, new_nxt) = self.ooo.drain_contiguous(self.rcv_nxt);
                    if !more.is_empty() {
                        self.recv_buf.extend(&more);
                        self.rcv_wnd = self.rcv_wnd.saturating_sub(more.len() as u16);
                        self.rcv_nxt = new_nxt;
                    }

                    if wrapping_lt(pre_nxt, self.rcv_nxt) || self.rcv_wnd == 0 {
                        actions.push(Action::Send(self.bare_ack()));
                    }
                    wake_reader = !accepted.is_empty() || !more.is_empty();
                } else if wrapping_lt(self.rcv_nxt, seg.seq) && !new_data.is_empty() {
                    // out of order: seq is strictly ahead of rcv_nxt
                    self.ooo.insert(seg.seq, new_data.to_vec());
                    process_fin = false;
                }
            }
        }

        if process_fin {
            match self.state {
                State::Listen | State::SynSent => return vec![],
                State::SynRcvd | State::Established => {
                    self.state = State::CloseWait;
                    self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
                    wake_reader = true;
                    actions.push(Action::Send(self.bare_ack()));
                }
                State::FinWait1 => {
                    self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
                    actions.push(Action::Send(self.bare_ack()));
                    if self.is_fin_acked() {
                        self.state = State::Closed;
                        return finish_actions(actions, vec![Action::DeleteTcb]);
                    } else {
                        self.state = State::Closing;
                    }
                }
                State::FinWait2 => {
                    self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
                    actions.push(Action::Send(self.bare_ack()));
                    self.state = State::Closed;
                    return finish_actions(actions, vec![Action::DeleteTcb]);
                }
                State::CloseWait | State::Closing | State::LastAck => {}
                State::TimeWait => {}
                State::Closed => {}
            }
        }

        if wake_reader {
            actions.push(Action::NotifyReader);
        }
        if wake_writer {
            actions.push(Action::NotifyWriter);
        }
        if wake_closer {
            actions.push(Action::NotifyCloser);
        }

        actions
    }

    fn bare_ack(&self) -> OutSegment {
        OutSegment {
            seq: self.snd_nxt,
            ack: self.rcv_nxt,
            wnd: self.rcv_wnd,
            syn: false,
            ack_flag: true,
            fin: false,
            rst: false,
            data: Vec::new(),
        }
    }

    /// §4.1 point 3 (ack processing). Returns whether the send buffer
    /// drained room for a blocked writer, and (if the oldest popped entry
    /// was sent exactly once) an RTT sample for the estimator — Karn's
    /// rule is enforced strictly: a retransmitted segment never yields a
    /// sample.
    fn process_ack(&mut self, ack: u32) -> (bool, Option<std::time::Duration>) {
        self.snd_una = ack;
        let before = self.send_buf.len();
        let mut sample = None;
        let mut oldest_popped = true;

        while let Some(front) = self.rtx_queue.front() {
            if wrapping_lt(front.seq.wrapping_add(front.len()).wrapping_sub(1), ack) {
                let popped = self.rtx_queue.pop_front().unwrap();
                if oldest_popped && !popped.retransmitted {
                    sample = Some(popped.sent_at.elapsed());
                }
                oldest_popped = false;
            } else {
                break;
            }
        }

        self.send_buf.advance_origin_to(ack);
        (self.send_buf.len() < before, sample)
    }

    // ---- timers ---------------------------------------------------------

    fn on_timeout_rtx(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();

        self.rto.backoff();

        let mut give_up = false;
        for entry in self.rtx_queue.iter_mut() {
            // §4.1 persist timer handles the zero-window case; skip
            // data-bearing retransmissions while the window is closed.
            if self.snd_wnd == 0 && !entry.data.is_empty() {
                continue;
            }
            entry.retransmitted = true;
            entry.sent_at = Instant::now();
            entry.total_retransmit_time += self.rto.rto();

            let threshold = if entry.syn { R2_SYN } else { R2_DATA };
            if entry.total_retransmit_time > threshold {
                give_up = true;
            }
        }

        if give_up {
            return vec![Action::ConnectionRefused];
        }

        for entry in self.rtx_queue.iter() {
            if self.snd_wnd == 0 && !entry.data.is_empty() {
                continue;
            }
            actions.push(Action::Send(entry.to_out_segment(self.rcv_nxt, self.rcv_wnd)));
        }

        if !self.rtx_queue.is_empty() {
            actions.push(Action::ArmRtx(self.rto.rto()));
        }

        actions
    }

    fn on_timeout_persist(&mut self) -> Vec<Action> {
        if self.send_buf.is_empty() {
            return vec![];
        }

        let byte = self
            .persist_probe
            .get_or_insert_with(|| PersistProbe {
                byte: self.send_buf.peek_at(self.snd_una, 1).first().copied().unwrap_or(0),
            })
            .byte;

        let probe = OutSegment {
            seq: self.snd_una.wrapping_sub(1),
            ack: self.rcv_nxt,
            wnd: self.rcv_wnd,
            syn: false,
            ack_flag: true,
            fin: false,
            rst: false,
            data: vec![byte],
        };

        vec![Action::Send(probe), Action::ArmPersist(self.rto.rto())]
    }

    fn on_cleanup(&mut self) -> Vec<Action> {
        self.rtx_queue.clear();
        vec![Action::CancelRtx, Action::CancelPersist]
    }
}

fn finish_actions(mut a: Vec<Action>, b: Vec<Action>) -> Vec<Action> {
    a.extend(b);
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syn_seg(seq: u32, wnd: u16) -> SegmentIn {
        SegmentIn {
            seq,
            ack: 0,
            wnd,
            syn: true,
            ack_flag: false,
            fin: false,
            rst: false,
            data: Vec::new(),
        }
    }

    fn quad() -> Quad {
        Quad {
            src: Dual { ipv4: "10.0.0.1".parse().unwrap(), port: 9090 },
            dst: Dual { ipv4: "10.0.0.2".parse().unwrap(), port: 4000 },
        }
    }

    #[test]
    fn passive_open_to_syn_rcvd() {
        let mut tcb = Tcb::listen(quad());
        let actions = tcb.on_event(Event::PacketArrival(syn_seg(1000, 4096)));
        assert_eq!(tcb.state, State::SynRcvd);
        assert!(actions.iter().any(|a| matches!(a, Action::Send(seg) if seg.syn && seg.ack_flag)));
        assert_eq!(tcb.rcv_nxt, 1001);
    }

    #[test]
    fn three_way_handshake_reaches_established() {
        let mut tcb = Tcb::listen(quad());
        tcb.on_event(Event::PacketArrival(syn_seg(1000, 4096)));
        let iss = tcb.iss;

        let ack = SegmentIn {
            seq: 1001,
            ack: iss.wrapping_add(1),
            wnd: 4096,
            syn: false,
            ack_flag: true,
            fin: false,
            rst: false,
            data: Vec::new(),
        };
        let actions = tcb.on_event(Event::PacketArrival(ack));
        assert_eq!(tcb.state, State::Established);
        assert!(actions.iter().any(|a| matches!(a, Action::BecameEstablished)));
    }

    #[test]
    fn out_of_order_segment_is_buffered_then_drained() {
        let mut tcb = Tcb::listen(quad());
        tcb.on_event(Event::PacketArrival(syn_seg(1000, 4096)));
        let iss = tcb.iss;
        tcb.on_event(Event::PacketArrival(SegmentIn {
            seq: 1001,
            ack: iss.wrapping_add(1),
            wnd: 4096,
            syn: false,
            ack_flag: true,
            fin: false,
            rst: false,
            data: Vec::new(),
        }));

        // second chunk arrives first
        tcb.on_event(Event::PacketArrival(SegmentIn {
            seq: 1005,
            ack: iss.wrapping_add(1),
            wnd: 4096,
            syn: false,
            ack_flag: true,
            fin: false,
            rst: false,
            data: b"world".to_vec(),
        }));
        assert!(!tcb.ooo.is_empty());
        assert_eq!(tcb.rcv_nxt, 1001);

        // first chunk fills the gap
        tcb.on_event(Event::PacketArrival(SegmentIn {
            seq: 1001,
            ack: iss.wrapping_add(1),
            wnd: 4096,
            syn: false,
            ack_flag: true,
            fin: false,
            rst: false,
            data: b"hello".to_vec(),
        }));
        assert!(tcb.ooo.is_empty());
        assert_eq!(tcb.rcv_nxt, 1011);

        let mut out = [0u8; 10];
        let n = tcb.recv(&mut out);
        assert_eq!(&out[..n], b"helloworld");
    }
}
