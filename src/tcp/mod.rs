//! TCP endpoint stack: a tun-backed driver thread turns inbound IP packets
//! into `Event`s fed to each connection's `Tcb`, and interprets the
//! resulting `Action`s (segment writes, timer arm/cancel, condvar
//! wake-ups) — see `tcb` for the pure state machine this drives.

mod buffer;
mod conn;
mod ioutil;
mod listen;
mod reassembly;
mod rto;
mod seqnum;
mod stream;
mod tcb;
mod types;

pub use listen::TcpListener;
pub use stream::TcpStream;
pub use types::{Dual, Quad};

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tidy_tuntap::Tun;

use crate::err::Error;
use crate::timer::MultiTimer;
use conn::Conn;
use ioutil::{parse_segment, write_segment, write_stateless_reset};
use tcb::Tcb;
use types::{Action, Event, State};

pub(crate) struct ListenerState {
    queue: Mutex<VecDeque<Quad>>,
    cvar: Condvar,
}

pub(crate) struct Manager {
    tun: Mutex<Tun>,
    timers: Arc<MultiTimer>,
    conns: Mutex<HashMap<Quad, Arc<Conn>>>,
    listeners: Mutex<HashMap<u16, Arc<ListenerState>>>,
    next_conn_id: AtomicU64,
    local_addr: Ipv4Addr,
}

/// A handle to the running TCP endpoint: a tun device plus the state
/// shared between the driver thread and application-facing sockets.
pub struct NetStack {
    manager: Arc<Manager>,
    reader: Option<JoinHandle<()>>,
}

impl NetStack {
    pub fn new(name: &str, addr: Ipv4Addr, mask: Ipv4Addr) -> Result<Self, Error> {
        let tun = Tun::new(name, false)?;
        tun.set_addr(addr)?;
        tun.set_netmask(mask)?;
        tun.bring_up()?;

        let manager = Arc::new(Manager {
            tun: Mutex::new(tun),
            timers: Arc::new(MultiTimer::new()),
            conns: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
            local_addr: addr,
        });

        let reader = {
            let manager = manager.clone();
            thread::spawn(move || run_reader(manager))
        };

        Ok(NetStack { manager, reader: Some(reader) })
    }

    pub fn bind(&self, port: u16) -> Result<TcpListener, Error> {
        let mut listeners = self.manager.listeners.lock().unwrap();
        if listeners.contains_key(&port) {
            return Err(Error::PortInUse(port));
        }
        let state = Arc::new(ListenerState { queue: Mutex::new(VecDeque::new()), cvar: Condvar::new() });
        listeners.insert(port, state.clone());
        drop(listeners);

        Ok(TcpListener::new(self.manager.clone(), port, state))
    }

    /// Active OPEN: send a SYN to `remote` from `port` on this stack's
    /// address and block until the handshake completes or is refused.
    pub fn connect(&self, port: u16, remote: Dual) -> Result<TcpStream, Error> {
        let quad = Quad { src: Dual { ipv4: self.manager.local_addr, port }, dst: remote };

        let id = self.manager.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let conn = Arc::new(Conn::new(id, Tcb::active_open(quad)));
        self.manager.conns.lock().unwrap().insert(quad, conn.clone());

        dispatch(&self.manager, &conn, Event::ApplicationConnect);

        let guard = conn.tcb.lock().unwrap();
        let _guard = conn
            .rvar
            .wait_while(guard, |tcb| {
                matches!(tcb.state, State::SynSent | State::SynRcvd) && !conn.is_reset()
            })
            .unwrap();

        if conn.is_reset() {
            return Err(Error::StreamClosed(quad.src));
        }

        Ok(TcpStream::new(self.manager.clone(), conn))
    }

    pub fn join(mut self) {
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

fn run_reader(manager: Arc<Manager>) {
    let mut buf = [0u8; 1500];
    loop {
        let n = {
            let mut tun = manager.tun.lock().unwrap();
            match tun.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => continue,
            }
        };

        let Some((quad, seg)) = parse_segment(&buf[..n]) else { continue };

        let existing = manager.conns.lock().unwrap().get(&quad).cloned();
        if let Some(conn) = existing {
            dispatch(&manager, &conn, Event::PacketArrival(seg));
            continue;
        }

        let listening = manager.listeners.lock().unwrap().contains_key(&quad.dst.port);
        if listening && seg.syn && !seg.ack_flag && !seg.rst {
            let id = manager.next_conn_id.fetch_add(1, Ordering::Relaxed);
            let conn = Arc::new(Conn::new(id, Tcb::listen(quad)));
            manager.conns.lock().unwrap().insert(quad, conn.clone());
            dispatch(&manager, &conn, Event::PacketArrival(seg));
            continue;
        }

        let mut tun = manager.tun.lock().unwrap();
        let _ = write_stateless_reset(&mut tun, &quad, &seg);
    }
}

pub(crate) fn dispatch(manager: &Arc<Manager>, conn: &Arc<Conn>, event: Event) {
    let actions = conn.tcb.lock().unwrap().on_event(event);
    apply_actions(manager, conn, actions);
}

fn timer_id_rtx(conn_id: u64) -> usize {
    (conn_id * 2) as usize
}

fn timer_id_persist(conn_id: u64) -> usize {
    (conn_id * 2 + 1) as usize
}

fn arm_rtx(manager: &Arc<Manager>, conn: &Arc<Conn>, timeout: Duration) {
    let m = manager.clone();
    let c = conn.clone();
    manager.timers.rearm(timer_id_rtx(conn.id), format!("rtx[{}]", conn.id), timeout, move || {
        dispatch(&m, &c, Event::TimeoutRtx)
    });
}

fn arm_persist(manager: &Arc<Manager>, conn: &Arc<Conn>, timeout: Duration) {
    let m = manager.clone();
    let c = conn.clone();
    manager.timers.rearm(timer_id_persist(conn.id), format!("persist[{}]", conn.id), timeout, move || {
        dispatch(&m, &c, Event::TimeoutPersist)
    });
}

fn remove_conn(manager: &Arc<Manager>, conn: &Arc<Conn>) {
    manager.conns.lock().unwrap().remove(&conn.quad);
    let _ = manager.timers.cancel(timer_id_rtx(conn.id));
    let _ = manager.timers.cancel(timer_id_persist(conn.id));
}

fn apply_actions(manager: &Arc<Manager>, conn: &Arc<Conn>, actions: Vec<Action>) {
    for action in actions {
        match action {
            Action::Send(seg) => {
                let mut tun = manager.tun.lock().unwrap();
                if let Err(e) = write_segment(&mut tun, &conn.quad, &seg) {
                    log::warn!("failed writing segment for {:?}: {e}", conn.quad);
                }
            }
            Action::ArmRtx(timeout) => arm_rtx(manager, conn, timeout),
            Action::CancelRtx => {
                let _ = manager.timers.cancel(timer_id_rtx(conn.id));
            }
            Action::ArmPersist(timeout) => arm_persist(manager, conn, timeout),
            Action::CancelPersist => {
                let _ = manager.timers.cancel(timer_id_persist(conn.id));
            }
            Action::NotifyReader => conn.rvar.notify_all(),
            Action::NotifyWriter => conn.wvar.notify_all(),
            Action::NotifyCloser => conn.svar.notify_all(),
            Action::BecameEstablished => {
                conn.rvar.notify_all();
                let listeners = manager.listeners.lock().unwrap();
                if let Some(listener) = listeners.get(&conn.quad.dst.port) {
                    listener.queue.lock().unwrap().push_back(conn.quad);
                    listener.cvar.notify_one();
                }
            }
            Action::DeleteTcb => {
                remove_conn(manager, conn);
                conn.svar.notify_all();
            }
            Action::ConnectionRefused | Action::Reset => {
                conn.mark_reset();
                remove_conn(manager, conn);
            }
        }
    }
}

pub(crate) fn lookup_conn(manager: &Arc<Manager>, quad: &Quad) -> Option<Arc<Conn>> {
    manager.conns.lock().unwrap().get(quad).cloned()
}
