//! A single TCP connection: the `Tcb` behind a mutex, plus the condvars a
//! blocked reader/writer/closer waits on and the flag a RST sets to wake
//! them all with an error instead of data.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use super::tcb::Tcb;
use super::types::Quad;

#[derive(Debug)]
pub struct Conn {
    pub id: u64,
    pub quad: Quad,
    pub tcb: Mutex<Tcb>,
    pub rvar: Condvar,
    pub wvar: Condvar,
    pub svar: Condvar,
    pub reset: AtomicBool,
}

impl Conn {
    pub fn new(id: u64, tcb: Tcb) -> Self {
        Conn {
            id,
            quad: tcb.quad,
            tcb: Mutex::new(tcb),
            rvar: Condvar::new(),
            wvar: Condvar::new(),
            svar: Condvar::new(),
            reset: AtomicBool::new(false),
        }
    }

    pub fn is_reset(&self) -> bool {
        self.reset.load(Ordering::Acquire)
    }

    pub fn mark_reset(&self) {
        self.reset.store(true, Ordering::Release);
        self.rvar.notify_all();
        self.wvar.notify_all();
        self.svar.notify_all();
    }
}
