//! A generic multi-timer: N independently-addressable timers sharing one
//! background thread. Used by the TCP retransmission/persist timers and by
//! the router's ARP-retry sweep.
//!
//! Armed timers are kept sorted by deadline; the background thread sleeps
//! until the earliest one, fires its callback, and removes it. An id is
//! either armed or idle; cancelling an idle id is an error, and a fired
//! timer is removed before its callback runs so it can safely re-arm
//! itself from inside the callback.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::err::Error;

pub type TimerId = usize;

type Callback = Box<dyn FnMut() + Send>;

struct Entry {
    name: String,
    deadline: Instant,
    callback: Callback,
}

struct State {
    timers: BTreeMap<TimerId, Entry>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    cvar: Condvar,
}

pub struct MultiTimer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl MultiTimer {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                timers: BTreeMap::new(),
                closed: false,
            }),
            cvar: Condvar::new(),
        });

        let worker = {
            let shared = shared.clone();
            thread::spawn(move || Self::run(shared))
        };

        MultiTimer {
            shared,
            worker: Some(worker),
        }
    }

    fn run(shared: Arc<Shared>) {
        let mut guard = shared.state.lock().unwrap();
        loop {
            if guard.closed {
                return;
            }

            let earliest = guard.timers.iter().min_by_key(|(_, e)| e.deadline);

            let Some((&id, entry)) = earliest else {
                guard = shared.cvar.wait(guard).unwrap();
                continue;
            };

            let now = Instant::now();
            if entry.deadline > now {
                let (g, _timeout) = shared
                    .cvar
                    .wait_timeout(guard, entry.deadline - now)
                    .unwrap();
                guard = g;
                continue;
            }

            let mut entry = guard.timers.remove(&id).unwrap();
            log::trace!("timer[{id}] \"{}\" fired", entry.name);

            // Run the callback without holding the lock: it may call back
            // into `arm`/`cancel` to re-arm itself.
            drop(guard);
            (entry.callback)();
            guard = shared.state.lock().unwrap();
        }
    }

    /// Arm timer `id`. Errors if `id` is already armed.
    pub fn arm(
        &self,
        id: TimerId,
        name: impl Into<String>,
        timeout: Duration,
        callback: impl FnMut() + Send + 'static,
    ) -> Result<(), Error> {
        let mut guard = self.shared.state.lock().unwrap();

        if guard.timers.contains_key(&id) {
            return Err(Error::TimerAlreadyArmed(id));
        }

        guard.timers.insert(
            id,
            Entry {
                name: name.into(),
                deadline: Instant::now() + timeout,
                callback: Box::new(callback),
            },
        );
        drop(guard);
        self.shared.cvar.notify_all();

        Ok(())
    }

    /// Cancel timer `id`. Errors if `id` is not currently armed.
    pub fn cancel(&self, id: TimerId) -> Result<(), Error> {
        let mut guard = self.shared.state.lock().unwrap();

        if guard.timers.remove(&id).is_none() {
            return Err(Error::TimerNotArmed(id));
        }
        drop(guard);
        self.shared.cvar.notify_all();

        Ok(())
    }

    /// Cancel `id` if armed, then arm it again with a fresh deadline.
    pub fn rearm(
        &self,
        id: TimerId,
        name: impl Into<String>,
        timeout: Duration,
        callback: impl FnMut() + Send + 'static,
    ) {
        let _ = self.cancel(id);
        self.arm(id, name, timeout, callback)
            .expect("id just cancelled, cannot still be armed");
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.shared.state.lock().unwrap().timers.contains_key(&id)
    }
}

impl Default for MultiTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MultiTimer {
    fn drop(&mut self) {
        {
            let mut guard = self.shared.state.lock().unwrap();
            guard.closed = true;
        }
        self.shared.cvar.notify_all();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_in_deadline_order() {
        let timer = MultiTimer::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (id, millis) in [(0usize, 30u64), (1, 10), (2, 20)] {
            let order = order.clone();
            timer
                .arm(id, format!("t{id}"), Duration::from_millis(millis), move || {
                    order.lock().unwrap().push(id);
                })
                .unwrap();
        }

        thread::sleep(Duration::from_millis(100));
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn cancel_idle_is_error() {
        let timer = MultiTimer::new();
        assert!(timer.cancel(0).is_err());
    }

    #[test]
    fn double_arm_is_error() {
        let timer = MultiTimer::new();
        timer.arm(0, "a", Duration::from_secs(10), || {}).unwrap();
        assert!(timer.arm(0, "b", Duration::from_secs(10), || {}).is_err());
        timer.cancel(0).unwrap();
    }

    #[test]
    fn rearm_from_callback() {
        let timer = Arc::new(MultiTimer::new());
        let fired = Arc::new(AtomicUsize::new(0));

        {
            let timer2 = timer.clone();
            let fired2 = fired.clone();
            timer
                .arm(0, "self-rearm", Duration::from_millis(5), move || {
                    let count = fired2.fetch_add(1, Ordering::SeqCst);
                    if count == 0 {
                        let fired3 = fired2.clone();
                        timer2
                            .arm(0, "self-rearm", Duration::from_millis(5), move || {
                                fired3.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                })
                .unwrap();
        }

        thread::sleep(Duration::from_millis(60));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
