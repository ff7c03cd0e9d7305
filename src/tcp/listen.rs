use std::sync::Arc;

use crate::err::Error;

use super::{lookup_conn, ListenerState, Manager, TcpStream};

#[derive(Debug)]
pub struct TcpListener {
    manager: Arc<Manager>,
    port: u16,
    state: Arc<ListenerState>,
}

impl TcpListener {
    pub(crate) fn new(manager: Arc<Manager>, port: u16, state: Arc<ListenerState>) -> Self {
        TcpListener { manager, port, state }
    }

    pub fn accept(&self) -> Result<TcpStream, Error> {
        let guard = self.state.queue.lock().unwrap();
        let mut guard = self.state.cvar.wait_while(guard, |q| q.is_empty()).unwrap();
        let quad = guard.pop_front().unwrap();
        drop(guard);

        let conn = lookup_conn(&self.manager, &quad).ok_or(Error::StreamClosed(quad.src))?;
        Ok(TcpStream::new(self.manager.clone(), conn))
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        self.manager.listeners.lock().unwrap().remove(&self.port);
    }
}
