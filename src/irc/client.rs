//! Per-connection client state: identity, registration progress, channel
//! membership, and the write half of its socket behind its own lock so a
//! multi-line reply is never interleaved with another worker's write.

use std::collections::HashSet;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    NotRegistered,
    UserMissing,
    NickMissing,
    Registered,
}

pub struct Client {
    pub id: u64,
    pub addr: SocketAddr,
    pub nick: Mutex<Option<String>>,
    pub username: Mutex<Option<String>>,
    pub realname: Mutex<Option<String>>,
    pub state: Mutex<RegistrationState>,
    pub channels: Mutex<HashSet<String>>,
    pub is_operator: Mutex<bool>,
    socket_lock: Mutex<TcpStream>,
}

impl Client {
    pub fn new(id: u64, addr: SocketAddr, stream: TcpStream) -> Self {
        Client {
            id,
            addr,
            nick: Mutex::new(None),
            username: Mutex::new(None),
            realname: Mutex::new(None),
            state: Mutex::new(RegistrationState::NotRegistered),
            channels: Mutex::new(HashSet::new()),
            is_operator: Mutex::new(false),
            socket_lock: Mutex::new(stream),
        }
    }

    pub fn nick_or_star(&self) -> String {
        self.nick.lock().unwrap().clone().unwrap_or_else(|| "*".to_string())
    }

    /// Send one or more already-CRLF-terminated reply lines. Holding
    /// `socket_lock` for the whole batch keeps a multi-line reply
    /// contiguous against other workers writing to the same socket.
    pub fn send(&self, lines: &[String]) {
        let mut sock = self.socket_lock.lock().unwrap();
        for line in lines {
            if let Err(e) = sock.write_all(line.as_bytes()) {
                log::warn!("write to client {} ({}) failed: {e}", self.id, self.addr);
                return;
            }
        }
    }

    pub fn send_one(&self, line: String) {
        self.send(std::slice::from_ref(&line));
    }

    pub fn shutdown(&self) {
        let sock = self.socket_lock.lock().unwrap();
        let _ = sock.shutdown(std::net::Shutdown::Both);
    }
}
