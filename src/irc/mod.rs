//! IRC dispatch core: one worker thread per accepted connection, a
//! line-oriented CRLF framing loop, and a command dispatch table backed
//! by the shared registries in `registry`.

mod client;
mod handlers;
mod registry;
mod reply;

pub use client::{Client, RegistrationState};
pub use registry::Registry;

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct Server {
    pub registry: Arc<Registry>,
    pub servername: String,
    pub operator_password: String,
    pub created: String,
    next_id: AtomicU64,
}

impl Server {
    pub fn new(servername: impl Into<String>, operator_password: impl Into<String>, created: impl Into<String>) -> Arc<Self> {
        Arc::new(Server {
            registry: Arc::new(Registry::new()),
            servername: servername.into(),
            operator_password: operator_password.into(),
            created: created.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Accept connections forever, spawning one worker per client. Never
    /// returns unless the listener itself errors out.
    pub fn run(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, addr) = listener.accept()?;
            let server = self.clone();
            std::thread::spawn(move || worker(server, stream, addr));
        }
    }
}

/// Tokenize one IRC line: whitespace-trimmed, space-separated, with the
/// first token naming the command and a ':'-prefixed final token read as
/// the rest of the line (the only parameter allowed to contain spaces).
fn tokenize(line: &str) -> Option<(String, Vec<String>)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut tokens = line.splitn(2, ' ');
    let command = tokens.next()?.to_uppercase();

    let mut params = Vec::new();
    let mut remainder = tokens.next().unwrap_or("").trim_start();
    while !remainder.is_empty() {
        if let Some(trailing) = remainder.strip_prefix(':') {
            params.push(trailing.to_string());
            break;
        }
        match remainder.split_once(' ') {
            Some((tok, rest)) => {
                params.push(tok.to_string());
                remainder = rest.trim_start();
            }
            None => {
                params.push(remainder.to_string());
                break;
            }
        }
    }

    Some((command, params))
}

fn worker(server: Arc<Server>, stream: TcpStream, addr: std::net::SocketAddr) {
    let id = server.next_id.fetch_add(1, Ordering::Relaxed);
    let writer = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("failed cloning client socket for {addr}: {e}");
            return;
        }
    };
    let client = Arc::new(Client::new(id, addr, writer));
    server.registry.register_client(client.clone());

    let mut reader = stream;
    let mut acc = String::new();
    let mut buf = [0u8; 512];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        acc.push_str(&String::from_utf8_lossy(&buf[..n]));

        while let Some(pos) = acc.find("\r\n") {
            let line = acc[..pos].to_string();
            acc.drain(..pos + 2);
            if let Some((command, params)) = tokenize(&line) {
                handlers::dispatch(&server, &client, &command, &params);
            }
        }
    }

    handlers::handle_disconnect(&server, &client, "Connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_command_and_params() {
        let (cmd, params) = tokenize("JOIN #rust").unwrap();
        assert_eq!(cmd, "JOIN");
        assert_eq!(params, vec!["#rust".to_string()]);
    }

    #[test]
    fn tokenize_trailing_param_keeps_spaces() {
        let (cmd, params) = tokenize("PRIVMSG #rust :hello there friend").unwrap();
        assert_eq!(cmd, "PRIVMSG");
        assert_eq!(params, vec!["#rust".to_string(), "hello there friend".to_string()]);
    }

    #[test]
    fn tokenize_empty_line_is_none() {
        assert!(tokenize("   ").is_none());
    }
}
