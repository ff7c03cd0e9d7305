use std::cmp;
use std::io::{self, Read, Write};
use std::sync::Arc;

use super::conn::Conn;
use super::types::{Event, State};
use super::{dispatch, Manager};

#[derive(Debug)]
pub struct TcpStream {
    manager: Arc<Manager>,
    conn: Arc<Conn>,
    write_closed: bool,
}

fn reset_err() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionReset, "connection has been reset")
}

impl TcpStream {
    pub(crate) fn new(manager: Arc<Manager>, conn: Arc<Conn>) -> Self {
        TcpStream { manager, conn, write_closed: false }
    }

    pub fn peer(&self) -> super::Dual {
        self.conn.quad.dst
    }

    /// Half-close: send a FIN and stop accepting further writes. Blocks
    /// until the peer's ACK of our FIN has been seen (or the connection is
    /// reset), mirroring `TcpStream::close`'s wait on the teacher's `svar`.
    pub fn close(&mut self) {
        if self.write_closed {
            return;
        }
        self.write_closed = true;

        dispatch(&self.manager, &self.conn, Event::ApplicationClose);

        let guard = self.conn.tcb.lock().unwrap();
        let _guard = self
            .conn
            .svar
            .wait_while(guard, |tcb| {
                !matches!(tcb.state, State::Closed | State::TimeWait) && !self.conn.is_reset()
            })
            .unwrap();
    }
}

impl Read for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.conn.is_reset() {
            return Err(reset_err());
        }

        let mut tcb = self.conn.tcb.lock().unwrap();
        loop {
            let n = tcb.recv(buf);
            if n > 0 {
                return Ok(n);
            }
            if self.conn.is_reset() {
                return Err(reset_err());
            }
            if matches!(tcb.state, State::CloseWait | State::Closing | State::LastAck | State::Closed) {
                // peer sent FIN and there's nothing left buffered
                return Ok(0);
            }
            tcb = self.conn.rvar.wait(tcb).unwrap();
        }
    }
}

impl Write for TcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.write_closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "write half is closed"));
        }
        if self.conn.is_reset() {
            return Err(reset_err());
        }

        let mut tcb = self.conn.tcb.lock().unwrap();
        while tcb.is_outgoing_full() && !self.conn.is_reset() {
            tcb = self.conn.wvar.wait(tcb).unwrap();
        }
        if self.conn.is_reset() {
            return Err(reset_err());
        }

        let n = cmp::min(buf.len(), tcb.send_buf.free());
        tcb.send_buf.push_back(&buf[..n]);
        drop(tcb);

        dispatch(&self.manager, &self.conn, Event::ApplicationSend);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let guard = self.conn.tcb.lock().unwrap();
        let _guard = self
            .conn
            .wvar
            .wait_while(guard, |tcb| !tcb.send_buf.is_empty() && !self.conn.is_reset())
            .unwrap();

        if self.conn.is_reset() {
            Err(reset_err())
        } else {
            Ok(())
        }
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        self.close();
    }
}
