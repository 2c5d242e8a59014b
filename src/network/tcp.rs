//! A [`Transport`] over `std::net::TcpStream`.
//!
//! The socket is switched to non-blocking mode after connecting so that
//! [`Read::available`] can report "nothing yet" the way an embedded socket does.
//! Pair it with an idle hook (for example a short sleep) to avoid spinning.

use super::error::Error;
use super::{Connect, Read, Stop, Transport, Write};
use std::io::{ErrorKind, Read as _, Write as _};
use std::net::{Shutdown, TcpStream};

const READ_AHEAD: usize = 128;

/// Non-blocking TCP transport.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    buffer: [u8; READ_AHEAD],
    start: usize,
    end: usize,
}

impl TcpTransport {
    /// A transport that is not connected yet.
    pub fn new() -> Self {
        Self {
            stream: None,
            buffer: [0; READ_AHEAD],
            start: 0,
            end: 0,
        }
    }

    fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Try to refill the read-ahead buffer without blocking.
    fn fill(&mut self) {
        if self.buffered() > 0 {
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        match stream.read(&mut self.buffer) {
            Ok(0) => self.stop(),
            Ok(n) => {
                self.start = 0;
                self.end = n;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {}
            Err(_) => self.stop(),
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Connect for TcpTransport {
    type Error = Error;

    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.stop();
        let stream = TcpStream::connect((host, port)).map_err(|_| Error::ConnectionRefused)?;
        stream.set_nodelay(true).map_err(|_| Error::NotOpen)?;
        stream.set_nonblocking(true).map_err(|_| Error::NotOpen)?;
        self.stream = Some(stream);
        Ok(())
    }
}

impl Read for TcpTransport {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.fill();
        if self.buffered() == 0 && self.stream.is_none() {
            return Err(Error::NotOpen);
        }
        let n = buf.len().min(self.buffered());
        buf[..n].copy_from_slice(&self.buffer[self.start..self.start + n]);
        self.start += n;
        Ok(n)
    }

    fn available(&mut self) -> usize {
        self.fill();
        self.buffered()
    }
}

impl Write for TcpTransport {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        match stream.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(_) => Err(Error::WriteError),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        match stream.flush() {
            Err(e) if e.kind() != ErrorKind::WouldBlock => Err(Error::WriteError),
            _ => Ok(()),
        }
    }
}

impl Stop for TcpTransport {
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.start = 0;
        self.end = 0;
    }

    fn connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Transport for TcpTransport {}
