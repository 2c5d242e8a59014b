//! Streaming windows and the pull/push adapters that move them over a transport.
//!
//! The codec never builds a whole packet in memory. Outbound bytes are staged in a
//! small [`Window`] and drained to the transport by [`MqttStream::pull`]; inbound
//! bytes are fetched into another window by [`MqttStream::push`] only as far as the
//! decoder asks for them.
//!
//! ```text
//!   encode_*  ──▶ outbound Window ──pull()──▶ Transport::write
//!   decode_*  ◀── inbound Window  ◀──push()── Transport::read / available
//! ```

use crate::network::Transport;
use crate::network::error::Error;

/// Capacity of each streaming window in bytes.
pub const WINDOW_SIZE: usize = 64;

/// A bounded region of bytes in flight between the codec and the transport.
///
/// Bytes are appended at the tail and consumed from the head. The window never
/// reports more than `tail - head` pending bytes and never moves the head past
/// bytes that were actually handed over.
#[derive(Debug)]
pub struct Window<const N: usize> {
    buf: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> Window<N> {
    /// Create an empty window.
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            tail: 0,
        }
    }

    /// Bytes staged but not yet consumed.
    pub fn pending(&self) -> &[u8] {
        &self.buf[self.head..self.tail]
    }

    /// Number of pending bytes.
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    /// Whether no bytes are pending.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Room left for new bytes.
    pub fn capacity(&self) -> usize {
        N - self.len()
    }

    /// Append as many bytes from `bytes` as fit, returning the count taken.
    pub fn fill(&mut self, bytes: &[u8]) -> usize {
        self.compact();
        let n = bytes.len().min(N - self.tail);
        self.buf[self.tail..self.tail + n].copy_from_slice(&bytes[..n]);
        self.tail += n;
        n
    }

    /// Free space at the tail, for a transport to read into.
    ///
    /// Follow with [`commit`](Self::commit) to make the bytes pending.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        self.compact();
        &mut self.buf[self.tail..]
    }

    /// Mark `n` bytes written through [`spare_mut`](Self::spare_mut) as pending.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(n <= N - self.tail, "committed past window end");
        self.tail = (self.tail + n).min(N);
    }

    /// Consume up to `n` pending bytes, returning how many were consumed.
    pub fn advance(&mut self, n: usize) -> usize {
        let n = n.min(self.len());
        self.head += n;
        n
    }

    /// Move pending bytes into `out`, returning the count copied.
    pub fn take(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len());
        out[..n].copy_from_slice(&self.buf[self.head..self.head + n]);
        self.advance(n);
        if self.is_empty() {
            self.release();
        }
        n
    }

    /// Drop all pending bytes and rewind to the start of the buffer.
    pub fn release(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    fn compact(&mut self) {
        if self.head == 0 {
            return;
        }
        self.buf.copy_within(self.head..self.tail, 0);
        self.tail -= self.head;
        self.head = 0;
    }
}

impl<const N: usize> Default for Window<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// An MQTT byte stream over a caller-supplied transport.
///
/// Owns the transport together with one outbound and one inbound [`Window`].
/// The packet codec (see [`codec`](super::codec)) is implemented on top of this
/// type; higher layers never talk to the transport directly.
#[derive(Debug)]
pub struct MqttStream<T: Transport> {
    transport: T,
    outbound: Window<WINDOW_SIZE>,
    inbound: Window<WINDOW_SIZE>,
    idle: Option<fn()>,
}

impl<T: Transport> MqttStream<T> {
    /// Wrap a transport. The transport does not need to be connected yet.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            outbound: Window::new(),
            inbound: Window::new(),
            idle: None,
        }
    }

    /// Install a hook that runs whenever a poll of the transport makes no progress.
    pub fn set_idle(&mut self, idle: Option<fn()>) {
        self.idle = idle;
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Discard whatever is staged in both windows.
    ///
    /// Called whenever the physical connection is replaced so stale bytes from
    /// the previous session never leak into the next one.
    pub fn reset(&mut self) {
        self.outbound.release();
        self.inbound.release();
    }

    /// Bytes staged for sending that the transport has not accepted yet.
    pub fn outbound_pending(&self) -> usize {
        self.outbound.len()
    }

    /// Bytes already received and buffered but not yet decoded.
    pub fn inbound_pending(&self) -> usize {
        self.inbound.len()
    }

    /// Puller: hand the pending outbound bytes to the transport in one write.
    ///
    /// A failed write stops the transport and yields
    /// [`Error::BrokenConnection`]. Calling this with nothing pending is a no-op,
    /// and calling it repeatedly while bytes remain only ever sends each byte once.
    pub fn pull(&mut self) -> Result<(), Error> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        let written = match self.transport.write(self.outbound.pending()) {
            Ok(n) => n,
            Err(_e) => {
                warn!("transport write failed, stopping");
                self.transport.stop();
                return Err(Error::BrokenConnection);
            }
        };
        if written == 0 && !self.transport.connected() {
            return Err(Error::BrokenConnection);
        }
        self.outbound.advance(written);
        if self.outbound.is_empty() {
            self.outbound.release();
        }
        Ok(())
    }

    /// Pusher: move at most `max` bytes the transport already has into the
    /// inbound window.
    ///
    /// Returns the number of bytes moved. Zero means "nothing yet" and is not an
    /// error; the caller polls again. Only a transport that has gone away while
    /// nothing is buffered is reported as [`Error::BrokenConnection`].
    pub fn push(&mut self, max: usize) -> Result<usize, Error> {
        let available = self.transport.available();
        let spare = self.inbound.spare_mut();
        let wanted = spare.len().min(max).min(available);
        if wanted == 0 {
            if available == 0 && !self.transport.connected() {
                return Err(Error::BrokenConnection);
            }
            return Ok(0);
        }
        let read = match self.transport.read(&mut spare[..wanted]) {
            Ok(n) => n.min(wanted),
            Err(_e) => {
                warn!("transport read failed, stopping");
                self.transport.stop();
                return Err(Error::ReadError);
            }
        };
        self.inbound.commit(read);
        Ok(read)
    }

    /// Stage outbound bytes, pulling whenever the window fills up.
    pub(crate) fn stage(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            let taken = self.outbound.fill(bytes);
            bytes = &bytes[taken..];
            if taken == 0 {
                self.pull_once()?;
            }
        }
        Ok(())
    }

    /// Pull until every staged byte has been accepted by the transport.
    pub(crate) fn drain(&mut self) -> Result<(), Error> {
        while !self.outbound.is_empty() {
            self.pull_once()?;
        }
        Ok(())
    }

    /// Drain staged bytes and flush the transport.
    pub(crate) fn flush(&mut self) -> Result<(), Error> {
        self.drain()?;
        if self.transport.flush().is_err() {
            warn!("transport flush failed, stopping");
            self.transport.stop();
            return Err(Error::BrokenConnection);
        }
        Ok(())
    }

    /// Copy exactly `out.len()` inbound bytes, polling the transport as needed.
    pub(crate) fn fetch(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let mut filled = 0;
        while filled < out.len() {
            if self.inbound.is_empty() {
                self.wait(out.len() - filled)?;
            }
            filled += self.inbound.take(&mut out[filled..]);
        }
        Ok(())
    }

    /// Consume and drop exactly `n` inbound bytes.
    pub(crate) fn discard(&mut self, mut n: usize) -> Result<(), Error> {
        while n > 0 {
            if self.inbound.is_empty() {
                self.wait(n.min(WINDOW_SIZE))?;
            }
            n -= self.inbound.advance(n);
            if self.inbound.is_empty() {
                self.inbound.release();
            }
        }
        Ok(())
    }

    fn pull_once(&mut self) -> Result<(), Error> {
        let before = self.outbound.len();
        self.pull()?;
        if self.outbound.len() == before {
            self.idle();
        }
        Ok(())
    }

    fn wait(&mut self, max: usize) -> Result<(), Error> {
        while self.push(max)? == 0 {
            self.idle();
        }
        Ok(())
    }

    fn idle(&self) {
        if let Some(idle) = self.idle {
            idle();
        }
    }
}
