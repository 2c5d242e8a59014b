//! A network abstraction layer for embedded systems
//!
//! The protocol code in this crate never touches a socket directly. Instead it is
//! written against a small set of traits that any byte-stream transport can
//! implement: a TCP socket on a desktop, a `smoltcp` socket on a microcontroller,
//! or a scripted mock in a test.
//!
//! Reads are modelled on embedded socket APIs: [`Read::available`] reports how many
//! bytes can be taken *right now*, which lets a non-blocking transport return zero
//! and be polled again later.

#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Application-layer protocols built on the transport traits
pub mod application;

/// Blocking TCP transport backed by the standard library
#[cfg(feature = "std")]
pub mod tcp;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Connect, Read, Stop, Transport, Write};
}

/// Inbound half of a transport.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Read data from the connection.
    ///
    /// Returns the number of bytes copied into `buf`, which may be zero.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Number of bytes that can be read without blocking.
    ///
    /// A non-blocking transport returns `0` when nothing has arrived yet; callers
    /// are expected to poll again.
    fn available(&mut self) -> usize;
}

/// Outbound half of a transport.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Write data to the connection, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Opening a transport to a remote endpoint.
pub trait Connect {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Open a connection to `host:port`.
    ///
    /// Reconnecting a stopped transport must be supported; the client calls this
    /// again after every disconnection.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;
}

/// Tearing a transport down without consuming it.
pub trait Stop {
    /// Close the underlying socket. Must be safe to call repeatedly.
    fn stop(&mut self);

    /// Whether the underlying socket is still open.
    fn connected(&self) -> bool;
}

/// A reusable, reconnectable byte-stream transport.
pub trait Transport: Connect + Read + Write + Stop {}
