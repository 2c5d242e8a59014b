//! M2X device-data client over a streaming MQTT connection.
//!
//! M2X exposes its REST API over MQTT: a request is a JSON envelope published on
//! `m2x/<key>/requests`, and the service answers with an envelope on
//! `m2x/<key>/responses` carrying the same correlation id and an HTTP-style status.
//! This module turns that exchange into blocking calls:
//!
//! 1. connect and run the CONNECT/SUBSCRIBE handshake if needed
//! 2. bump the correlation id
//! 3. format the envelope once into a byte counter to learn its length
//! 4. send the PUBLISH header, then format the envelope again straight onto the wire
//! 5. read PUBLISH packets until the envelope with the same id arrives
//!
//! Only one request is ever in flight, so any envelope with another id is stale
//! and silently dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use m2x_mqtt::network::application::m2x::{Client, Options, Location};
//! # use m2x_mqtt::network::{Connect, Read, Stop, Transport, Write};
//! # struct Socket;
//! # impl Connect for Socket {
//! #     type Error = ();
//! #     fn connect(&mut self, _host: &str, _port: u16) -> Result<(), ()> { Ok(()) }
//! # }
//! # impl Read for Socket {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ()> { Ok(0) }
//! #     fn available(&mut self) -> usize { 0 }
//! # }
//! # impl Write for Socket {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, ()> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), ()> { Ok(()) }
//! # }
//! # impl Stop for Socket {
//! #     fn stop(&mut self) {}
//! #     fn connected(&self) -> bool { true }
//! # }
//! # impl Transport for Socket {}
//!
//! let mut client = Client::new(Socket, "<m2x api key>", Options::default());
//!
//! let status = client.update_stream_value("<device id>", "temperature", 21.5)?;
//! if status.is_success() {
//!     // accepted by the service
//! }
//!
//! let location = Location {
//!     name: Some("Storage room"),
//!     latitude: -37.97884,
//!     longitude: -57.54787,
//!     elevation: Some(15.0),
//! };
//! client.update_location("<device id>", &location)?;
//! # Ok::<(), m2x_mqtt::network::application::m2x::Error>(())
//! ```

/// The request/response call engine and its configuration.
pub mod client;

/// Payload sinks and request bodies.
pub mod payload;

/// Status codes and predicates.
pub mod status;

mod scanner;
mod session;

pub use client::{Client, DEFAULT_HOST, DEFAULT_PORT, Options, Protocol, USER_AGENT};
pub use payload::{Location, NullCounter, Sink, StreamValues, TimedValue};
pub use session::State;
pub use status::Status;

use crate::network::error::Error as NetworkError;

/// Errors reported by M2X operations.
///
/// Each variant has a stable negative [`code`](Error::code), matching the
/// corresponding [`Status`] constant.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The transport could not connect to the broker.
    NoConnection,
    /// The handshake failed or the connection broke mid-request.
    ///
    /// The transport has been stopped; the next call reconnects from scratch.
    Disconnected,
    /// No matching response can be produced.
    NotReachable,
    /// An argument contains characters that cannot be sent unescaped, or a
    /// required collection is empty.
    Invalid,
    /// The matching response envelope carried no usable `status`.
    JsonInvalid,
    /// A single value is too large for the serialization scratch buffer.
    BufferTooSmall,
}

impl Error {
    /// The numeric status code for this error.
    pub const fn code(self) -> i16 {
        match self {
            Error::NoConnection => Status::NO_CONNECTION.0,
            Error::Disconnected => Status::DISCONNECTED.0,
            Error::NotReachable => Status::NOT_REACHABLE.0,
            Error::Invalid => Status::INVALID.0,
            Error::JsonInvalid => Status::JSON_INVALID.0,
            Error::BufferTooSmall => Status::BUFFER_TOO_SMALL.0,
        }
    }
}

impl From<NetworkError> for Error {
    fn from(_: NetworkError) -> Self {
        Error::Disconnected
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NoConnection => defmt::write!(f, "NoConnection"),
            Error::Disconnected => defmt::write!(f, "Disconnected"),
            Error::NotReachable => defmt::write!(f, "NotReachable"),
            Error::Invalid => defmt::write!(f, "Invalid"),
            Error::JsonInvalid => defmt::write!(f, "JsonInvalid"),
            Error::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
        }
    }
}
