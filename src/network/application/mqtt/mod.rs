//! Streaming MQTT 3.1/3.1.1 building blocks for embedded systems.
//!
//! Unlike a buffering client, nothing in this module assembles a full packet in
//! memory. A packet is encoded field by field into a small outbound window that is
//! drained to the transport as it fills, and decoded field by field from an inbound
//! window that is topped up from the transport only as far as the decoder needs.
//! This keeps RAM use constant regardless of payload size, at the cost of having
//! to know a packet's remaining length before its first byte is sent.
//!
//! # Components
//!
//! - [`stream::Window`]: a bounded byte region shared by codec and transport
//! - [`stream::MqttStream`]: owns the transport and both windows, and provides the
//!   pull (outbound) and push (inbound) adapters
//! - [`codec`]: fixed headers and primitive fields on top of [`stream::MqttStream`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use m2x_mqtt::network::application::mqtt::{MqttStream, codec};
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
//! let mut stream = MqttStream::new(Socket);
//! let topic = b"sensors/temperature";
//! let payload = b"23.5";
//! let remaining = codec::string_encoded_length(topic.len()) + payload.len();
//!
//! stream.encode_fixed_header(codec::pack_type(codec::PUBLISH, 0), remaining)?;
//! stream.encode_string(topic)?;
//! stream.encode_buffer(payload)?;
//! stream.finish_packet()?;
//! # Ok::<(), m2x_mqtt::network::error::Error>(())
//! ```

/// Fixed header and primitive field codec.
pub mod codec;

/// Streaming windows and the pull/push transport adapters.
pub mod stream;

pub use codec::FixedHeader;
pub use stream::{MqttStream, Window};
