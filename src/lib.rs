//! # m2x-mqtt - streaming M2X client for embedded devices
//!
//! Update AT&T M2X device data (stream values, batch updates, location) over a
//! single MQTT connection without ever holding a whole message in memory. Requests
//! are formatted twice, once to count bytes and once straight onto the wire, and
//! responses are scanned byte by byte for their correlation id and status.
//!
//! ## Layers
//!
//! - [`network`]: the transport traits every platform adapter implements
//! - [`network::application::mqtt`]: streaming windows and the MQTT packet codec
//! - [`network::application::m2x`]: session handshake, request envelopes, response
//!   scanning and the public [`Client`](network::application::m2x::Client)
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! m2x-mqtt = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! # #[cfg(feature = "std")] {
//! use m2x_mqtt::network::application::m2x::{Client, Options};
//! use m2x_mqtt::network::tcp::TcpTransport;
//!
//! let options = Options {
//!     idle: Some(|| std::thread::sleep(std::time::Duration::from_millis(1))),
//!     ..Options::default()
//! };
//! let mut client = Client::new(TcpTransport::new(), "<m2x api key>", options);
//! let status = client.update_stream_value("<device id>", "temperature", 21.5);
//! # }
//! ```
//!
//! ## Platform Support
//!
//! The crate is `no_std` and allocation free unless the `std` feature is enabled.
//! Bring your own socket by implementing [`network::Transport`].
//!
//! ## Optional Features
//!
//! - `std`: standard library support and [`network::tcp::TcpTransport`]
//! - `defmt`: connection lifecycle logging through `defmt`

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Transport traits, errors and the application protocols built on them.
pub mod network;
