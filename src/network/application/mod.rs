//! # Application Layer Protocols
//!
//! Both protocols here are written against the transport traits in
//! [`network`](crate::network) and never allocate:
//!
//! - **[`mqtt`]**: streaming MQTT windows and packet codec
//! - **[`m2x`]**: the M2X request/response client layered on [`mqtt`]

/// M2X device-data client.
///
/// Wraps REST-style M2X calls in MQTT request/response envelopes.
pub mod m2x;

/// Streaming MQTT building blocks.
pub mod mqtt;
