//! MQTT 3.1/3.1.1 primitive encoding and decoding over an [`MqttStream`].
//!
//! Only the pieces needed by a streaming client are provided: the fixed header
//! with its variable-length remaining length, single bytes, big-endian `u16`
//! values, length-prefixed strings and raw buffers. Everything is written through
//! the outbound window and read through the inbound window, so no packet is ever
//! held in memory as a whole.

use super::stream::MqttStream;
use crate::network::Transport;
use crate::network::error::Error;

// MQTT Control Packet types, as stored in the upper nibble of the first header byte
/// MQTT CONNECT packet type.
pub const CONNECT: u8 = 1;
/// MQTT CONNACK packet type.
pub const CONNACK: u8 = 2;
/// MQTT PUBLISH packet type.
pub const PUBLISH: u8 = 3;
/// MQTT PUBACK packet type.
pub const PUBACK: u8 = 4;
/// MQTT SUBSCRIBE packet type.
pub const SUBSCRIBE: u8 = 8;
/// MQTT SUBACK packet type.
pub const SUBACK: u8 = 9;

/// Largest value the four-byte remaining length encoding can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Build the first header byte from a packet type and its flag nibble.
pub const fn pack_type(packet_type: u8, flags: u8) -> u8 {
    (packet_type << 4) | (flags & 0x0F)
}

/// Bytes taken by a length-prefixed string of `len` bytes.
pub const fn string_encoded_length(len: usize) -> usize {
    2 + len
}

/// A decoded MQTT fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    /// The raw first byte: packet type in the upper nibble, flags in the lower.
    pub flags: u8,
    /// Number of bytes that follow the fixed header.
    pub remaining_length: usize,
}

impl FixedHeader {
    /// The control packet type.
    pub fn packet_type(&self) -> u8 {
        self.flags >> 4
    }

    /// QoS level of a PUBLISH packet. Meaningless for other packet types.
    pub fn qos(&self) -> u8 {
        (self.flags >> 1) & 0x03
    }
}

impl<T: Transport> MqttStream<T> {
    /// Encode a fixed header: the type/flags byte followed by the remaining length.
    pub fn encode_fixed_header(&mut self, flags: u8, remaining_length: usize) -> Result<(), Error> {
        if remaining_length > MAX_REMAINING_LENGTH {
            return Err(Error::PacketTooLarge);
        }
        let mut header = [0u8; 5];
        header[0] = flags;
        let mut len = remaining_length;
        let mut used = 1;
        loop {
            let mut byte = (len % 128) as u8;
            len /= 128;
            if len > 0 {
                byte |= 0x80;
            }
            header[used] = byte;
            used += 1;
            if len == 0 {
                break;
            }
        }
        self.stage(&header[..used])
    }

    /// Encode a single byte.
    pub fn encode_u8(&mut self, value: u8) -> Result<(), Error> {
        self.stage(&[value])
    }

    /// Encode a big-endian `u16`.
    pub fn encode_u16(&mut self, value: u16) -> Result<(), Error> {
        self.stage(&value.to_be_bytes())
    }

    /// Encode a length-prefixed string.
    pub fn encode_string(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let len = u16::try_from(bytes.len()).map_err(|_| Error::PacketTooLarge)?;
        self.encode_u16(len)?;
        self.stage(bytes)
    }

    /// Encode raw bytes with no length prefix.
    pub fn encode_buffer(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.stage(bytes)
    }

    /// Finish the packet being encoded: drain the window and flush the transport.
    pub fn finish_packet(&mut self) -> Result<(), Error> {
        self.flush()
    }

    /// Decode a fixed header, waiting for as many bytes as it needs.
    pub fn decode_fixed_header(&mut self) -> Result<FixedHeader, Error> {
        let flags = self.decode_u8()?;
        let mut remaining_length = 0usize;
        let mut multiplier = 1usize;
        for _ in 0..4 {
            let byte = self.decode_u8()?;
            remaining_length += (byte & 0x7F) as usize * multiplier;
            if byte & 0x80 == 0 {
                return Ok(FixedHeader {
                    flags,
                    remaining_length,
                });
            }
            multiplier *= 128;
        }
        Err(Error::MalformedPacket)
    }

    /// Decode a single byte.
    pub fn decode_u8(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.fetch(&mut byte)?;
        Ok(byte[0])
    }

    /// Decode a big-endian `u16`.
    pub fn decode_u16(&mut self) -> Result<u16, Error> {
        let mut bytes = [0u8; 2];
        self.fetch(&mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Decode exactly `out.len()` raw bytes.
    pub fn decode_buffer(&mut self, out: &mut [u8]) -> Result<(), Error> {
        self.fetch(out)
    }

    /// Skip a length-prefixed string, returning how many bytes it occupied.
    pub fn skip_string(&mut self) -> Result<usize, Error> {
        let len = self.decode_u16()? as usize;
        self.discard(len)?;
        Ok(string_encoded_length(len))
    }

    /// Skip `len` raw bytes, typically the rest of a packet nobody cares about.
    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.discard(len)
    }
}
