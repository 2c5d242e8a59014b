//! One MQTT session with the M2X broker: connect, authenticate, subscribe.

use super::Error;
use super::client::Options;
use crate::network::Transport;
use crate::network::application::mqtt::codec::{
    self, CONNACK, CONNECT, FixedHeader, SUBACK, SUBSCRIBE,
};
use crate::network::application::mqtt::MqttStream;
use crate::network::error::Error as NetworkError;

/// Clean session, username present.
const CONNECT_FLAGS: u8 = 0x82;
/// Packet identifier used for the single SUBSCRIBE sent per session.
const SUBSCRIBE_PACKET_ID: u16 = 1;
/// SUBACK return code signalling a refused subscription.
const SUBACK_FAILURE: u8 = 0x80;

pub(crate) const TOPIC_PREFIX: &[u8] = b"m2x/";
pub(crate) const REQUEST_SUFFIX: &[u8] = b"/requests";
pub(crate) const RESPONSE_SUFFIX: &[u8] = b"/responses";

/// Where a session is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No live connection.
    Disconnected,
    /// The transport is being opened.
    Connecting,
    /// CONNECT sent, waiting for CONNACK.
    AwaitingConnAck,
    /// SUBSCRIBE sent, waiting for SUBACK.
    AwaitingSubAck,
    /// Handshake complete; requests may be sent.
    Connected,
}

#[cfg(feature = "defmt")]
impl defmt::Format for State {
    fn format(&self, f: defmt::Formatter) {
        match self {
            State::Disconnected => defmt::write!(f, "Disconnected"),
            State::Connecting => defmt::write!(f, "Connecting"),
            State::AwaitingConnAck => defmt::write!(f, "AwaitingConnAck"),
            State::AwaitingSubAck => defmt::write!(f, "AwaitingSubAck"),
            State::Connected => defmt::write!(f, "Connected"),
        }
    }
}

pub(crate) struct Session<'a, T: Transport> {
    stream: MqttStream<T>,
    key: &'a str,
    options: Options<'a>,
    state: State,
}

impl<'a, T: Transport> Session<'a, T> {
    pub(crate) fn new(transport: T, key: &'a str, options: Options<'a>) -> Self {
        let mut stream = MqttStream::new(transport);
        stream.set_idle(options.idle);
        Self {
            stream,
            key,
            options,
            state: State::Disconnected,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    pub(crate) fn key(&self) -> &'a str {
        self.key
    }

    pub(crate) fn options(&self) -> &Options<'a> {
        &self.options
    }

    pub(crate) fn stream(&self) -> &MqttStream<T> {
        &self.stream
    }

    pub(crate) fn stream_mut(&mut self) -> &mut MqttStream<T> {
        &mut self.stream
    }

    pub(crate) fn into_transport(self) -> T {
        self.stream.into_transport()
    }

    /// Open the transport and run the CONNECT/SUBSCRIBE handshake.
    ///
    /// A refused transport connection yields [`Error::NoConnection`] and leaves
    /// nothing to clean up. Any failure after that stops the transport and yields
    /// [`Error::Disconnected`].
    pub(crate) fn connect(&mut self) -> Result<(), Error> {
        if self.is_connected() {
            return Ok(());
        }
        let (host, port) = (self.options.host, self.options.port);
        self.state = State::Connecting;
        if let Err(_e) = self.stream.transport_mut().connect(host, port) {
            error!("cannot connect to M2X MQTT server {}:{}", host, port);
            self.state = State::Disconnected;
            return Err(Error::NoConnection);
        }
        info!("connected to M2X MQTT server {}:{}", host, port);
        self.stream.reset();

        match self.handshake() {
            Ok(()) => {
                self.state = State::Connected;
                Ok(())
            }
            Err(e) => {
                warn!("handshake failed in state {}: {}", self.state, e);
                self.close();
                Err(Error::Disconnected)
            }
        }
    }

    /// Stop the transport and forget the session.
    pub(crate) fn close(&mut self) {
        if self.state != State::Disconnected {
            info!("closing M2X MQTT connection");
        }
        self.stream.transport_mut().stop();
        self.stream.reset();
        self.state = State::Disconnected;
    }

    fn handshake(&mut self) -> Result<(), NetworkError> {
        self.send_connect()?;
        self.state = State::AwaitingConnAck;
        let header = self.await_packet(CONNACK)?;
        self.read_connack(header)?;

        self.send_subscribe()?;
        self.state = State::AwaitingSubAck;
        let header = self.await_packet(SUBACK)?;
        self.read_suback(header)
    }

    fn send_connect(&mut self) -> Result<(), NetworkError> {
        let protocol = self.options.protocol;
        let name = protocol.name();
        // name, level, flags, keep-alive
        let variable_header = codec::string_encoded_length(name.len()) + 1 + 1 + 2;
        let remaining = variable_header + codec::string_encoded_length(self.key.len());

        let stream = &mut self.stream;
        stream.encode_fixed_header(codec::pack_type(CONNECT, 0), remaining)?;
        stream.encode_string(name)?;
        stream.encode_u8(protocol.level())?;
        stream.encode_u8(CONNECT_FLAGS)?;
        stream.encode_u16(self.options.keep_alive_seconds)?;
        stream.encode_string(self.key.as_bytes())?;
        stream.finish_packet()
    }

    fn send_subscribe(&mut self) -> Result<(), NetworkError> {
        let topic_len = TOPIC_PREFIX.len() + self.key.len() + RESPONSE_SUFFIX.len();
        let topic_len = u16::try_from(topic_len).map_err(|_| NetworkError::PacketTooLarge)?;
        // packet id, topic length, topic, requested QoS
        let remaining = 2 + codec::string_encoded_length(topic_len as usize) + 1;

        let stream = &mut self.stream;
        stream.encode_fixed_header(codec::pack_type(SUBSCRIBE, 0x02), remaining)?;
        stream.encode_u16(SUBSCRIBE_PACKET_ID)?;
        stream.encode_u16(topic_len)?;
        stream.encode_buffer(TOPIC_PREFIX)?;
        stream.encode_buffer(self.key.as_bytes())?;
        stream.encode_buffer(RESPONSE_SUFFIX)?;
        stream.encode_u8(0)?;
        stream.finish_packet()
    }

    /// Skip whole packets until one of `packet_type` arrives.
    fn await_packet(&mut self, packet_type: u8) -> Result<FixedHeader, NetworkError> {
        loop {
            let header = self.stream.decode_fixed_header()?;
            if header.packet_type() == packet_type {
                return Ok(header);
            }
            debug!(
                "skipping packet type {} while waiting for {}",
                header.packet_type(),
                packet_type
            );
            self.stream.skip(header.remaining_length)?;
        }
    }

    fn read_connack(&mut self, header: FixedHeader) -> Result<(), NetworkError> {
        if header.remaining_length < 2 {
            return Err(NetworkError::MalformedPacket);
        }
        let _ack_flags = self.stream.decode_u8()?;
        let return_code = self.stream.decode_u8()?;
        self.stream.skip(header.remaining_length - 2)?;
        if return_code != 0 {
            warn!("CONNACK return code is not accepted: {}", return_code);
            return Err(NetworkError::ConnectionRefused);
        }
        Ok(())
    }

    fn read_suback(&mut self, header: FixedHeader) -> Result<(), NetworkError> {
        if header.remaining_length < 3 {
            return Err(NetworkError::MalformedPacket);
        }
        let _packet_id = self.stream.decode_u16()?;
        let mut refused = false;
        for _ in 0..header.remaining_length - 2 {
            if self.stream.decode_u8()? == SUBACK_FAILURE {
                refused = true;
            }
        }
        if refused {
            warn!("subscription to the response topic was refused");
            return Err(NetworkError::ConnectionRefused);
        }
        Ok(())
    }
}
