use super::Error;
use super::payload::{
    Body, Location, Method, NullCounter, PublishSink, Request, Resource, StreamValues, TimedValue,
    UpdateBody, UpdatesBody, ValueBody, ValuesBody,
};
use super::scanner::{PacketReader, Scanner};
use super::session::{REQUEST_SUFFIX, Session, State, TOPIC_PREFIX};
use super::status::Status;
use crate::network::Transport;
use crate::network::application::mqtt::MqttStream;
use crate::network::application::mqtt::codec::{
    self, FixedHeader, MAX_REMAINING_LENGTH, PUBACK, PUBLISH,
};
use serde::Serialize;

/// Public M2X MQTT endpoint.
pub const DEFAULT_HOST: &str = "api-m2x.att.com";

/// Plain MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

/// Value of the `agent` field in every request envelope.
pub const USER_AGENT: &str = concat!("M2X Rust MQTT Client/", env!("CARGO_PKG_VERSION"));

/// MQTT protocol revision announced in CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// MQTT 3.1, protocol name `MQIsdp`, level 3.
    #[default]
    V31,
    /// MQTT 3.1.1, protocol name `MQTT`, level 4.
    V311,
}

impl Protocol {
    /// Protocol name written into the CONNECT variable header.
    pub const fn name(self) -> &'static [u8] {
        match self {
            Protocol::V31 => b"MQIsdp",
            Protocol::V311 => b"MQTT",
        }
    }

    /// Protocol level written into the CONNECT variable header.
    pub const fn level(self) -> u8 {
        match self {
            Protocol::V31 => 3,
            Protocol::V311 => 4,
        }
    }
}

/// Connection options for [`Client`].
#[derive(Debug, Clone, Copy)]
pub struct Options<'a> {
    /// Broker host name.
    pub host: &'a str,
    /// Broker port.
    pub port: u16,
    /// Prepended to every resource path, e.g. `"/m2x"` behind a gateway.
    pub path_prefix: Option<&'a str>,
    /// Keep the connection open between calls. When `false` the connection is
    /// closed after every call and reopened by the next one.
    pub keepalive: bool,
    /// MQTT keep-alive interval announced in CONNECT.
    pub keep_alive_seconds: u16,
    /// Protocol revision announced in CONNECT.
    pub protocol: Protocol,
    /// Called whenever a transport poll makes no progress.
    pub idle: Option<fn()>,
}

impl Default for Options<'_> {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            path_prefix: None,
            keepalive: true,
            keep_alive_seconds: 60,
            protocol: Protocol::V31,
            idle: None,
        }
    }
}

/// A blocking M2X client over one MQTT connection.
///
/// The client owns its transport for its whole life. It connects lazily on the
/// first call, keeps at most one request in flight, and reconnects from scratch
/// after any disconnection.
pub struct Client<'a, T: Transport> {
    session: Session<'a, T>,
    request_id: i16,
}

impl<T: Transport> core::fmt::Debug for Client<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.session.state())
            .field("request_id", &self.request_id)
            .field("options", self.session.options())
            .finish_non_exhaustive()
    }
}

impl<'a, T: Transport> Client<'a, T> {
    /// Create a disconnected client.
    ///
    /// `key` is the M2X API key. It authenticates the MQTT session and names the
    /// request and response topics.
    pub fn new(transport: T, key: &'a str, options: Options<'a>) -> Self {
        Self {
            session: Session::new(transport, key, options),
            request_id: 0,
        }
    }

    /// Connect and subscribe now instead of on the first call.
    ///
    /// Returns [`Error::NoConnection`] if the transport refused to connect and
    /// [`Error::Disconnected`] if the broker rejected the handshake.
    pub fn connect(&mut self) -> Result<(), Error> {
        self.session.connect()
    }

    /// Close the connection. The next call reconnects.
    pub fn close(&mut self) {
        self.session.close();
    }

    /// Whether the handshake has completed on the current connection.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        self.session.state()
    }

    /// Correlation id of the most recent request.
    pub fn request_id(&self) -> i16 {
        self.request_id
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        self.session.stream().transport()
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        self.session.stream_mut().transport_mut()
    }

    /// Consume the client and give the transport back.
    pub fn into_transport(self) -> T {
        self.session.into_transport()
    }

    /// Set the current value of one stream: `PUT /streams/<stream>/value`.
    pub fn update_stream_value<V: Serialize>(
        &mut self,
        device_id: &str,
        stream_name: &str,
        value: V,
    ) -> Result<Status, Error> {
        self.call(Request {
            method: Method::Put,
            device_id,
            resource: Resource::StreamValue(stream_name),
            body: ValueBody(&value),
        })
    }

    /// Append timestamped values to one stream: `POST /streams/<stream>/values`.
    pub fn post_stream_values<V: Serialize>(
        &mut self,
        device_id: &str,
        stream_name: &str,
        values: &[TimedValue<'_, V>],
    ) -> Result<Status, Error> {
        self.call(Request {
            method: Method::Post,
            device_id,
            resource: Resource::StreamValues(stream_name),
            body: ValuesBody(values),
        })
    }

    /// Append values to several streams at once: `POST /updates`.
    pub fn post_device_updates<V: Serialize>(
        &mut self,
        device_id: &str,
        streams: &[StreamValues<'_, V>],
    ) -> Result<Status, Error> {
        self.call(Request {
            method: Method::Post,
            device_id,
            resource: Resource::Updates,
            body: UpdatesBody(streams),
        })
    }

    /// Post one value per stream sharing a single timestamp: `POST /update`.
    ///
    /// Without a timestamp the service stamps the values on arrival.
    pub fn post_device_update<V: Serialize>(
        &mut self,
        device_id: &str,
        values: &[(&str, V)],
        timestamp: Option<&str>,
    ) -> Result<Status, Error> {
        self.call(Request {
            method: Method::Post,
            device_id,
            resource: Resource::Update,
            body: UpdateBody { values, timestamp },
        })
    }

    /// Replace the device location: `PUT /location`.
    pub fn update_location(&mut self, device_id: &str, location: &Location<'_>) -> Result<Status, Error> {
        self.call(Request {
            method: Method::Put,
            device_id,
            resource: Resource::Location,
            body: *location,
        })
    }

    fn call<B: Body>(&mut self, request: Request<'_, B>) -> Result<Status, Error> {
        let options = *self.session.options();
        request.validate(options.path_prefix)?;

        if !self.session.is_connected() {
            self.session.connect().map_err(|_| Error::NoConnection)?;
        }

        self.request_id = self.request_id.wrapping_add(1);
        let id = self.request_id;
        debug!("sending request {}", id);

        let result = self.exchange(&request, id, options.path_prefix);
        if result == Err(Error::Disconnected) || !options.keepalive {
            self.session.close();
        }
        result
    }

    /// Publish one request and wait for the response carrying `id`.
    fn exchange<B: Body>(
        &mut self,
        request: &Request<'_, B>,
        id: i16,
        path_prefix: Option<&str>,
    ) -> Result<Status, Error> {
        let mut counter = NullCounter::new();
        request.write_envelope(&mut counter, id, path_prefix)?;
        let payload_len = counter.count();

        let key = self.session.key();
        let topic_len = TOPIC_PREFIX.len() + key.len() + REQUEST_SUFFIX.len();
        let remaining = codec::string_encoded_length(topic_len) + payload_len;
        let topic_len = u16::try_from(topic_len).map_err(|_| Error::Invalid)?;
        if remaining > MAX_REMAINING_LENGTH {
            return Err(Error::Invalid);
        }

        let stream = self.session.stream_mut();
        stream.encode_fixed_header(codec::pack_type(PUBLISH, 0), remaining)?;
        stream.encode_u16(topic_len)?;
        stream.encode_buffer(TOPIC_PREFIX)?;
        stream.encode_buffer(key.as_bytes())?;
        stream.encode_buffer(REQUEST_SUFFIX)?;

        let mut sink = PublishSink::new(stream);
        request
            .write_envelope(&mut sink, id, path_prefix)
            .map_err(|_| Error::Disconnected)?;
        let written = sink.written();
        debug_assert_eq!(written, payload_len, "formatting passes disagree");
        if written != payload_len {
            error!("payload length changed between passes: {} != {}", written, payload_len);
            return Err(Error::Disconnected);
        }
        stream.finish_packet()?;

        loop {
            let header = stream.decode_fixed_header()?;
            if header.packet_type() != PUBLISH {
                debug!("skipping packet type {} while waiting for a response", header.packet_type());
                stream.skip(header.remaining_length)?;
                continue;
            }
            if let Some(status) = read_response(stream, header, id)? {
                return Ok(status);
            }
        }
    }
}

/// Consume one inbound PUBLISH and return its status if it answers `id`.
fn read_response<T: Transport>(
    stream: &mut MqttStream<T>,
    header: FixedHeader,
    id: i16,
) -> Result<Option<Status>, Error> {
    let mut remaining = header.remaining_length;
    if remaining < 2 {
        return Err(Error::Disconnected);
    }
    let topic = stream.skip_string()?;
    remaining = remaining.checked_sub(topic).ok_or(Error::Disconnected)?;

    let qos = header.qos();
    let mut packet_id = None;
    if qos > 0 {
        if remaining < 2 {
            return Err(Error::Disconnected);
        }
        packet_id = Some(stream.decode_u16()?);
        remaining -= 2;
    }
    if qos > 1 {
        warn!("skipping QoS {} delivery", qos);
        stream.skip(remaining)?;
        return Ok(None);
    }

    let (envelope, leftover) = {
        let mut scanner = Scanner::new(PacketReader::new(stream, remaining));
        let envelope = scanner.scan_envelope().map_err(|_| Error::Disconnected)?;
        (envelope, scanner.into_inner().remaining())
    };
    stream.skip(leftover)?;

    if let Some(packet_id) = packet_id {
        stream.encode_fixed_header(codec::pack_type(PUBACK, 0), 2)?;
        stream.encode_u16(packet_id)?;
        stream.finish_packet()?;
    }

    match envelope.id {
        Some(got) if got == id => match envelope.status {
            Some(status) => Ok(Some(Status(status))),
            None => {
                warn!("response {} carries no status", id);
                Err(Error::JsonInvalid)
            }
        },
        _ => {
            debug!("discarding stale response while waiting for {}", id);
            Ok(None)
        }
    }
}
