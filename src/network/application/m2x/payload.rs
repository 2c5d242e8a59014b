//! Request envelopes and the sinks they are written into.
//!
//! Every request is formatted twice by the same code: once into a
//! [`NullCounter`] to learn its exact length (MQTT needs the remaining length up
//! front), then into a sink that streams each byte into the PUBLISH packet. The
//! two passes must agree byte for byte, so formatting is deterministic and never
//! depends on the sink.
//!
//! JSON values are serialized with `serde-json-core` into a small stack buffer,
//! one value at a time, which bounds memory use no matter how long a batch is.

use super::Error;
use crate::network::Transport;
use crate::network::application::mqtt::MqttStream;
use heapless::String;
use serde::Serialize;

/// Size of the stack buffer a single JSON value is serialized into.
pub const JSON_SCRATCH_LEN: usize = 256;

/// Destination for formatted request bytes.
pub trait Sink {
    /// Append bytes to the sink.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Append a string verbatim.
    fn write_str(&mut self, s: &str) -> Result<(), Error> {
        self.write_bytes(s.as_bytes())
    }
}

/// A sink that only counts what would have been written.
///
/// # Examples
///
/// ```rust
/// use m2x_mqtt::network::application::m2x::{NullCounter, Sink};
///
/// let mut counter = NullCounter::new();
/// counter.write_str("{\"value\":1}").unwrap();
/// assert_eq!(counter.count(), 11);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCounter {
    count: usize,
}

impl NullCounter {
    /// A counter starting at zero.
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Bytes counted so far.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Sink for NullCounter {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.count += bytes.len();
        Ok(())
    }
}

/// A sink that streams bytes into the PUBLISH packet being encoded.
pub(crate) struct PublishSink<'s, T: Transport> {
    stream: &'s mut MqttStream<T>,
    written: usize,
}

impl<'s, T: Transport> PublishSink<'s, T> {
    pub(crate) fn new(stream: &'s mut MqttStream<T>) -> Self {
        Self { stream, written: 0 }
    }

    pub(crate) fn written(&self) -> usize {
        self.written
    }
}

impl<T: Transport> Sink for PublishSink<'_, T> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.stream.encode_buffer(bytes)?;
        self.written += bytes.len();
        Ok(())
    }
}

/// Serialize one JSON value into the sink.
pub(crate) fn write_json<S: Sink, V: Serialize + ?Sized>(sink: &mut S, value: &V) -> Result<(), Error> {
    let mut scratch = [0u8; JSON_SCRATCH_LEN];
    let len = serde_json_core::to_slice(value, &mut scratch).map_err(|_| Error::BufferTooSmall)?;
    sink.write_bytes(&scratch[..len])
}

/// A value with an optional ISO 8601 timestamp.
///
/// Serializes as `{"timestamp":"...","value":...}`, leaving out `timestamp` when
/// it is `None` so the service stamps the value on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedValue<'a, V> {
    /// When the value was measured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<&'a str>,
    /// The measured value.
    pub value: V,
}

/// All values destined for one stream in a batch update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamValues<'a, V> {
    /// Stream name.
    pub name: &'a str,
    /// Values to append to the stream.
    pub values: &'a [TimedValue<'a, V>],
}

/// A device location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location<'a> {
    /// Human-readable name of the place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Elevation in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

/// Something that can write itself as the `body` of an envelope.
pub(crate) trait Body {
    fn write_body<S: Sink>(&self, sink: &mut S) -> Result<(), Error>;

    /// Reject bodies that cannot be sent, before any byte goes out.
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// `{"value":V}`
pub(crate) struct ValueBody<'v, V>(pub &'v V);

impl<V: Serialize> Body for ValueBody<'_, V> {
    fn write_body<S: Sink>(&self, sink: &mut S) -> Result<(), Error> {
        sink.write_str("{\"value\":")?;
        write_json(sink, self.0)?;
        sink.write_str("}")
    }
}

/// `{"values":[{"timestamp":T,"value":V},...]}`
pub(crate) struct ValuesBody<'v, V>(pub &'v [TimedValue<'v, V>]);

impl<V: Serialize> Body for ValuesBody<'_, V> {
    fn write_body<S: Sink>(&self, sink: &mut S) -> Result<(), Error> {
        sink.write_str("{\"values\":")?;
        write_timed_values(sink, self.0)?;
        sink.write_str("}")
    }

    fn validate(&self) -> Result<(), Error> {
        if self.0.is_empty() {
            return Err(Error::Invalid);
        }
        Ok(())
    }
}

/// `{"values":{"<stream>":[{"timestamp":T,"value":V},...],...}}`
pub(crate) struct UpdatesBody<'v, V>(pub &'v [StreamValues<'v, V>]);

impl<V: Serialize> Body for UpdatesBody<'_, V> {
    fn write_body<S: Sink>(&self, sink: &mut S) -> Result<(), Error> {
        sink.write_str("{\"values\":{")?;
        for (i, stream) in self.0.iter().enumerate() {
            if i > 0 {
                sink.write_str(",")?;
            }
            write_json(sink, stream.name)?;
            sink.write_str(":")?;
            write_timed_values(sink, stream.values)?;
        }
        sink.write_str("}}")
    }

    fn validate(&self) -> Result<(), Error> {
        if self.0.is_empty() || self.0.iter().any(|stream| stream.values.is_empty()) {
            return Err(Error::Invalid);
        }
        Ok(())
    }
}

/// `{"values":{"<stream>":V,...},"timestamp":T}`
pub(crate) struct UpdateBody<'v, V> {
    pub values: &'v [(&'v str, V)],
    pub timestamp: Option<&'v str>,
}

impl<V: Serialize> Body for UpdateBody<'_, V> {
    fn write_body<S: Sink>(&self, sink: &mut S) -> Result<(), Error> {
        sink.write_str("{\"values\":{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                sink.write_str(",")?;
            }
            write_json(sink, *name)?;
            sink.write_str(":")?;
            write_json(sink, value)?;
        }
        sink.write_str("}")?;
        if let Some(timestamp) = self.timestamp {
            sink.write_str(",\"timestamp\":")?;
            write_json(sink, timestamp)?;
        }
        sink.write_str("}")
    }

    fn validate(&self) -> Result<(), Error> {
        if self.values.is_empty() {
            return Err(Error::Invalid);
        }
        Ok(())
    }
}

impl Body for Location<'_> {
    fn write_body<S: Sink>(&self, sink: &mut S) -> Result<(), Error> {
        write_json(sink, self)
    }
}

fn write_timed_values<S: Sink, V: Serialize>(sink: &mut S, values: &[TimedValue<'_, V>]) -> Result<(), Error> {
    sink.write_str("[")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            sink.write_str(",")?;
        }
        write_json(sink, value)?;
    }
    sink.write_str("]")
}

/// HTTP verb carried in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Put,
    Post,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Put => "PUT",
            Method::Post => "POST",
        }
    }
}

/// The device sub-resource a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resource<'a> {
    /// `/streams/<name>/value`
    StreamValue(&'a str),
    /// `/streams/<name>/values`
    StreamValues(&'a str),
    /// `/updates`
    Updates,
    /// `/update`
    Update,
    /// `/location`
    Location,
}

/// One request envelope: verb, target, and body.
pub(crate) struct Request<'a, B> {
    pub method: Method,
    pub device_id: &'a str,
    pub resource: Resource<'a>,
    pub body: B,
}

impl<B: Body> Request<'_, B> {
    /// Check everything that is written into the envelope unescaped.
    pub(crate) fn validate(&self, path_prefix: Option<&str>) -> Result<(), Error> {
        if let Some(prefix) = path_prefix {
            if !is_raw_safe(prefix) {
                return Err(Error::Invalid);
            }
        }
        if self.device_id.is_empty() || !is_raw_safe(self.device_id) {
            return Err(Error::Invalid);
        }
        match self.resource {
            Resource::StreamValue(name) | Resource::StreamValues(name)
                if name.is_empty() || !is_raw_safe(name) =>
            {
                return Err(Error::Invalid);
            }
            _ => {}
        }
        self.body.validate()
    }

    /// Format the whole envelope into `sink`.
    pub(crate) fn write_envelope<S: Sink>(
        &self,
        sink: &mut S,
        id: i16,
        path_prefix: Option<&str>,
    ) -> Result<(), Error> {
        let mut id_str: String<6> = String::new();
        core::fmt::Write::write_fmt(&mut id_str, format_args!("{}", id))
            .map_err(|_| Error::BufferTooSmall)?;

        sink.write_str("{\"id\":\"")?;
        sink.write_str(&id_str)?;
        sink.write_str("\",\"method\":\"")?;
        sink.write_str(self.method.as_str())?;
        sink.write_str("\",\"resource\":\"")?;
        if let Some(prefix) = path_prefix {
            sink.write_str(prefix)?;
        }
        sink.write_str("/v2/devices/")?;
        sink.write_str(self.device_id)?;
        match self.resource {
            Resource::StreamValue(name) => {
                sink.write_str("/streams/")?;
                sink.write_str(name)?;
                sink.write_str("/value")?;
            }
            Resource::StreamValues(name) => {
                sink.write_str("/streams/")?;
                sink.write_str(name)?;
                sink.write_str("/values")?;
            }
            Resource::Updates => sink.write_str("/updates")?,
            Resource::Update => sink.write_str("/update")?,
            Resource::Location => sink.write_str("/location")?,
        }
        sink.write_str("\",\"agent\":\"")?;
        sink.write_str(super::USER_AGENT)?;
        sink.write_str("\",\"body\":")?;
        self.body.write_body(sink)?;
        sink.write_str("}")
    }
}

/// Whether `s` can be placed inside a JSON string without escaping.
fn is_raw_safe(s: &str) -> bool {
    s.bytes().all(|b| b >= 0x20 && b != b'"' && b != b'\\')
}
