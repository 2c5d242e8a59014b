#![allow(dead_code)]

use m2x_mqtt::network::error::Error;
use m2x_mqtt::network::{Connect, Read, Stop, Transport, Write};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

pub const KEY: &str = "key1";
pub const RESPONSE_TOPIC: &str = "m2x/key1/responses";
pub const REQUEST_TOPIC: &str = "m2x/key1/requests";

/// Scripted transport for driving a client end to end.
///
/// Everything the broker would send is queued up front; the client only ever
/// reads as far as it needs, so the script plays out in order.
pub struct FakeTransport {
    pub inbound: VecDeque<u8>,
    pub written: Vec<u8>,
    pub open: bool,
    pub connects: usize,
    pub stops: usize,
    pub refuse_connect: bool,
    /// Bytes the transport still accepts before writes start failing.
    pub write_budget: Option<usize>,
    /// Empty polls reported before each non-empty one.
    pub stalls: usize,
    stalled: usize,
    /// Report at most a random 1..=max bytes per poll.
    chunking: Option<(StdRng, usize)>,
    /// Report the peer as gone once the script runs dry.
    pub hang_up_when_drained: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            written: Vec::new(),
            open: false,
            connects: 0,
            stops: 0,
            refuse_connect: false,
            write_budget: None,
            stalls: 0,
            stalled: 0,
            chunking: None,
            hang_up_when_drained: false,
        }
    }

    /// A transport whose broker accepts the handshake.
    pub fn accepting() -> Self {
        let mut transport = Self::new();
        transport.script(&connack(0));
        transport.script(&suback(0));
        transport
    }

    pub fn script(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    pub fn chunked(&mut self, seed: u64, max: usize) {
        self.chunking = Some((StdRng::seed_from_u64(seed), max));
    }
}

impl Connect for FakeTransport {
    type Error = Error;

    fn connect(&mut self, _host: &str, _port: u16) -> Result<(), Self::Error> {
        if self.refuse_connect {
            return Err(Error::ConnectionRefused);
        }
        self.connects += 1;
        self.open = true;
        Ok(())
    }
}

impl Read for FakeTransport {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn available(&mut self) -> usize {
        if !self.open {
            return 0;
        }
        if self.stalled < self.stalls {
            self.stalled += 1;
            return 0;
        }
        self.stalled = 0;
        match self.chunking.as_mut() {
            Some((rng, max)) => self.inbound.len().min(rng.gen_range(1..=*max)),
            None => self.inbound.len(),
        }
    }
}

impl Write for FakeTransport {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        let n = match self.write_budget.as_mut() {
            Some(0) => return Err(Error::WriteError),
            Some(budget) => {
                let n = buf.len().min(*budget);
                *budget -= n;
                n
            }
            None => buf.len(),
        };
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Stop for FakeTransport {
    fn stop(&mut self) {
        self.stops += 1;
        self.open = false;
    }

    fn connected(&self) -> bool {
        self.open && !(self.hang_up_when_drained && self.inbound.is_empty())
    }
}

impl Transport for FakeTransport {}

fn remaining_length(mut len: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

pub fn frame(header: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![header];
    remaining_length(body.len(), &mut out);
    out.extend_from_slice(body);
    out
}

pub fn connack(code: u8) -> Vec<u8> {
    frame(0x20, &[0x00, code])
}

pub fn suback(granted: u8) -> Vec<u8> {
    frame(0x90, &[0x00, 0x01, granted])
}

/// A PUBLISH at the given QoS; `packet_id` is only written for QoS > 0.
pub fn publish(qos: u8, packet_id: u16, topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    if qos > 0 {
        body.extend_from_slice(&packet_id.to_be_bytes());
    }
    body.extend_from_slice(payload);
    frame(0x30 | (qos << 1), &body)
}

/// A QoS 0 response envelope on the response topic.
pub fn response(id: i16, status: i16) -> Vec<u8> {
    let json = format!("{{\"id\":\"{}\",\"status\":{}}}", id, status);
    publish(0, 0, RESPONSE_TOPIC, json.as_bytes())
}

pub fn response_json(json: &str) -> Vec<u8> {
    publish(0, 0, RESPONSE_TOPIC, json.as_bytes())
}

/// One decoded outbound packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: u8,
    pub body: Vec<u8>,
}

impl Packet {
    pub fn packet_type(&self) -> u8 {
        self.header >> 4
    }

    /// Topic and payload of a QoS 0 PUBLISH.
    pub fn topic_and_payload(&self) -> (String, String) {
        let len = u16::from_be_bytes([self.body[0], self.body[1]]) as usize;
        let topic = String::from_utf8(self.body[2..2 + len].to_vec()).unwrap();
        let payload = String::from_utf8(self.body[2 + len..].to_vec()).unwrap();
        (topic, payload)
    }
}

/// Split recorded bytes into packets, checking every remaining length.
pub fn packets(mut bytes: &[u8]) -> Vec<Packet> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let header = bytes[0];
        let mut len = 0usize;
        let mut multiplier = 1usize;
        let mut used = 1;
        loop {
            let byte = bytes[used];
            used += 1;
            len += (byte & 0x7F) as usize * multiplier;
            multiplier *= 128;
            if byte & 0x80 == 0 {
                break;
            }
        }
        assert!(bytes.len() >= used + len, "truncated packet");
        out.push(Packet {
            header,
            body: bytes[used..used + len].to_vec(),
        });
        bytes = &bytes[used + len..];
    }
    out
}

/// Payloads of every PUBLISH the client sent.
pub fn requests(written: &[u8]) -> Vec<String> {
    packets(written)
        .into_iter()
        .filter(|p| p.packet_type() == 3)
        .map(|p| {
            let (topic, payload) = p.topic_and_payload();
            assert_eq!(topic, REQUEST_TOPIC);
            payload
        })
        .collect()
}
