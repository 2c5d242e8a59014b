use criterion::{BatchSize, Criterion, Throughput};
use m2x_mqtt::network::application::m2x::{Client, Options, TimedValue};
use m2x_mqtt::network::application::mqtt::{MqttStream, codec};
use m2x_mqtt::network::error::Error;
use m2x_mqtt::network::{Connect, Read, Stop, Transport, Write};
use std::collections::VecDeque;
use std::hint::black_box;

const KEY: &str = "bench-key";

/// In-memory broker side: swallows writes and serves queued frames.
#[derive(Default)]
struct LoopbackTransport {
    inbound: VecDeque<u8>,
    written: usize,
}

impl LoopbackTransport {
    fn frame(&mut self, header: u8, body: &[u8]) {
        self.inbound.push_back(header);
        let mut len = body.len();
        loop {
            let mut byte = (len % 128) as u8;
            len /= 128;
            if len > 0 {
                byte |= 0x80;
            }
            self.inbound.push_back(byte);
            if len == 0 {
                break;
            }
        }
        self.inbound.extend(body.iter().copied());
    }

    fn accept_handshake(&mut self) {
        self.frame(0x20, &[0, 0]);
        self.frame(0x90, &[0, 1, 0]);
    }

    fn respond(&mut self, id: i16, status: i16) {
        let topic = format!("m2x/{}/responses", KEY);
        let json = format!("{{\"id\":\"{}\",\"status\":{}}}", id, status);
        let mut body = (topic.len() as u16).to_be_bytes().to_vec();
        body.extend_from_slice(topic.as_bytes());
        body.extend_from_slice(json.as_bytes());
        self.frame(0x30, &body);
    }
}

impl Connect for LoopbackTransport {
    type Error = Error;

    fn connect(&mut self, _host: &str, _port: u16) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Read for LoopbackTransport {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn available(&mut self) -> usize {
        self.inbound.len()
    }
}

impl Write for LoopbackTransport {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Stop for LoopbackTransport {
    fn stop(&mut self) {}

    fn connected(&self) -> bool {
        true
    }
}

impl Transport for LoopbackTransport {}

fn connected_client() -> Client<'static, LoopbackTransport> {
    let mut transport = LoopbackTransport::default();
    transport.accept_handshake();
    let mut client = Client::new(transport, KEY, Options::default());
    client.connect().expect("handshake failed");
    client
}

pub fn bench_update_stream_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_stream_value");
    group.throughput(Throughput::Elements(1));
    group.bench_function("round_trip", |b| {
        let mut client = connected_client();
        b.iter(|| {
            let next = client.request_id().wrapping_add(1);
            client.transport_mut().respond(next, 202);
            let status = client
                .update_stream_value(black_box("device"), black_box("temperature"), black_box(21.5))
                .expect("request failed");
            black_box(status);
        })
    });
    group.finish();
}

pub fn bench_post_stream_values(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_stream_values");
    let stamps: Vec<String> = (0..100)
        .map(|i| format!("2014-01-01T00:{:02}:{:02}Z", i / 60, i % 60))
        .collect();
    let values: Vec<TimedValue<'_, f64>> = stamps
        .iter()
        .enumerate()
        .map(|(i, stamp)| TimedValue {
            timestamp: Some(stamp.as_str()),
            value: i as f64 * 0.5,
        })
        .collect();
    group.throughput(Throughput::Elements(values.len() as u64));
    group.bench_function("batch_of_100", |b| {
        let mut client = connected_client();
        b.iter(|| {
            let next = client.request_id().wrapping_add(1);
            client.transport_mut().respond(next, 202);
            let status = client
                .post_stream_values("device", "temperature", black_box(&values))
                .expect("request failed");
            black_box(status);
        })
    });
    group.finish();
}

pub fn bench_stream_large_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_publish");
    let payload = vec![b'x'; 16 * 1024];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("16k_through_window", |b| {
        b.iter_batched_ref(
            || MqttStream::new(LoopbackTransport::default()),
            |stream| {
                let topic = b"bench/topic";
                let remaining = codec::string_encoded_length(topic.len()) + payload.len();
                stream
                    .encode_fixed_header(codec::pack_type(codec::PUBLISH, 0), remaining)
                    .expect("encode failed");
                stream.encode_string(topic).expect("encode failed");
                for chunk in payload.chunks(100) {
                    stream.encode_buffer(chunk).expect("encode failed");
                }
                stream.finish_packet().expect("flush failed");
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}
