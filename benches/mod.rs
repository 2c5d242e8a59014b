use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::application::m2x::bench_update_stream_value,
    network::application::m2x::bench_post_stream_values,
    network::application::m2x::bench_stream_large_publish
);
criterion_main!(benches);
