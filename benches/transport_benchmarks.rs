//! Transport benchmarks
//!
//! Measures loopback datagram round trips and gather-send assembly.
//!
//! Run with: `cargo bench --bench transport_benchmarks`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use netcode_transport::{TcpListener, TcpStream, UdpSocket};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(1);

/// Benchmark one send plus the size-discovering receive on loopback
fn bench_udp_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("udp_roundtrip");

    let server = UdpSocket::open(0, None).unwrap();
    let client = UdpSocket::open(0, Some("127.0.0.1")).unwrap();
    let port = server.local_port();

    for size in [64, 512, 1400, 8192] {
        let data = vec![0xAA; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| {
                client.send(None, port, &[data]).unwrap();
                let datagram = server.receive(TIMEOUT).unwrap().unwrap();
                black_box(datagram.len());
            });
        });
    }

    group.finish();
}

/// Benchmark gather-send with the payload split across more buffers
fn bench_udp_gather(c: &mut Criterion) {
    let mut group = c.benchmark_group("udp_gather");

    let server = UdpSocket::open(0, None).unwrap();
    let client = UdpSocket::open(0, Some("127.0.0.1")).unwrap();
    let port = server.local_port();
    let payload = vec![0x55u8; 1024];

    for pieces in [1, 4, 16, 64] {
        let buffers: Vec<&[u8]> = payload.chunks(payload.len() / pieces).collect();

        group.bench_with_input(BenchmarkId::from_parameter(pieces), &buffers, |b, buffers| {
            b.iter(|| {
                let sent = client.send(None, port, buffers).unwrap();
                black_box(sent);
                server.receive(TIMEOUT).unwrap().unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark a stream write and exact-size read on loopback
fn bench_tcp_exchange(c: &mut Criterion) {
    let mut group = c.benchmark_group("tcp_exchange");

    let listener = TcpListener::listen(netcode_integration_tests::free_tcp_port()).unwrap();
    let mut client = TcpStream::connect("127.0.0.1", listener.local_port()).unwrap();
    let mut server = listener.accept(TIMEOUT).unwrap().unwrap().stream;

    for size in [64, 1024, 16_384] {
        let data = vec![0x11u8; size];
        let mut buf = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                client.write(&data).unwrap();
                let n = server.read(&mut buf, TIMEOUT).unwrap();
                black_box(n);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_udp_roundtrip,
    bench_udp_gather,
    bench_tcp_exchange
);
criterion_main!(benches);
