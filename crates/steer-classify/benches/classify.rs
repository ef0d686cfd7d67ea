//! Classification benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use steer_classify::Classifier;
use steer_common::{parse_headers, MatchField, RawPacket};

fn udp_frame(dst_port: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(64);
    // Ethernet
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
    frame.extend_from_slice(&[0x08, 0x00]);
    // IPv4
    frame.extend_from_slice(&[0x45, 0x00, 0x00, 0x25]);
    frame.extend_from_slice(&[0x00, 0x00, 0x40, 0x00]);
    frame.extend_from_slice(&[0x40, 17, 0x00, 0x00]);
    frame.extend_from_slice(&[192, 168, 1, 1]);
    frame.extend_from_slice(&[10, 0, 0, 1]);
    // UDP
    frame.extend_from_slice(&40000u16.to_be_bytes());
    frame.extend_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x11, 0x00, 0x00]);
    frame.extend_from_slice(b"benchmark");
    frame
}

fn bench_parse_headers(c: &mut Criterion) {
    let frame = udp_frame(54321);
    c.bench_function("parse_headers_udp", |b| {
        b.iter(|| parse_headers(black_box(&frame)).unwrap())
    });
}

fn bench_classify(c: &mut Criterion) {
    let engine = Classifier::new();
    let cos_udp = engine.create_class("cos_udp").unwrap();
    let cos_default = engine.create_class("cos_default").unwrap();
    let eth0 = engine.intern_interface("eth0");
    engine
        .bind_interface(eth0, cos_default, cos_default)
        .unwrap();
    engine
        .add_rule(MatchField::UdpDstPort, 54321, 0xFFFF, cos_default, cos_udp)
        .unwrap();

    let hit = RawPacket::new(eth0, udp_frame(54321));
    let miss = RawPacket::new(eth0, udp_frame(80));

    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(1));
    group.bench_function("rule_hit", |b| {
        b.iter(|| engine.classify(black_box(&hit)).unwrap())
    });
    group.bench_function("default_fallthrough", |b| {
        b.iter(|| engine.classify(black_box(&miss)).unwrap())
    });
    group.finish();
}

fn bench_rule_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_scaling");

    for rules in [1usize, 16, 64, 256] {
        let engine = Classifier::new();
        let cos_default = engine.create_class("cos_default").unwrap();
        let cos_match = engine.create_class("cos_match").unwrap();
        let eth0 = engine.intern_interface("eth0");
        engine
            .bind_interface(eth0, cos_default, cos_default)
            .unwrap();
        // The matching rule comes last: worst-case linear scan
        for i in 0..rules - 1 {
            engine
                .add_rule(
                    MatchField::UdpDstPort,
                    (i + 1) as u64,
                    0xFFFF,
                    cos_default,
                    cos_match,
                )
                .unwrap();
        }
        engine
            .add_rule(MatchField::UdpDstPort, 54321, 0xFFFF, cos_default, cos_match)
            .unwrap();
        let pkt = RawPacket::new(eth0, udp_frame(54321));

        group.bench_with_input(BenchmarkId::from_parameter(rules), &rules, |b, _| {
            b.iter(|| engine.classify(black_box(&pkt)).unwrap())
        });
    }
    group.finish();
}

fn bench_process_roundtrip(c: &mut Criterion) {
    let engine = Classifier::new();
    let cos = engine.create_class("cos_all").unwrap();
    let eth0 = engine.intern_interface("eth0");
    engine.bind_interface(eth0, cos, cos).unwrap();
    let queue = engine.queue_of(cos).unwrap();
    let pkt = RawPacket::new(eth0, udp_frame(1000));

    c.bench_function("process_and_drain", |b| {
        b.iter(|| {
            engine.process(black_box(pkt.clone())).unwrap();
            queue.dequeue().unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_parse_headers,
    bench_classify,
    bench_rule_scaling,
    bench_process_roundtrip,
);

criterion_main!(benches);
