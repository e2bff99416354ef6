use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use vstream_protocol::catalog::{Frame, FrameCatalog, QualityCatalog};
use vstream_protocol::feedback::FeedbackMessage;
use vstream_protocol::pacer::{Pacer, PacerConfig};
use vstream_protocol::packetizer::Packetizer;
use vstream_protocol::receiver::ClientReceiver;

fn bench_fragment(c: &mut Criterion) {
    let packetizer = Packetizer::new(1400).unwrap();
    let frame = Frame {
        index: 0,
        size_bytes: 64_000, // Large I-frame
    };

    let mut group = c.benchmark_group("fragment");
    group.throughput(Throughput::Bytes(frame.size_bytes as u64));
    group.bench_function("i_frame", |b| {
        b.iter(|| {
            let total: usize = packetizer.fragment(black_box(frame)).map(|p| p.len()).sum();
            black_box(total);
        });
    });
    group.finish();
}

fn bench_pacer_run(c: &mut Criterion) {
    let catalog = Arc::new(
        QualityCatalog::replicated(FrameCatalog::uniform(12_000, 1000).unwrap(), 3).unwrap(),
    );

    c.bench_function("pacer_full_catalog", |b| {
        b.iter(|| {
            let mut pacer = Pacer::new(catalog.clone(), PacerConfig::default()).unwrap();
            pacer.start().unwrap();
            loop {
                let tick = pacer.tick();
                if let Some(burst) = tick.burst {
                    for payload in burst.fragments {
                        black_box(payload);
                    }
                }
                if !tick.reschedule {
                    break;
                }
            }
        });
    });
}

fn bench_receiver_arrival(c: &mut Criterion) {
    c.bench_function("receiver_on_datagram", |b| {
        let mut rx = ClientReceiver::new(25, 3, 1).unwrap();
        b.iter(|| {
            let decision = rx.on_datagram(black_box(1400));
            black_box(decision);
        });
    });
}

fn bench_feedback_codec(c: &mut Criterion) {
    c.bench_function("feedback_roundtrip", |b| {
        b.iter(|| {
            let bytes = FeedbackMessage::new(black_box(2)).to_bytes();
            black_box(FeedbackMessage::from_bytes(&bytes).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_fragment,
    bench_pacer_run,
    bench_receiver_arrival,
    bench_feedback_codec
);
criterion_main!(benches);
