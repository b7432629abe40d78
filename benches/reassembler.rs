//! Frame reassembly and batching throughput

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use gapless_stream::batch::{CapacityPolicy, SuperFrameBuffer};
use gapless_stream::mpeg::FrameHeader;
use gapless_stream::stream::Reassembler;

/// 128 kbps 44.1 kHz frames, one second of audio per 38 frames
fn stream(frames: usize) -> Vec<u8> {
    let header = [0xFF, 0xFB, 0x90, 0x00];
    let len = FrameHeader::parse(header).map(|h| h.frame_len()).unwrap_or(417);
    let mut data = Vec::with_capacity(frames * len);
    for _ in 0..frames {
        let start = data.len();
        data.extend_from_slice(&header);
        data.resize(start + len, 0x55);
    }
    data
}

fn chunks(data: &[u8], size: usize) -> Vec<Bytes> {
    data.chunks(size).map(Bytes::copy_from_slice).collect()
}

fn bench_reassembler(c: &mut Criterion) {
    let data = stream(1000);
    let mut group = c.benchmark_group("reassembler");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for size in [64usize, 1460, 4096] {
        let input = chunks(&data, size);
        group.bench_function(format!("feed_chunks_{}", size), |b| {
            b.iter(|| {
                let mut reassembler = Reassembler::new();
                let mut frames = 0;
                for chunk in &input {
                    frames += reassembler.feed(black_box(chunk)).len();
                }
                black_box(frames);
            });
        });
    }

    group.finish();
}

fn bench_super_frame(c: &mut Criterion) {
    let data = stream(1000);
    let frames: Vec<Bytes> = {
        let mut reassembler = Reassembler::new();
        reassembler.feed(&Bytes::from(data.clone()))
    };

    let mut group = c.benchmark_group("super_frame");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("flush_early_default_capacity", |b| {
        b.iter(|| {
            let mut buffer = SuperFrameBuffer::new(384 * 128, CapacityPolicy::FlushEarly);
            let mut blocks = 0;
            for frame in &frames {
                blocks += buffer.push(black_box(frame)).map(|b| b.len()).unwrap_or(0);
            }
            black_box(blocks);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_reassembler, bench_super_frame);
criterion_main!(benches);
