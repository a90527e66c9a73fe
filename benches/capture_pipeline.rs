//! Capture pipeline throughput at common device rates.
//!
//! Run with: cargo bench --bench capture_pipeline

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use voxlink::audio::pcm;
use voxlink::pipeline::{CaptureConfig, CapturePipeline};

const BLOCK_SIZE: usize = 4096;
const DEVICE_RATES: [u32; 3] = [16000, 44100, 48000];

/// A 440 Hz tone loud enough to pass the gate.
fn speech_block(device_rate: u32) -> Vec<f32> {
    (0..BLOCK_SIZE)
        .map(|i| {
            let t = i as f32 / device_rate as f32;
            0.4 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture_block");
    group.throughput(Throughput::Elements(BLOCK_SIZE as u64));

    for rate in DEVICE_RATES {
        let block = speech_block(rate);
        group.bench_with_input(BenchmarkId::new("speech", rate), &block, |b, block| {
            let mut frames = 0usize;
            let mut capture =
                CapturePipeline::new(CaptureConfig::default(), rate, move |frame| {
                    frames += black_box(frame.len());
                });
            b.iter(|| capture.process_block(black_box(block)));
        });

        let silence = vec![0.001f32; BLOCK_SIZE];
        group.bench_with_input(BenchmarkId::new("silence", rate), &silence, |b, block| {
            let mut capture = CapturePipeline::new(CaptureConfig::default(), rate, |_| {});
            b.iter(|| capture.process_block(black_box(block)));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("pcm");
    let block = speech_block(48000);
    group.bench_function("decimate_48k_to_16k", |b| {
        b.iter(|| pcm::decimate(black_box(&block), 48000, 16000))
    });
    let samples: Vec<i16> = block.iter().copied().map(pcm::f32_to_i16).collect();
    group.bench_function("encode_le", |b| b.iter(|| pcm::encode_le(black_box(&samples))));
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
