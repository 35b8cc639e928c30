//! Criterion benchmarks for the sample buffer hot paths.
//!
//! - `append`: the scheduler's per-tick write
//! - `latest`: the forwarder's per-tick read
//! - `drain`: the controller's one-off copy at the end of a session
//!
//! Run with: cargo bench --bench sample_buffer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use thrust_daq::data::SampleBuffer;
use thrust_daq::measurement::Sample;

fn sample_buffer_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_buffer_append");

    for capacity in [200usize, 6_000, 72_000] {
        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(
            BenchmarkId::new("fill", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let (mut writer, _reader) = SampleBuffer::with_capacity(capacity);
                    for i in 0..capacity {
                        let sample = Sample::force(i as u64 * 50, -5.9542).with_power(16.8, 10.0);
                        black_box(writer.append(sample)).ok();
                    }
                });
            },
        );
    }

    group.finish();
}

fn sample_buffer_latest(c: &mut Criterion) {
    let (mut writer, reader) = SampleBuffer::with_capacity(1_000);
    for i in 0..500u64 {
        writer.append(Sample::force(i * 50, 1.0)).ok();
    }

    c.bench_function("sample_buffer_latest", |b| {
        b.iter(|| black_box(reader.latest()));
    });
}

fn sample_buffer_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_buffer_drain");

    for capacity in [200usize, 6_000, 72_000] {
        let (mut writer, reader) = SampleBuffer::with_capacity(capacity);
        for i in 0..capacity {
            writer.append(Sample::force(i as u64 * 50, 1.0)).ok();
        }

        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(BenchmarkId::new("drain", capacity), &reader, |b, reader| {
            b.iter(|| black_box(reader.drain()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    sample_buffer_append,
    sample_buffer_latest,
    sample_buffer_drain
);
criterion_main!(benches);
