//! Benchmarks for the SID engine hot path
//!
//! Run with: cargo bench --bench engine

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use resid::{clock, ChipModel, SamplingConfig, SamplingMethod, Sid};
use std::hint::black_box;

fn playing_sid(method: SamplingMethod) -> Sid {
    let config = SamplingConfig::new(method, clock::PAL, 44_100.0);
    let mut sid = Sid::new(ChipModel::Mos6581, config).expect("valid sampling config");
    sid.write_now(0x01, 0x1d); // Voice 1 ~440 Hz
    sid.write_now(0x02, 0x00);
    sid.write_now(0x03, 0x08); // 50% pulse
    sid.write_now(0x06, 0xf0);
    sid.write_now(0x16, 0x40); // Cutoff
    sid.write_now(0x17, 0xf1); // Resonance 15, voice 1 filtered
    sid.write_now(0x18, 0x1f); // Lowpass, volume 15
    sid.write_now(0x04, 0x41); // Pulse, gate on
    sid
}

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    let mut sid = playing_sid(SamplingMethod::Fast);

    for cycles in [1_000u32, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(cycles), cycles, |b, &cycles| {
            b.iter(|| sid.advance(black_box(cycles)));
        });
    }

    group.finish();
}

fn bench_sampling_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_20ms");

    for method in [
        SamplingMethod::Fast,
        SamplingMethod::Interpolate,
        SamplingMethod::Resample,
        SamplingMethod::ResampleFastMem,
    ] {
        let mut sid = playing_sid(method);
        group.bench_function(method.to_string(), |b| {
            b.iter(|| black_box(sid.clock(19_705)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_advance, bench_sampling_methods);
criterion_main!(benches);
