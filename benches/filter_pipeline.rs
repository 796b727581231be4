// benches/filter_pipeline.rs
//! Per-cycle cost of the hot path: full-window refiltering plus
//! classification. Budget is one cycle per inbound sample, 5 ms at 200 Hz.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use neuri_core::{
    butter_bandstop, Classifier, FilterStage, PipelineConfig,
};

/// Deterministic pseudo-EEG: slow drift, mains interference, and a weak
/// oscillation in the band of interest.
fn synth_window(len: usize, rate: f64) -> Vec<f64> {
    (0..len)
        .map(|n| {
            let t = n as f64 / rate;
            0.5 * (2.0 * std::f64::consts::PI * 2.0 * t).sin()
                + 1.5 * (2.0 * std::f64::consts::PI * 50.0 * t).sin()
                + 3.0 * t
        })
        .collect()
}

fn bench_filter_design(c: &mut Criterion) {
    c.bench_function("design/bandstop_order3", |b| {
        b.iter(|| butter_bandstop(black_box(3), black_box(46.0), black_box(54.0), 200.0))
    });
}

fn bench_filter_stage(c: &mut Criterion) {
    let mut group = c.benchmark_group("stage/process");
    for window_seconds in [1.0, 2.0, 4.0] {
        let mut config = PipelineConfig::default();
        config.window_seconds = window_seconds;
        let mut stage = FilterStage::from_config(&config).unwrap();
        let window = synth_window(config.window_len(), config.sample_rate_hz as f64);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}s", window_seconds)),
            &window,
            |b, window| b.iter(|| stage.process(black_box(window))),
        );
    }
    group.finish();
}

fn bench_full_cycle(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let mut stage = FilterStage::from_config(&config).unwrap();
    let mut classifier = Classifier::from_config(&config);
    let window = synth_window(config.window_len(), config.sample_rate_hz as f64);

    c.bench_function("cycle/filter_and_classify", |b| {
        b.iter(|| {
            let filtered = stage.process(black_box(&window));
            classifier.classify(black_box(&filtered))
        })
    });
}

criterion_group!(benches, bench_filter_design, bench_filter_stage, bench_full_cycle);
criterion_main!(benches);
