use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use pawcare_core::config::EstimatorCfg;
use pawcare_core::estimator::{estimate_heart_rate, estimate_spo2};

// PPG-like trace: DC + sine pulse + white noise
fn synth_ppg(n: usize, dc: f32, ac: f32, period: f32, noise_amp: f32, seed: u32) -> Vec<f32> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    (0..n)
        .map(|i| {
            let s = (std::f32::consts::TAU * i as f32 / period + 0.3).sin();
            dc + ac * s + (next_f32() * 2.0 - 1.0) * noise_amp
        })
        .collect()
}

fn configure(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p pawcare_core --bench estimator
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(10));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }
}

pub fn bench_heart_rate(c: &mut Criterion) {
    let mut g = c.benchmark_group("heart_rate");
    configure(&mut g);
    let cfg = EstimatorCfg::default();

    // Collar publish window (100) and full window (150) at 50 Hz, plus a long trace.
    for &n in &[100usize, 150, 1_000] {
        let ir = synth_ppg(n, 80_000.0, 4_000.0, 25.0, 150.0, 0xC0FFEE);
        let elapsed = n as f32 / 50.0;
        g.bench_function(format!("window_{n}"), |b| {
            b.iter_batched(
                || ir.clone(),
                |s| {
                    let r = estimate_heart_rate(black_box(&s), black_box(elapsed), &cfg);
                    black_box(r);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

pub fn bench_spo2(c: &mut Criterion) {
    let mut g = c.benchmark_group("spo2");
    configure(&mut g);
    let cfg = EstimatorCfg::default();
    let red = synth_ppg(150, 60_000.0, 1_800.0, 25.0, 100.0, 0xBEEF);
    let ir = synth_ppg(150, 80_000.0, 4_000.0, 25.0, 100.0, 0xF00D);
    g.bench_function("window_150", |b| {
        b.iter(|| black_box(estimate_spo2(black_box(&red), black_box(&ir), &cfg)))
    });
    g.finish();
}

criterion_group!(benches, bench_heart_rate, bench_spo2);
criterion_main!(benches);
