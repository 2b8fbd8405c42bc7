use std::time::{Duration, Instant};

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use psramp_core::{InBandWaiter, ScanRange, SetpointSequence, WaitParams, WaitStatus};

// Exponential approach to the target with a little deterministic ripple.
fn synth_readback(n: usize, target: f64, seed: u32) -> Vec<f64> {
    let mut state = seed.max(1);
    let mut next_f64 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };
    (0..n)
        .map(|i| {
            let approach = target * (1.0 - (-(i as f64) / 40.0).exp());
            approach + (next_f64() * 2.0 - 1.0) * 0.01
        })
        .collect()
}

fn poll_until_settled(trace: &[f64], params: WaitParams) -> usize {
    let t0 = Instant::now();
    let mut w = InBandWaiter::new(1.0, params, t0);
    for (i, &r) in trace.iter().enumerate() {
        let now = t0 + params.dwell * i as u32;
        match w.poll(r, now) {
            WaitStatus::Waiting { .. } => {}
            WaitStatus::Settled(_) | WaitStatus::TimedOut { .. } => return i,
        }
    }
    trace.len()
}

pub fn bench_waiter(c: &mut Criterion) {
    let mut g = c.benchmark_group("settle");
    // BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p psramp_core --bench settle
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(Duration::from_millis(ms_u64));
    }

    let trace = synth_readback(10_000, 1.0, 0xC0FFEE);
    for &stable_ms in &[100u64, 400, 2000] {
        let params = WaitParams {
            tolerance: 0.02,
            dwell: Duration::from_millis(10),
            stable_time: Duration::from_millis(stable_ms),
            max_time: Duration::from_secs(3600),
        };
        g.bench_function(format!("poll_stable_{stable_ms}ms"), |b| {
            b.iter_batched(
                || trace.clone(),
                |t| black_box(poll_until_settled(black_box(&t), params)),
                BatchSize::SmallInput,
            )
        });
    }

    let seq = SetpointSequence::new(ScanRange::new(-50.0, 50.0, 0.001)).unwrap_or_else(|e| {
        panic!("bench range: {e}");
    });
    g.bench_function("sequence_iter_100k", |b| {
        b.iter(|| black_box(seq.iter().fold(0.0, |acc, v| acc + v)))
    });
    g.finish();
}

criterion_group!(settle, bench_waiter);
criterion_main!(settle);
