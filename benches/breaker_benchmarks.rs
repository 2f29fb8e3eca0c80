use circuit_guard::rate_limit::TokenBucket;
use circuit_guard::tripping::AlwaysTrip;
use circuit_guard::{
    BreakerConfig, CallError, CircuitBreakerBuilder, ManualClock, ThreeStateBreaker,
    TokenBucketConfig, TwoStateBreaker,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

fn benchmark_closed_call(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create runtime");
    let breaker: ThreeStateBreaker<String> = CircuitBreakerBuilder::new("bench")
        .token_bucket(TokenBucketConfig::full(10, 1.0))
        .build_three_state()
        .expect("Failed to create breaker");

    c.bench_function("three_state_closed_call", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                breaker
                    .call(|| async { Ok::<_, CallError<String>>(42) })
                    .await,
            )
        })
    });
}

fn benchmark_open_rejection(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create runtime");
    let breaker: TwoStateBreaker<String> = CircuitBreakerBuilder::new("bench")
        .open_duration(Duration::from_secs(3600))
        .trip_decider(AlwaysTrip)
        .clock(ManualClock::new())
        .build_two_state()
        .expect("Failed to create breaker");
    rt.block_on(async {
        let _ = breaker
            .execute(|| async { Err::<(), _>("down".to_string()) })
            .await;
    });

    c.bench_function("two_state_open_rejection", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(breaker.execute(|| async { Ok::<_, String>(()) }).await)
        })
    });
}

fn benchmark_token_bucket(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_bucket");

    for cost in [1u64, 5, 50].iter() {
        let mut bucket = TokenBucket::new(&TokenBucketConfig::full(100, 1_000.0));
        let start = Instant::now();
        let mut tick = 0u64;

        group.bench_with_input(BenchmarkId::from_parameter(cost), cost, |b, &cost| {
            b.iter(|| {
                tick += 1;
                let now = start + Duration::from_micros(tick);
                black_box(bucket.allowed(cost, now))
            })
        });
    }
    group.finish();
}

fn benchmark_config_parsing(c: &mut Criterion) {
    let yaml = r#"
name: "payments"
open_duration_ms: 5000
successes_to_close: 3
trip:
  policy: token_bucket
  capacity: 10
  refill_per_second: 0.5
half_open:
  scale_over_ms: 30000
  max_chance: 0.25
"#;

    c.bench_function("config_parsing", |b| {
        b.iter(|| black_box(BreakerConfig::from_yaml(yaml)))
    });
}

criterion_group!(
    benches,
    benchmark_closed_call,
    benchmark_open_rejection,
    benchmark_token_bucket,
    benchmark_config_parsing
);
criterion_main!(benches);
