//! Single Producer Single Consumer (SPSC) Benchmarks
//!
//! One publisher thread feeding one batch event processor, measured for every
//! wait strategy and a range of burst sizes.

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use seqring::disruptor::{
    DefaultEventFactory, Disruptor, EventHandler, ProducerType, Result as DisruptorResult,
    WaitStrategyKind,
};

const BUFFER_SIZE: usize = 1024 * 8;
const BURST_SIZES: [u64; 3] = [1, 100, 1000];

#[derive(Debug, Default, Clone, Copy)]
struct BenchmarkEvent {
    count: i64,
}

/// Counts events into a shared atomic so the publisher can wait for the burst
struct CountingHandler {
    processed: Arc<AtomicI64>,
}

impl EventHandler<BenchmarkEvent> for CountingHandler {
    fn on_event(
        &mut self,
        event: &mut BenchmarkEvent,
        _sequence: i64,
        end_of_batch: bool,
    ) -> DisruptorResult<()> {
        event.count += 1;
        // One release store per batch keeps the handler off the shared cache line.
        if end_of_batch {
            self.processed.store(event.count, Ordering::Release);
        }
        Ok(())
    }
}

/// Baseline measurement to determine overhead
fn baseline_measurement(group: &mut BenchmarkGroup<WallTime>, burst_size: u64) {
    let sink = Arc::new(AtomicI64::new(0));

    group.throughput(Throughput::Elements(burst_size));
    group.bench_function(BenchmarkId::new("baseline", burst_size), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for i in 1..=burst_size {
                    sink.store(black_box(i as i64), Ordering::Release);
                }
                while sink.load(Ordering::Acquire) != burst_size as i64 {}
            }
            start.elapsed()
        })
    });
}

fn benchmark_strategy(
    group: &mut BenchmarkGroup<WallTime>,
    name: &str,
    wait_strategy: WaitStrategyKind,
    burst_size: u64,
) {
    let mut disruptor = Disruptor::new(
        DefaultEventFactory::<BenchmarkEvent>::new(),
        BUFFER_SIZE,
        ProducerType::Single,
        wait_strategy.build(),
    )
    .unwrap();

    let processed = Arc::new(AtomicI64::new(0));
    disruptor
        .handle_events_with(CountingHandler {
            processed: Arc::clone(&processed),
        })
        .unwrap();
    disruptor.start().unwrap();
    let publisher = disruptor.publisher();

    group.throughput(Throughput::Elements(burst_size));
    group.bench_function(BenchmarkId::new(name, burst_size), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let mut last_count = 0;
                for i in 1..=burst_size {
                    // The handler adds one, so the last event of the burst reports `burst_size`.
                    publisher
                        .publish_with(|event, _sequence| {
                            event.count = black_box(i as i64 - 1);
                        })
                        .unwrap();
                    last_count = i as i64;
                }

                while processed.load(Ordering::Acquire) != last_count {
                    std::hint::spin_loop();
                }
                processed.store(0, Ordering::Release);
            }
            start.elapsed()
        })
    });

    disruptor.shutdown().unwrap();
}

fn benchmark_batch_publish(group: &mut BenchmarkGroup<WallTime>, burst_size: u64) {
    let mut disruptor = Disruptor::new(
        DefaultEventFactory::<BenchmarkEvent>::new(),
        BUFFER_SIZE,
        ProducerType::Single,
        WaitStrategyKind::BusySpin.build(),
    )
    .unwrap();

    let processed = Arc::new(AtomicI64::new(0));
    disruptor
        .handle_events_with(CountingHandler {
            processed: Arc::clone(&processed),
        })
        .unwrap();
    disruptor.start().unwrap();
    let publisher = disruptor.publisher();

    group.throughput(Throughput::Elements(burst_size));
    group.bench_function(BenchmarkId::new("BusySpinBatch", burst_size), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let mut offset = 0;
                publisher
                    .publish_batch_with(burst_size as i64, |event, _sequence| {
                        event.count = black_box(offset);
                        offset += 1;
                    })
                    .unwrap();

                while processed.load(Ordering::Acquire) != burst_size as i64 {
                    std::hint::spin_loop();
                }
                processed.store(0, Ordering::Release);
            }
            start.elapsed()
        })
    });

    disruptor.shutdown().unwrap();
}

/// Main SPSC benchmark function
pub fn spsc_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("SPSC");
    group.measurement_time(Duration::from_secs(10));
    group.warm_up_time(Duration::from_secs(3));

    for &burst_size in BURST_SIZES.iter() {
        baseline_measurement(&mut group, burst_size);

        benchmark_strategy(&mut group, "BusySpin", WaitStrategyKind::BusySpin, burst_size);
        benchmark_strategy(
            &mut group,
            "Yielding",
            WaitStrategyKind::Yielding { spin_tries: 100 },
            burst_size,
        );
        benchmark_strategy(&mut group, "Blocking", WaitStrategyKind::Blocking, burst_size);
        if burst_size <= 100 {
            benchmark_strategy(
                &mut group,
                "Sleeping",
                WaitStrategyKind::Sleeping {
                    retries: 200,
                    sleep_nanos: 100,
                },
                burst_size,
            );
        }

        benchmark_batch_publish(&mut group, burst_size);
    }

    group.finish();
}

criterion_group!(spsc, spsc_benchmark);
criterion_main!(spsc);
