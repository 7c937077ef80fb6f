#![allow(missing_docs, clippy::all)]

//! Delivery order and payload integrity through a running Disruptor

use seqring::disruptor::{
    BusySpinWaitStrategy, DefaultEventFactory, Disruptor, EventHandler, ProducerType, Result,
    YieldingWaitStrategy,
};
use seqring::WaitStrategy;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

const PAYLOAD_LEN: usize = 64;

#[derive(Debug)]
struct Payload {
    bytes: [u8; PAYLOAD_LEN],
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            bytes: [0; PAYLOAD_LEN],
        }
    }
}

fn pattern(sequence: i64, index: usize) -> u8 {
    (sequence as usize).wrapping_mul(31).wrapping_add(index) as u8
}

struct OrderCheckingHandler {
    expected: i64,
    out_of_order: Arc<AtomicUsize>,
    corrupted: Arc<AtomicUsize>,
    last_seen: Arc<AtomicI64>,
}

impl EventHandler<Payload> for OrderCheckingHandler {
    fn on_event(&mut self, event: &mut Payload, sequence: i64, _end_of_batch: bool) -> Result<()> {
        if sequence != self.expected {
            self.out_of_order.fetch_add(1, Ordering::Relaxed);
        }
        self.expected = sequence + 1;

        let intact = event
            .bytes
            .iter()
            .enumerate()
            .all(|(index, &byte)| byte == pattern(sequence, index));
        if !intact {
            self.corrupted.fetch_add(1, Ordering::Relaxed);
        }

        self.last_seen.store(sequence, Ordering::Release);
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn run_single_producer(buffer_size: usize, events: i64, wait_strategy: Arc<dyn WaitStrategy>) {
    let mut disruptor = Disruptor::new(
        DefaultEventFactory::<Payload>::new(),
        buffer_size,
        ProducerType::Single,
        wait_strategy,
    )
    .unwrap();

    let out_of_order = Arc::new(AtomicUsize::new(0));
    let corrupted = Arc::new(AtomicUsize::new(0));
    let last_seen = Arc::new(AtomicI64::new(-1));

    disruptor
        .handle_events_with(OrderCheckingHandler {
            expected: 0,
            out_of_order: Arc::clone(&out_of_order),
            corrupted: Arc::clone(&corrupted),
            last_seen: Arc::clone(&last_seen),
        })
        .unwrap();
    disruptor.start().unwrap();

    let publisher = disruptor.publisher();
    for _ in 0..events {
        publisher
            .publish_with(|event, sequence| {
                for (index, byte) in event.bytes.iter_mut().enumerate() {
                    *byte = pattern(sequence, index);
                }
            })
            .unwrap();
    }

    disruptor.shutdown().unwrap();

    assert_eq!(last_seen.load(Ordering::Acquire), events - 1);
    assert_eq!(out_of_order.load(Ordering::Relaxed), 0);
    assert_eq!(corrupted.load(Ordering::Relaxed), 0);
}

#[test]
fn test_single_producer_delivers_in_order_without_gaps() {
    init_tracing();
    run_single_producer(1024, 100_000, Arc::new(YieldingWaitStrategy::new()));
}

#[test]
fn test_payload_integrity_across_capacities() {
    init_tracing();
    for buffer_size in [1, 2, 64, 1024] {
        run_single_producer(buffer_size, 20_000, Arc::new(BusySpinWaitStrategy::new()));
    }
}

#[test]
fn test_every_stage_observes_identical_order() {
    init_tracing();
    let mut disruptor = Disruptor::new(
        DefaultEventFactory::<Payload>::new(),
        256,
        ProducerType::Single,
        Arc::new(YieldingWaitStrategy::new()),
    )
    .unwrap();

    let counters: Vec<_> = (0..3)
        .map(|_| {
            (
                Arc::new(AtomicUsize::new(0)),
                Arc::new(AtomicUsize::new(0)),
                Arc::new(AtomicI64::new(-1)),
            )
        })
        .collect();
    let handler = |index: usize| OrderCheckingHandler {
        expected: 0,
        out_of_order: Arc::clone(&counters[index].0),
        corrupted: Arc::clone(&counters[index].1),
        last_seen: Arc::clone(&counters[index].2),
    };

    disruptor
        .handle_events_with(handler(0))
        .unwrap()
        .and(handler(1))
        .unwrap()
        .then(handler(2))
        .unwrap();
    disruptor.start().unwrap();

    let publisher = disruptor.publisher();
    for _ in 0..10_000 {
        publisher
            .publish_with(|event, sequence| {
                for (index, byte) in event.bytes.iter_mut().enumerate() {
                    *byte = pattern(sequence, index);
                }
            })
            .unwrap();
    }
    disruptor.shutdown().unwrap();

    for (out_of_order, corrupted, last_seen) in &counters {
        assert_eq!(last_seen.load(Ordering::Acquire), 9_999);
        assert_eq!(out_of_order.load(Ordering::Relaxed), 0);
        assert_eq!(corrupted.load(Ordering::Relaxed), 0);
    }
}
