#![allow(missing_docs, clippy::all)]

//! A producer never overwrites a slot its slowest consumer still needs

use seqring::disruptor::{
    BatchEventProcessor, ClosureEventHandler, DefaultEventFactory, EventPublisher,
    MultiProducerSequencer, ProducerType, RingBuffer, Sequencer, SingleProducerSequencer,
    ThreadBuilder, YieldingWaitStrategy,
};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const CAPACITY: usize = 8;

#[derive(Debug, Default)]
struct TestEvent {
    value: i64,
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        thread::sleep(Duration::from_millis(1));
    }
}

fn sequencer(producer_type: ProducerType) -> Arc<dyn Sequencer> {
    let wait_strategy = Arc::new(YieldingWaitStrategy::new());
    match producer_type {
        ProducerType::Single => {
            Arc::new(SingleProducerSequencer::new(CAPACITY, wait_strategy).unwrap())
        }
        ProducerType::Multi => Arc::new(MultiProducerSequencer::new(CAPACITY, wait_strategy).unwrap()),
    }
}

fn assert_producer_stalls_on_slow_consumer(producer_type: ProducerType) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let ring_buffer =
        Arc::new(RingBuffer::new(CAPACITY, DefaultEventFactory::<TestEvent>::new()).unwrap());
    let sequencer = sequencer(producer_type);

    // The handler parks on the first event until released.
    let release = Arc::new(AtomicBool::new(false));
    let release_clone = Arc::clone(&release);
    let violations = Arc::new(AtomicI64::new(0));
    let violations_clone = Arc::clone(&violations);

    let processor = BatchEventProcessor::new(
        Arc::clone(&ring_buffer),
        Arc::new(sequencer.new_barrier(vec![])),
        ClosureEventHandler::new(move |event: &mut TestEvent, sequence, _| {
            if event.value != sequence {
                violations_clone.fetch_add(1, Ordering::Relaxed);
            }
            while !release_clone.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(1));
            }
        }),
    );
    let consumer_sequence = Arc::clone(processor.sequence());
    sequencer.set_gating_sequences(vec![Arc::clone(&consumer_sequence)]);
    let running = processor.spawn(ThreadBuilder::new()).unwrap();

    let published = Arc::new(AtomicI64::new(-1));
    let published_clone = Arc::clone(&published);
    let publisher = EventPublisher::new(Arc::clone(&ring_buffer), Arc::clone(&sequencer));
    let producer = thread::spawn(move || {
        for _ in 0..(CAPACITY as i64 * 2) {
            let sequence = publisher.publish_with(|event, seq| event.value = seq).unwrap();
            published_clone.store(sequence, Ordering::Release);
        }
    });

    // A full buffer's worth goes through, then the next claim must wait.
    wait_until(|| published.load(Ordering::Acquire) == CAPACITY as i64 - 1);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(published.load(Ordering::Acquire), CAPACITY as i64 - 1);
    assert_eq!(consumer_sequence.get(), -1);

    release.store(true, Ordering::Release);
    producer.join().unwrap();

    let last = CAPACITY as i64 * 2 - 1;
    wait_until(|| consumer_sequence.get() == last);
    running.halt_and_join().unwrap();

    assert_eq!(violations.load(Ordering::Relaxed), 0);
}

#[test]
fn test_single_producer_blocks_until_consumer_advances() {
    assert_producer_stalls_on_slow_consumer(ProducerType::Single);
}

#[test]
fn test_multi_producer_blocks_until_consumer_advances() {
    assert_producer_stalls_on_slow_consumer(ProducerType::Multi);
}

#[test]
fn test_claim_never_passes_gating_minus_capacity() {
    let sequencer = sequencer(ProducerType::Single);
    let slow = Arc::new(seqring::Sequence::default());
    let fast = Arc::new(seqring::Sequence::default());
    sequencer.set_gating_sequences(vec![Arc::clone(&slow), Arc::clone(&fast)]);

    for _ in 0..CAPACITY {
        let sequence = sequencer.next().unwrap();
        sequencer.publish(sequence);
    }
    fast.set(CAPACITY as i64 - 1);

    // The fast consumer is done, but the slow one still holds slot 0.
    assert!(!sequencer.has_available_capacity(1));
    assert_eq!(sequencer.remaining_capacity(), 0);

    slow.set(2);
    assert!(sequencer.has_available_capacity(3));
    assert!(!sequencer.has_available_capacity(4));

    let high = sequencer.claim(3).unwrap();
    assert_eq!(high, CAPACITY as i64 + 2);
    assert!(high - CAPACITY as i64 <= slow.get());
}
