//! Collector scheduling and write isolation
//!
//! These tests run in real time with short intervals, since sampling goes
//! through the blocking thread pool.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use guardia_collector::RegisteredTarget;
use guardia_collector::actors::collector::{CollectError, CollectorHandle};
use guardia_collector::actors::messages::ActorState;
use guardia_collector::gateway::MetricGateway;
use guardia_collector::monitors::system::SampleError;
use guardia_collector::storage::MetricName;
use guardia_collector::storage::memory::MemoryBackend;
use tokio_util::sync::CancellationToken;

use crate::helpers::{
    FailingSource, FlakyBackend, MemoryFailingSource, StaticSource, create_test_target,
};

fn registered(store_id: i64) -> RegisteredTarget {
    RegisteredTarget {
        target: create_test_target("web"),
        store_id,
    }
}

#[tokio::test]
async fn test_tick_fidelity() {
    let backend = Arc::new(MemoryBackend::new());
    let source = Arc::new(StaticSource::new(40.0, 2048));
    let cancel = CancellationToken::new();

    let handle = CollectorHandle::spawn(
        registered(7),
        MetricGateway::new(backend.clone()),
        source.clone(),
        Duration::from_millis(100),
        &cancel,
    );

    // ticks at 100, 200, 300, 400, 500ms
    tokio::time::sleep(Duration::from_millis(550)).await;
    cancel.cancel();
    handle.join().await.unwrap();

    let samples = backend.samples_for(7).await;
    let cycles = samples.len() / 2;
    assert_eq!(samples.len() % 2, 0, "every cycle writes exactly two samples");
    assert!((4..=6).contains(&cycles), "expected 5 ± 1 cycles, got {cycles}");
    assert_eq!(cycles, source.sample_count());

    for pair in samples.chunks(2) {
        assert_eq!(pair[0].metric_name, MetricName::CpuPercent);
        assert_eq!(pair[0].value, 40.0);
        assert_eq!(pair[1].metric_name, MetricName::MemoryMb);
        assert_eq!(pair[1].value, 2048.0);
        assert_eq!(pair[0].timestamp, pair[1].timestamp);
    }

    let timestamps: Vec<_> = samples.chunks(2).map(|pair| pair[0].timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_sample_failure_writes_nothing() {
    let backend = Arc::new(MemoryBackend::new());
    let cancel = CancellationToken::new();

    let handle = CollectorHandle::spawn(
        registered(1),
        MetricGateway::new(backend.clone()),
        Arc::new(FailingSource),
        Duration::from_millis(50),
        &cancel,
    );

    assert_matches!(handle.collect_now().await, Err(CollectError::Sample(_)));

    // failing ticks do not stop the collector
    tokio::time::sleep(Duration::from_millis(180)).await;
    assert_eq!(handle.state(), ActorState::Running);
    assert!(backend.samples().await.is_empty());

    handle.stop();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_memory_failure_after_cpu_read_writes_nothing() {
    let backend = Arc::new(MemoryBackend::new());
    let source = Arc::new(MemoryFailingSource::new());
    let cancel = CancellationToken::new();

    let handle = CollectorHandle::spawn(
        registered(4),
        MetricGateway::new(backend.clone()),
        source.clone(),
        Duration::from_millis(50),
        &cancel,
    );

    let err = handle.collect_now().await.unwrap_err();
    assert_matches!(err, CollectError::Sample(SampleError::Memory(_)));

    tokio::time::sleep(Duration::from_millis(180)).await;
    assert!(source.cpu_reads.load(Ordering::SeqCst) >= 2, "ticks kept sampling");
    assert_eq!(handle.state(), ActorState::Running);
    assert!(
        backend.samples().await.is_empty(),
        "the CPU value must not be written on its own"
    );

    handle.stop();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_failed_write_does_not_block_the_other() {
    let backend = Arc::new(FlakyBackend::new(MetricName::CpuPercent));
    let cancel = CancellationToken::new();

    let handle = CollectorHandle::spawn(
        registered(3),
        MetricGateway::new(backend.clone()),
        Arc::new(StaticSource::new(10.0, 64)),
        Duration::from_secs(60),
        &cancel,
    );

    let err = handle.collect_now().await.unwrap_err();
    let failed = assert_matches!(err, CollectError::PartialWrite(failed) => failed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].metric_name, MetricName::CpuPercent);
    assert_eq!(failed[0].object_id, 3);

    let stored = backend.inner.samples_for(3).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].metric_name, MetricName::MemoryMb);
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 2, "no in-cycle retry");

    cancel.cancel();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_collectors_are_independent() {
    let backend = Arc::new(MemoryBackend::new());
    let cancel = CancellationToken::new();
    let gateway = MetricGateway::new(backend.clone());

    let healthy = CollectorHandle::spawn(
        registered(1),
        gateway.clone(),
        Arc::new(StaticSource::new(5.0, 128)),
        Duration::from_secs(60),
        &cancel,
    );
    let broken = CollectorHandle::spawn(
        registered(2),
        gateway,
        Arc::new(FailingSource),
        Duration::from_secs(60),
        &cancel,
    );

    assert!(broken.collect_now().await.is_err());
    healthy.collect_now().await.unwrap();

    assert_eq!(backend.samples_for(1).await.len(), 2);
    assert!(backend.samples_for(2).await.is_empty());

    cancel.cancel();
    healthy.join().await.unwrap();
    broken.join().await.unwrap();
}
