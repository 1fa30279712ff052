use accel_device::{
    AllocationModel, DeviceHandle, DeviceOptions, DeviceRegistry, Error, Platform, Result, Stream,
    StreamExecutor, StreamId,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct MockStream {
    id: StreamId,
    healthy: Arc<AtomicBool>,
}

impl Stream for MockStream {
    fn id(&self) -> StreamId {
        self.id
    }

    fn ok(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn block_host_until_done(&self) -> Result<()> {
        Ok(())
    }
}

/// Executor that counts what it creates and can be told to fail.
#[derive(Default)]
struct MockExecutor {
    ordinal: i32,
    streams_created: AtomicUsize,
    events_created: AtomicUsize,
    fail_after: Option<usize>,
}

impl MockExecutor {
    fn with_ordinal(ordinal: i32) -> Self {
        MockExecutor {
            ordinal,
            ..Default::default()
        }
    }
}

impl StreamExecutor for MockExecutor {
    type Stream = MockStream;
    type Event = u32;

    fn device_ordinal(&self) -> i32 {
        self.ordinal
    }

    fn create_stream(&self) -> Result<MockStream> {
        let created = self.streams_created.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| created >= limit) {
            return Err(Error::Backend("out of streams".into()));
        }
        Ok(MockStream {
            id: StreamId::next(),
            healthy: Arc::new(AtomicBool::new(true)),
        })
    }

    fn create_event(&self) -> Result<u32> {
        Ok(self.events_created.fetch_add(1, Ordering::SeqCst) as u32)
    }

    fn record_event(&self, _stream: &MockStream, _event: &mut u32) -> Result<()> {
        Ok(())
    }
}

struct MockClient {
    label: String,
}

struct MockPlatform {
    executors: Vec<MockExecutor>,
}

impl Platform for MockPlatform {
    type Executor = MockExecutor;

    fn name(&self) -> &str {
        "mock"
    }

    fn executors(&self) -> &[MockExecutor] {
        &self.executors
    }
}

fn client() -> MockClient {
    MockClient {
        label: "session".to_string(),
    }
}

#[test]
fn end_to_end_synchronous_device() {
    let executor = MockExecutor::with_ordinal(2);
    let client = client();
    let device = DeviceHandle::new(
        2,
        &executor,
        &client,
        AllocationModel::Synchronous,
        false,
        true,
    )
    .unwrap();

    assert_eq!(device.id(), 2);
    assert_eq!(device.device_ordinal(), 2);
    assert_eq!(device.allocation_model().to_string(), "synchronous");
    assert!(!device.asynchronous());
    assert!(device.synchronous_deallocation());
    assert!(device.event_pool().allow_reuse());
}

#[test]
fn client_and_executor_are_not_copied() {
    let executor = MockExecutor::with_ordinal(5);
    let client = client();
    let device = DeviceHandle::new(
        9,
        &executor,
        &client,
        AllocationModel::Asynchronous,
        true,
        true,
    )
    .unwrap();

    assert!(std::ptr::eq(device.client(), &client));
    assert!(std::ptr::eq(device.executor(), &executor));
    assert_eq!(device.client().label, "session");
    assert_eq!(device.device_ordinal(), executor.device_ordinal());
}

#[test]
fn fixed_and_rotating_streams() {
    let executor = MockExecutor::with_ordinal(0);
    let client = client();
    let device = DeviceHandle::new(
        0,
        &executor,
        &client,
        AllocationModel::ComputeSynchronized,
        true,
        true,
    )
    .unwrap();

    let compute = device.compute_stream().id();
    let h2d = device.host_to_device_stream().id();
    for _ in 0..3 {
        assert_eq!(device.compute_stream().id(), compute);
        assert_eq!(device.host_to_device_stream().id(), h2d);
    }

    let d2h: HashSet<_> = (0..8).map(|_| device.device_to_host_stream().id()).collect();
    let d2d: HashSet<_> = (0..8).map(|_| device.device_to_device_stream().id()).collect();
    assert!(d2h.len() > 1);
    assert!(d2d.len() > 1);
    assert!(!d2h.contains(&compute) && !d2h.contains(&h2d));
    assert!(d2h.is_disjoint(&d2d));
}

#[test]
fn pool_round_trip_returns_same_stream() {
    let executor = MockExecutor::with_ordinal(0);
    let client = client();
    let device = DeviceHandle::new(
        0,
        &executor,
        &client,
        AllocationModel::ComputeSynchronized,
        true,
        true,
    )
    .unwrap();

    let created_before = executor.streams_created.load(Ordering::SeqCst);
    let stream = device.borrow_stream_from_pool().unwrap();
    let id = stream.id();
    assert_eq!(
        executor.streams_created.load(Ordering::SeqCst),
        created_before + 1
    );

    device.return_stream_to_pool(stream);
    let again = device.borrow_stream_from_pool().unwrap();
    assert_eq!(again.id(), id);
    assert_eq!(
        executor.streams_created.load(Ordering::SeqCst),
        created_before + 1
    );
    assert_eq!(device.allocation_model(), AllocationModel::ComputeSynchronized);
}

#[test]
fn failed_stream_is_not_pooled() {
    let executor = MockExecutor::with_ordinal(0);
    let client = client();
    let device = DeviceHandle::new(
        0,
        &executor,
        &client,
        AllocationModel::ComputeSynchronized,
        true,
        true,
    )
    .unwrap();

    let stream = device.borrow_stream_from_pool().unwrap();
    let id = stream.id();
    stream.healthy.store(false, Ordering::SeqCst);
    device.return_stream_to_pool(stream);

    assert_ne!(device.borrow_stream_from_pool().unwrap().id(), id);
}

#[test]
fn executor_failure_propagates_from_constructor() {
    let executor = MockExecutor {
        fail_after: Some(3),
        ..Default::default()
    };
    let client = client();
    let result = DeviceHandle::new(
        0,
        &executor,
        &client,
        AllocationModel::Synchronous,
        false,
        false,
    );

    match result {
        Err(Error::Backend(msg)) => assert_eq!(msg, "out of streams"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("construction should fail"),
    }
}

#[test]
fn event_reuse_follows_constructor_flag() {
    let executor = MockExecutor::with_ordinal(0);
    let client = client();

    let reusing = DeviceHandle::new(
        0,
        &executor,
        &client,
        AllocationModel::Synchronous,
        false,
        true,
    )
    .unwrap();
    for _ in 0..4 {
        let handle = reusing
            .event_pool()
            .then_allocate_and_record_event(reusing.executor(), reusing.compute_stream())
            .unwrap();
        drop(handle);
    }
    assert_eq!(executor.events_created.load(Ordering::SeqCst), 1);

    let fresh = DeviceHandle::new(
        1,
        &executor,
        &client,
        AllocationModel::Synchronous,
        false,
        false,
    )
    .unwrap();
    for _ in 0..4 {
        drop(fresh.event_pool().allocate_event(fresh.executor()).unwrap());
    }
    assert_eq!(executor.events_created.load(Ordering::SeqCst), 5);
}

#[test]
fn registry_builds_handles_over_platform() {
    let platform = MockPlatform {
        executors: (0..3).map(MockExecutor::with_ordinal).collect(),
    };
    let registry = DeviceRegistry::new(&platform, DeviceOptions::default()).unwrap();

    assert_eq!(registry.len(), 3);
    let device = registry.device(2).unwrap();
    assert_eq!(device.device_ordinal(), 2);
    assert!(std::ptr::eq(device.client(), &platform));
    assert_eq!(
        device.allocation_model(),
        DeviceOptions::default().allocation_model
    );
    device.synchronize_all_activity().unwrap();
}

#[test]
fn handle_is_shared_across_threads() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 50;

    let executor = MockExecutor::with_ordinal(0);
    let client = client();
    let device = DeviceHandle::new(
        0,
        &executor,
        &client,
        AllocationModel::ComputeSynchronized,
        true,
        true,
    )
    .unwrap();
    let fixed_streams = executor.streams_created.load(Ordering::SeqCst);

    let per_thread: Vec<(Vec<StreamId>, Vec<u64>)> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let device = &device;
                s.spawn(move || {
                    let mut d2h = Vec::with_capacity(ROUNDS);
                    let mut sequence = Vec::with_capacity(ROUNDS);
                    for _ in 0..ROUNDS {
                        let stream = device.borrow_stream_from_pool().unwrap();
                        device.return_stream_to_pool(stream);

                        d2h.push(device.device_to_host_stream().id());

                        let event = device
                            .event_pool()
                            .then_allocate_and_record_event(
                                device.executor(),
                                device.compute_stream(),
                            )
                            .unwrap();
                        sequence.push(event.sequence_number());
                    }
                    (d2h, sequence)
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    // Every stream the pool ever created is back in it exactly once.
    let pooled = executor.streams_created.load(Ordering::SeqCst) - fixed_streams;
    assert!(pooled >= 1 && pooled <= THREADS);
    let drained: Vec<_> = (0..pooled)
        .map(|_| device.borrow_stream_from_pool().unwrap())
        .collect();
    let ids: HashSet<_> = drained.iter().map(|s| s.id()).collect();
    assert_eq!(ids.len(), pooled);
    assert_eq!(
        executor.streams_created.load(Ordering::SeqCst),
        fixed_streams + pooled
    );

    let d2h: HashSet<_> = per_thread.iter().flat_map(|(ids, _)| ids).collect();
    assert_eq!(d2h.len(), 4);

    let mut all_sequence = Vec::with_capacity(THREADS * ROUNDS);
    for (_, sequence) in &per_thread {
        assert!(sequence.windows(2).all(|w| w[0] < w[1]));
        all_sequence.extend_from_slice(sequence);
    }
    all_sequence.sort_unstable();
    all_sequence.dedup();
    assert_eq!(all_sequence.len(), THREADS * ROUNDS);
}
