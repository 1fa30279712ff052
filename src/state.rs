//! Per-device stream and event bookkeeping.

use crate::allocation::AllocationModel;
use crate::event_pool::EventPool;
use crate::executor::{Stream, StreamExecutor};
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

const NUM_DEVICE_TO_HOST_STREAMS: usize = 4;
const NUM_DEVICE_TO_DEVICE_STREAMS: usize = 4;

/// Streams, pools and allocation policy of one device.
///
/// Borrows its executor and client; both must outlive the state.
pub struct DeviceState<'a, E: StreamExecutor, C: ?Sized> {
    executor: &'a E,
    client: &'a C,
    allocation_model: AllocationModel,
    asynchronous: bool,
    event_pool: EventPool<E::Event>,
    compute_stream: E::Stream,
    host_to_device_stream: E::Stream,
    device_to_host_streams: Vec<E::Stream>,
    device_to_device_streams: Vec<E::Stream>,
    next_device_to_host_stream: AtomicUsize,
    next_device_to_device_stream: AtomicUsize,
    usage_stream_pool: Mutex<Vec<E::Stream>>,
}

fn create_streams<E: StreamExecutor>(executor: &E, count: usize) -> Result<Vec<E::Stream>> {
    (0..count).map(|_| executor.create_stream()).collect()
}

fn next_index(cursor: &AtomicUsize, len: usize) -> usize {
    cursor.fetch_add(1, Ordering::Relaxed) % len
}

impl<'a, E: StreamExecutor, C: ?Sized> DeviceState<'a, E, C> {
    pub fn new(
        executor: &'a E,
        client: &'a C,
        allocation_model: AllocationModel,
        asynchronous: bool,
        allow_event_reuse: bool,
    ) -> Result<Self> {
        let ordinal = executor.device_ordinal();
        log::debug!(
            "Creating device state for device {} (allocation model: {}, asynchronous: {}, event reuse: {})",
            ordinal,
            allocation_model,
            asynchronous,
            allow_event_reuse
        );

        let compute_stream = executor.create_stream()?;
        let host_to_device_stream = executor.create_stream()?;
        let device_to_host_streams = create_streams(executor, NUM_DEVICE_TO_HOST_STREAMS)?;
        let device_to_device_streams = create_streams(executor, NUM_DEVICE_TO_DEVICE_STREAMS)?;

        Ok(DeviceState {
            executor,
            client,
            allocation_model,
            asynchronous,
            event_pool: EventPool::new(allow_event_reuse),
            compute_stream,
            host_to_device_stream,
            device_to_host_streams,
            device_to_device_streams,
            next_device_to_host_stream: AtomicUsize::new(0),
            next_device_to_device_stream: AtomicUsize::new(0),
            usage_stream_pool: Mutex::new(Vec::new()),
        })
    }

    pub fn executor(&self) -> &'a E {
        self.executor
    }

    pub fn client(&self) -> &'a C {
        self.client
    }

    pub fn allocation_model(&self) -> AllocationModel {
        self.allocation_model
    }

    pub fn synchronous_deallocation(&self) -> bool {
        self.allocation_model.synchronous_deallocation()
    }

    pub fn asynchronous(&self) -> bool {
        self.asynchronous
    }

    pub fn event_pool(&self) -> &EventPool<E::Event> {
        &self.event_pool
    }

    pub fn compute_stream(&self) -> &E::Stream {
        &self.compute_stream
    }

    pub fn host_to_device_stream(&self) -> &E::Stream {
        &self.host_to_device_stream
    }

    /// Next device-to-host stream, round-robin over a fixed set.
    pub fn device_to_host_stream(&self) -> &E::Stream {
        let i = next_index(&self.next_device_to_host_stream, self.device_to_host_streams.len());
        &self.device_to_host_streams[i]
    }

    /// Next device-to-device stream, round-robin over a fixed set.
    pub fn device_to_device_stream(&self) -> &E::Stream {
        let i = next_index(
            &self.next_device_to_device_stream,
            self.device_to_device_streams.len(),
        );
        &self.device_to_device_streams[i]
    }

    /// Hands out an idle stream, creating one if the pool is empty.
    pub fn borrow_stream_from_pool(&self) -> Result<E::Stream> {
        if let Some(stream) = self.pool().pop() {
            log::trace!("Reusing pooled stream {}", stream.id());
            return Ok(stream);
        }
        let stream = self.executor.create_stream()?;
        log::trace!(
            "Stream pool empty on device {}, created stream {}",
            self.executor.device_ordinal(),
            stream.id()
        );
        Ok(stream)
    }

    /// Puts `stream` back into the pool. The caller must ensure it has no
    /// outstanding work.
    pub fn return_stream_to_pool(&self, stream: E::Stream) {
        if !stream.ok() {
            log::warn!(
                "Dropping failed stream {} instead of returning it to the pool",
                stream.id()
            );
            return;
        }
        self.pool().push(stream);
    }

    pub fn pooled_streams(&self) -> usize {
        self.pool().len()
    }

    /// Blocks on `stream` when the device runs synchronously.
    pub fn block_if_synchronous(&self, stream: &E::Stream) -> Result<()> {
        if self.asynchronous {
            return Ok(());
        }
        stream.block_host_until_done()
    }

    /// Waits for every stream owned by this state. All streams are waited on
    /// even if one fails; the first error is returned.
    pub fn synchronize_all_activity(&self) -> Result<()> {
        let streams = [&self.compute_stream, &self.host_to_device_stream]
            .into_iter()
            .chain(self.device_to_host_streams.iter())
            .chain(self.device_to_device_streams.iter());

        let mut first_error = None;
        for stream in streams {
            if let Err(e) = stream.block_host_until_done() {
                log::error!("Error synchronizing stream {}: {}", stream.id(), e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn pool(&self) -> std::sync::MutexGuard<'_, Vec<E::Stream>> {
        self.usage_stream_pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
