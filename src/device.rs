//! Identity-bearing handle over one accelerator device.

use crate::allocation::AllocationModel;
use crate::event_pool::EventPool;
use crate::executor::StreamExecutor;
use crate::state::DeviceState;
use crate::Result;

/// Wrapper around a single device.
///
/// Owns the device's [`DeviceState`] and borrows the executor and client it
/// was built from. Every accessor except [`DeviceHandle::id`] and
/// [`DeviceHandle::client`] delegates to the owned state.
pub struct DeviceHandle<'a, E: StreamExecutor, C: ?Sized> {
    id: i32,
    state: DeviceState<'a, E, C>,
    client: &'a C,
}

impl<'a, E: StreamExecutor, C: ?Sized> DeviceHandle<'a, E, C> {
    /// Builds the device state eagerly. Errors from stream creation are
    /// returned as the executor reported them.
    pub fn new(
        id: i32,
        executor: &'a E,
        client: &'a C,
        allocation_model: AllocationModel,
        asynchronous: bool,
        allow_event_reuse: bool,
    ) -> Result<Self> {
        let state = DeviceState::new(
            executor,
            client,
            allocation_model,
            asynchronous,
            allow_event_reuse,
        )?;
        Ok(DeviceHandle { id, state, client })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Returns this device's device ordinal.
    pub fn device_ordinal(&self) -> i32 {
        self.state.executor().device_ordinal()
    }

    /// Returns this device's stream executor.
    pub fn executor(&self) -> &'a E {
        self.state.executor()
    }

    pub fn client(&self) -> &'a C {
        self.client
    }

    pub fn event_pool(&self) -> &EventPool<E::Event> {
        self.state.event_pool()
    }

    /// Returns this device's compute stream. Compute streams are used for
    /// running computations.
    pub fn compute_stream(&self) -> &E::Stream {
        self.state.compute_stream()
    }

    /// Returns this device's host-to-device stream.
    pub fn host_to_device_stream(&self) -> &E::Stream {
        self.state.host_to_device_stream()
    }

    /// Returns a device-to-host stream. Successive calls may return
    /// different streams.
    pub fn device_to_host_stream(&self) -> &E::Stream {
        self.state.device_to_host_stream()
    }

    /// Returns a device-to-device stream. Successive calls may return
    /// different streams.
    pub fn device_to_device_stream(&self) -> &E::Stream {
        self.state.device_to_device_stream()
    }

    /// Returns a stream from a pool. The stream is guaranteed not to have any
    /// currently outstanding work at its tail.
    pub fn borrow_stream_from_pool(&self) -> Result<E::Stream> {
        self.state.borrow_stream_from_pool()
    }

    pub fn allocation_model(&self) -> AllocationModel {
        self.state.allocation_model()
    }

    /// Returns a stream to the pool. The caller must ensure the stream does
    /// not have any outstanding work at its tail.
    pub fn return_stream_to_pool(&self, stream: E::Stream) {
        self.state.return_stream_to_pool(stream)
    }

    pub fn asynchronous(&self) -> bool {
        self.state.asynchronous()
    }

    pub fn synchronous_deallocation(&self) -> bool {
        self.state.synchronous_deallocation()
    }

    pub fn block_if_synchronous(&self, stream: &E::Stream) -> Result<()> {
        self.state.block_if_synchronous(stream)
    }

    pub fn synchronize_all_activity(&self) -> Result<()> {
        self.state.synchronize_all_activity()
    }
}
