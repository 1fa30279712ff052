//! In-process backend
//!
//! Each device is a set of worker threads on the host; streams are ordered
//! job queues and events are flags set when a stream reaches them. Useful for
//! running the device plumbing without an accelerator present.

mod stream;

pub use stream::HostStream;

use crate::executor::StreamExecutor;
use crate::registry::Platform;
use crate::{Error, Result};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

struct EventState {
    generation: u64,
    ready: bool,
}

/// Completion marker recorded on a [`HostStream`].
///
/// A never-recorded event is ready. Each recording starts a new generation;
/// markers left queued by earlier recordings no longer affect it.
pub struct HostEvent {
    state: Arc<(Mutex<EventState>, Condvar)>,
}

impl Default for HostEvent {
    fn default() -> Self {
        HostEvent {
            state: Arc::new((
                Mutex::new(EventState {
                    generation: 0,
                    ready: true,
                }),
                Condvar::new(),
            )),
        }
    }
}

impl HostEvent {
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    /// Blocks until the stream the event was last recorded on reaches it.
    pub fn wait(&self) {
        let mut state = self.lock();
        while !state.ready {
            state = self
                .state
                .1
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn lock(&self) -> MutexGuard<'_, EventState> {
        self.state.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct HostExecutor {
    ordinal: i32,
}

impl HostExecutor {
    pub fn new(ordinal: i32) -> Self {
        HostExecutor { ordinal }
    }
}

impl StreamExecutor for HostExecutor {
    type Stream = HostStream;
    type Event = HostEvent;

    fn device_ordinal(&self) -> i32 {
        self.ordinal
    }

    fn create_stream(&self) -> Result<HostStream> {
        HostStream::new(self.ordinal)
    }

    fn create_event(&self) -> Result<HostEvent> {
        Ok(HostEvent::default())
    }

    fn record_event(&self, stream: &HostStream, event: &mut HostEvent) -> Result<()> {
        let generation = {
            let mut state = event.lock();
            state.generation += 1;
            state.ready = false;
            state.generation
        };
        let shared = Arc::clone(&event.state);
        stream.enqueue(move || {
            let (lock, cvar) = &*shared;
            let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
            if state.generation == generation {
                state.ready = true;
                cvar.notify_all();
            }
        })
    }
}

/// A fixed set of host devices.
pub struct HostPlatform {
    executors: Vec<HostExecutor>,
}

impl HostPlatform {
    /// Fails if `device_count` does not fit a device ordinal.
    pub fn new(device_count: usize) -> Result<Self> {
        let count = i32::try_from(device_count).map_err(|_| {
            Error::Backend(format!("Too many host devices requested: {}", device_count))
        })?;
        Ok(HostPlatform {
            executors: (0..count).map(HostExecutor::new).collect(),
        })
    }
}

impl Platform for HostPlatform {
    type Executor = HostExecutor;

    fn name(&self) -> &str {
        "host"
    }

    fn executors(&self) -> &[HostExecutor] {
        &self.executors
    }
}
