//! Backend seam: the per-device command-dispatch interface and its streams.

use crate::Result;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique stream identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    pub fn next() -> Self {
        StreamId(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered command queue on a device.
pub trait Stream: Send + Sync {
    fn id(&self) -> StreamId;

    /// False once the stream has failed and can no longer accept work.
    fn ok(&self) -> bool {
        true
    }

    /// Blocks the calling thread until all work queued so far has completed.
    fn block_host_until_done(&self) -> Result<()>;
}

/// The command-dispatch interface of one physical device.
pub trait StreamExecutor: Send + Sync {
    type Stream: Stream;
    type Event: Send;

    fn device_ordinal(&self) -> i32;

    fn create_stream(&self) -> Result<Self::Stream>;

    fn create_event(&self) -> Result<Self::Event>;

    /// Enqueues `event` on `stream` so that it is reached once all work
    /// currently queued on the stream has completed.
    fn record_event(&self, stream: &Self::Stream, event: &mut Self::Event) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_ids_are_unique_and_increasing() {
        let a = StreamId::next();
        let b = StreamId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
