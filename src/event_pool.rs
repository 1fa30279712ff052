//! Reusable pool of synchronization events.

use crate::executor::StreamExecutor;
use crate::Result;
use std::sync::{Arc, Mutex, PoisonError};

struct Inner<V> {
    free: Vec<V>,
    next_sequence_number: u64,
}

/// Pool of events shared by every stream of one device.
///
/// When reuse is enabled, events released by dropped [`EventHandle`]s are
/// handed out again by [`EventPool::allocate_event`] instead of asking the
/// executor for new ones.
pub struct EventPool<V> {
    allow_reuse: bool,
    inner: Arc<Mutex<Inner<V>>>,
}

/// An event checked out of an [`EventPool`].
pub struct EventHandle<V> {
    // Present until drop.
    event: Option<V>,
    sequence_number: u64,
    pool: Option<Arc<Mutex<Inner<V>>>>,
}

impl<V> EventHandle<V> {
    /// Position of the recording in the pool's order, zero until recorded.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event(&self) -> &V {
        match &self.event {
            Some(event) => event,
            None => unreachable!("event handle used after drop"),
        }
    }

    fn event_mut(&mut self) -> &mut V {
        match &mut self.event {
            Some(event) => event,
            None => unreachable!("event handle used after drop"),
        }
    }
}

impl<V> Drop for EventHandle<V> {
    fn drop(&mut self) {
        if let (Some(pool), Some(event)) = (self.pool.take(), self.event.take()) {
            pool.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .free
                .push(event);
        }
    }
}

impl<V: Send> EventPool<V> {
    pub fn new(allow_reuse: bool) -> Self {
        EventPool {
            allow_reuse,
            inner: Arc::new(Mutex::new(Inner {
                free: Vec::new(),
                next_sequence_number: 1,
            })),
        }
    }

    pub fn allow_reuse(&self) -> bool {
        self.allow_reuse
    }

    /// Number of released events waiting to be reused.
    pub fn free_events(&self) -> usize {
        self.lock().free.len()
    }

    pub fn allocate_event<E>(&self, executor: &E) -> Result<EventHandle<V>>
    where
        E: StreamExecutor<Event = V>,
    {
        let recycled = if self.allow_reuse {
            self.lock().free.pop()
        } else {
            None
        };
        let event = match recycled {
            Some(event) => event,
            None => {
                log::trace!(
                    "Creating new event for device {}",
                    executor.device_ordinal()
                );
                executor.create_event()?
            }
        };
        Ok(EventHandle {
            event: Some(event),
            sequence_number: 0,
            pool: self.allow_reuse.then(|| Arc::clone(&self.inner)),
        })
    }

    /// Records `handle` on `stream` and stamps it with the next sequence number.
    pub fn then_record_event<E>(
        &self,
        executor: &E,
        stream: &E::Stream,
        handle: &mut EventHandle<V>,
    ) -> Result<()>
    where
        E: StreamExecutor<Event = V>,
    {
        let mut inner = self.lock();
        executor.record_event(stream, handle.event_mut())?;
        handle.sequence_number = inner.next_sequence_number;
        inner.next_sequence_number += 1;
        Ok(())
    }

    pub fn then_allocate_and_record_event<E>(
        &self,
        executor: &E,
        stream: &E::Stream,
    ) -> Result<EventHandle<V>>
    where
        E: StreamExecutor<Event = V>,
    {
        let mut handle = self.allocate_event(executor)?;
        self.then_record_event(executor, stream, &mut handle)?;
        Ok(handle)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
