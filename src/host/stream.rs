use crate::executor::{Stream, StreamId};
use crate::{Error, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// In-order command queue executed by a dedicated worker thread.
pub struct HostStream {
    id: StreamId,
    sender: Option<mpsc::Sender<Job>>,
    pending: Arc<AtomicUsize>,
    failed: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl HostStream {
    pub(crate) fn new(device_ordinal: i32) -> Result<Self> {
        let id = StreamId::next();
        let (sender, receiver) = mpsc::channel::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicBool::new(false));

        let worker_pending = Arc::clone(&pending);
        let worker_failed = Arc::clone(&failed);
        let worker = thread::Builder::new()
            .name(format!("host{}-stream{}", device_ordinal, id))
            .spawn(move || {
                for job in receiver {
                    if worker_failed.load(Ordering::Acquire) {
                        // Uncount before dropping; barriers observe the drop.
                        worker_pending.fetch_sub(1, Ordering::AcqRel);
                        drop(job);
                        continue;
                    }
                    let outcome = panic::catch_unwind(AssertUnwindSafe(job));
                    if outcome.is_err() {
                        log::error!("Job panicked on host stream {}, stream is now unusable", id);
                        worker_failed.store(true, Ordering::Release);
                    }
                    worker_pending.fetch_sub(1, Ordering::AcqRel);
                }
            })
            .map_err(|e| Error::Backend(format!("Failed to spawn stream worker: {}", e)))?;

        log::trace!("Created host stream {} on device {}", id, device_ordinal);
        Ok(HostStream {
            id,
            sender: Some(sender),
            pending,
            failed,
            worker: Some(worker),
        })
    }

    /// Appends `job` to the stream. Jobs run one at a time in enqueue order.
    pub fn enqueue<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or_else(|| self.failed("stream closed"))?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(Box::new(job)).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(self.failed("worker exited"));
        }
        Ok(())
    }

    /// Number of jobs queued or running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn failed(&self, msg: &str) -> Error {
        Error::StreamFailed {
            stream: self.id.get(),
            msg: msg.to_string(),
        }
    }
}

impl Stream for HostStream {
    fn id(&self) -> StreamId {
        self.id
    }

    fn ok(&self) -> bool {
        !self.failed.load(Ordering::Acquire)
    }

    fn block_host_until_done(&self) -> Result<()> {
        let (done_tx, done_rx) = mpsc::channel();
        self.enqueue(move || {
            let _ = done_tx.send(());
        })?;
        done_rx
            .recv()
            .map_err(|_| self.failed("worker exited before reaching barrier"))
    }
}

impl Drop for HostStream {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
