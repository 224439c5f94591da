//! Single-writer durability worker
//!
//! All mutations funnel through one background thread that applies
//! [`WriteBatch`]es to the backing store in submission order. Submitters
//! block on an [`AckHandle`] until their batch is durable, so a
//! successful write operation implies persistence. Batches are atomic
//! individually; there is no ordering promise across batches beyond
//! FIFO submission.

use basalt_core::batch::WriteBatch;
use basalt_core::context::OpContext;
use basalt_core::error::{Error, Result};
use basalt_core::traits::Store;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Poll interval while waiting for an acknowledgement.
const ACK_TICK: Duration = Duration::from_millis(10);

struct AckSlot {
    done: Mutex<Option<Result<()>>>,
    cond: Condvar,
}

/// Handle a submitter blocks on until its batch is persisted.
pub struct AckHandle {
    slot: Arc<AckSlot>,
}

impl AckHandle {
    /// Wait for the batch to be applied. Observes cancellation; a
    /// cancelled wait does not undo the submitted batch.
    pub fn wait(&self, ctx: &OpContext) -> Result<()> {
        let mut done = self.slot.done.lock();
        loop {
            if let Some(result) = done.take() {
                return result;
            }
            self.slot.cond.wait_for(&mut done, ACK_TICK);
            if ctx.is_cancelled() && done.is_none() {
                return Err(Error::Cancelled);
            }
        }
    }
}

struct Pending {
    batch: WriteBatch,
    ack: Arc<AckSlot>,
}

struct WorkerShared {
    queue: Mutex<VecDeque<Pending>>,
    wake: Condvar,
    shutdown: AtomicBool,
}

/// The background write worker.
pub struct WriteWorker {
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

impl WriteWorker {
    /// Spawn the worker thread against `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        let shared = Arc::new(WorkerShared {
            queue: Mutex::new(VecDeque::new()),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("basalt-writer".to_string())
            .spawn(move || worker_loop(&worker_shared, store.as_ref()))
            .expect("failed to spawn write worker thread");
        WriteWorker {
            shared,
            handle: Some(handle),
        }
    }

    /// Enqueue a batch. The returned handle resolves once the store has
    /// acknowledged the write.
    pub fn submit(&self, batch: WriteBatch) -> AckHandle {
        let slot = Arc::new(AckSlot {
            done: Mutex::new(None),
            cond: Condvar::new(),
        });
        {
            let mut queue = self.shared.queue.lock();
            queue.push_back(Pending {
                batch,
                ack: Arc::clone(&slot),
            });
        }
        self.shared.wake.notify_one();
        AckHandle { slot }
    }
}

impl Drop for WriteWorker {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: &WorkerShared, store: &dyn Store) {
    loop {
        let pending = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(p) = queue.pop_front() {
                    break Some(p);
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    break None;
                }
                shared.wake.wait(&mut queue);
            }
        };
        let Some(Pending { batch, ack }) = pending else {
            return;
        };
        let result = store.write(batch);
        if let Err(e) = &result {
            tracing::error!(error = %e, "backing store rejected write batch");
        }
        let mut done = ack.done.lock();
        *done = Some(result);
        drop(done);
        ack.cond.notify_all();
    }
}
