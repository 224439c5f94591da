//! Hashed key latches with FIFO waiter queues
//!
//! Each slot guards every user key hashing into it. A request latches the
//! whole sorted, deduplicated hash set of its keys or none of it: on the
//! first collision it releases what it already holds and queues on the
//! busy slot. Sorting plus all-or-nothing acquisition rules out deadlock
//! between concurrent multi-key transactions; the per-slot ticket queue
//! keeps wakeups FIFO-fair among waiters.

use basalt_core::context::OpContext;
use basalt_core::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHasher;
use std::collections::VecDeque;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Acquisitions slower than this emit a `tracing::warn!`.
const SLOW_ACQUIRE: Duration = Duration::from_millis(50);

/// Poll interval for cancellation while parked on a slot.
const WAIT_TICK: Duration = Duration::from_millis(10);

/// Hash a user key into latch space.
pub fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(key);
    hasher.finish()
}

#[derive(Default)]
struct SlotState {
    locked: bool,
    queue: VecDeque<u64>,
}

struct Slot {
    state: Mutex<SlotState>,
    available: Condvar,
}

impl Slot {
    fn new() -> Self {
        Slot {
            state: Mutex::new(SlotState::default()),
            available: Condvar::new(),
        }
    }
}

/// Fixed-size latch table. Slot count is rounded up to a power of two.
pub struct Latches {
    slots: Vec<Slot>,
    mask: u64,
    next_ticket: AtomicU64,
}

impl Latches {
    /// Create a table with at least `size` slots.
    pub fn new(size: usize) -> Self {
        let size = size.max(2).next_power_of_two();
        Latches {
            slots: (0..size).map(|_| Slot::new()).collect(),
            mask: size as u64 - 1,
            next_ticket: AtomicU64::new(0),
        }
    }

    fn slot(&self, hash: u64) -> &Slot {
        &self.slots[(hash & self.mask) as usize]
    }

    /// Normalise a hash list for acquisition: sorted and deduplicated by
    /// slot so a batch never latches the same slot twice.
    pub fn normalize(&self, hashes: &mut smallvec::SmallVec<[u64; 8]>) {
        for h in hashes.iter_mut() {
            *h &= self.mask;
        }
        hashes.sort_unstable();
        hashes.dedup();
    }

    /// Latch every slot in `hashes` (already normalised), blocking until
    /// the whole set is held. Returns the number of currently held slots
    /// table-wide, for observability.
    pub fn acquire(&self, hashes: &[u64], ctx: &OpContext) -> Result<usize> {
        let started = Instant::now();
        loop {
            ctx.check()?;
            match self.try_acquire_all(hashes) {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    if elapsed > SLOW_ACQUIRE {
                        tracing::warn!(
                            keys = hashes.len(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            "slow latch acquisition"
                        );
                    }
                    return Ok(self.locked_count());
                }
                Err(busy) => self.wait_turn(busy, ctx)?,
            }
        }
    }

    /// Release every slot in `hashes` and wake their waiters.
    pub fn release(&self, hashes: &[u64]) {
        for &h in hashes {
            let slot = self.slot(h);
            let mut state = slot.state.lock();
            debug_assert!(state.locked, "releasing an unheld latch");
            state.locked = false;
            drop(state);
            slot.available.notify_all();
        }
    }

    /// Number of slots currently held.
    pub fn locked_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state.lock().locked)
            .count()
    }

    /// Latch all slots or none; on failure returns the busy hash.
    fn try_acquire_all(&self, hashes: &[u64]) -> std::result::Result<(), u64> {
        for (i, &h) in hashes.iter().enumerate() {
            let mut state = self.slot(h).state.lock();
            if state.locked {
                drop(state);
                self.release(&hashes[..i]);
                return Err(h);
            }
            state.locked = true;
        }
        Ok(())
    }

    /// Park on `hash`'s queue until our ticket reaches the head and the
    /// slot is free, then return with the slot still unlocked so the
    /// caller can retry the whole batch.
    fn wait_turn(&self, hash: u64, ctx: &OpContext) -> Result<()> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let slot = self.slot(hash);
        let mut state = slot.state.lock();
        state.queue.push_back(ticket);
        loop {
            if !state.locked && state.queue.front() == Some(&ticket) {
                state.queue.pop_front();
                return Ok(());
            }
            slot.available.wait_for(&mut state, WAIT_TICK);
            if ctx.is_cancelled() {
                state.queue.retain(|&t| t != ticket);
                drop(state);
                slot.available.notify_all();
                return Err(Error::Cancelled);
            }
        }
    }
}
