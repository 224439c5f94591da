//! Hybrid timestamps
//!
//! Timestamps are 64-bit: the high 46 bits carry a physical wall-clock
//! component (milliseconds), the low 18 bits a logical counter. A
//! transaction's identity is its `start_ts`; visibility is decided by
//! `commit_ts`. Both are allocated by an external oracle and arrive
//! pre-composed.

/// A transaction timestamp.
pub type Ts = u64;

/// Number of low bits reserved for the logical component.
pub const TS_LOGICAL_BITS: u32 = 18;

/// Sentinel timestamp marking lock records in old-version key space.
///
/// `encode_old_key(key, LOCK_VER)` sorts before every real version of
/// `key` because the suffix stores the complement of the timestamp.
pub const LOCK_VER: Ts = u64::MAX;

/// Extract the physical (wall-clock, milliseconds) component.
#[inline]
pub fn physical(ts: Ts) -> u64 {
    ts >> TS_LOGICAL_BITS
}

/// Compose a timestamp from physical and logical parts.
#[inline]
pub fn compose_ts(physical_ms: u64, logical: u64) -> Ts {
    (physical_ms << TS_LOGICAL_BITS) | (logical & ((1 << TS_LOGICAL_BITS) - 1))
}

/// True when a lock has outlived its TTL as observed at `now_ts`.
///
/// TTL is compared on the physical component only; the logical counter
/// carries no duration information.
#[inline]
pub fn ttl_expired(lock_start_ts: Ts, ttl_ms: u64, now_ts: Ts) -> bool {
    physical(lock_start_ts) + ttl_ms < physical(now_ts)
}
