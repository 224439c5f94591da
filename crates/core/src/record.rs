//! The mixed record: one flat value per user key
//!
//! The backing store keeps a single record per user key in the latest
//! namespace. That record co-locates the current lock (if any) and the
//! latest committed value (if any). Superseded values move to old-version
//! key space as bare [`ValueRecord`] payloads.
//!
//! # Format
//!
//! ```text
//! Mixed Layout:
//! ┌───────────────┬──────────────────────┬──────────────────────────┐
//! │ Flags (1 byte)│ Lock (if LOCK_FLAG)  │ Value (if VALUE_FLAG)    │
//! └───────────────┴──────────────────────┴──────────────────────────┘
//!
//! Lock Layout:
//! ┌────┬──────────┬─────────┬─────────────┬─────────────┬──────────────┐
//! │ Op │ StartTs  │ TtlMs   │ RollbackTs  │ PrimaryLen  │ Primary      │
//! │ u8 │ u64 BE   │ u64 BE  │ u64 BE      │ u32 BE      │ bytes        │
//! ├────┴──────────┴─────────┴─────────────┴─────────────┴──────────────┤
//! │ HasValue (u8) │ ValueLen (u32 BE, if HasValue) │ Value bytes       │
//! └───────────────────────────────────────────────────────────────────┘
//!
//! ValueRecord Layout:
//! ┌──────┬──────────┬───────────┬─────────────┬───────────────────────┐
//! │ Kind │ StartTs  │ CommitTs  │ BytesLen    │ Bytes                 │
//! │ u8   │ u64 BE   │ u64 BE    │ u32 BE      │ bytes                 │
//! └──────┴──────────┴───────────┴─────────────┴───────────────────────┘
//! ```
//!
//! The flag byte is mirrored into the backing store's `user_meta` so GC
//! and scans can classify records without a full decode. Old-namespace
//! records instead carry the reserved marker [`OLD_META`], which the flag
//! byte can never reach.

use crate::error::{Error, Result};
use crate::ts::Ts;
use byteorder::{BigEndian, ByteOrder};

/// Flag bit: the record holds a lock.
pub const LOCK_FLAG: u8 = 0b001;
/// Flag bit: the record holds a latest committed value.
pub const VALUE_FLAG: u8 = 0b010;
/// Flag bit: the latest committed value is a tombstone.
pub const DEL_FLAG: u8 = 0b100;

/// `user_meta` marker for old-version namespace records.
pub const OLD_META: u8 = 0xFF;

/// The kind of operation a lock was prewritten for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOp {
    /// Write a value on commit.
    Put,
    /// Write a tombstone on commit.
    Del,
    /// Read-only lock; commit drops it without touching the value.
    Lock,
    /// Rollback marker left behind to fence late prewrites.
    Rollback,
}

impl LockOp {
    fn to_byte(self) -> u8 {
        match self {
            LockOp::Put => 1,
            LockOp::Del => 2,
            LockOp::Lock => 3,
            LockOp::Rollback => 4,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(LockOp::Put),
            2 => Ok(LockOp::Del),
            3 => Ok(LockOp::Lock),
            4 => Ok(LockOp::Rollback),
            other => Err(Error::codec(format!("invalid lock op byte {other}"))),
        }
    }

    /// True for ops that block readers (`Put`, `Del`).
    pub fn blocks_reads(self) -> bool {
        matches!(self, LockOp::Put | LockOp::Del)
    }
}

/// Whether a committed version stores data or a tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A committed value.
    Put,
    /// A committed delete.
    Delete,
}

impl ValueKind {
    fn to_byte(self) -> u8 {
        match self {
            ValueKind::Put => 1,
            ValueKind::Delete => 2,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(ValueKind::Put),
            2 => Ok(ValueKind::Delete),
            other => Err(Error::codec(format!("invalid value kind byte {other}"))),
        }
    }
}

/// A transaction lock embedded in a mixed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    /// Identity of the owning transaction.
    pub start_ts: Ts,
    /// The transaction's primary key, used for resolution.
    pub primary: Vec<u8>,
    /// The value to commit (`Put`/`Insert` prewrite); `None` for `Del`,
    /// `Lock` and `Rollback`.
    pub value: Option<Vec<u8>>,
    /// What the lock will do on commit.
    pub op: LockOp,
    /// Lock lease in milliseconds, measured against physical timestamps.
    pub ttl_ms: u64,
    /// Piggy-backed rollback from a newer transaction; 0 when unset.
    pub rollback_ts: Ts,
}

impl Lock {
    /// A standalone rollback marker fencing `start_ts`.
    pub fn rollback_marker(start_ts: Ts) -> Self {
        Lock {
            start_ts,
            primary: Vec::new(),
            value: None,
            op: LockOp::Rollback,
            ttl_ms: 0,
            rollback_ts: 0,
        }
    }
}

/// A committed version.
///
/// In the latest namespace this sits inside [`Mixed`]; in old-version
/// space it is the whole payload and `commit_ts` equals the timestamp
/// recovered from the key suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    /// Tombstone or data.
    pub kind: ValueKind,
    /// `start_ts` of the writing transaction.
    pub start_ts: Ts,
    /// Timestamp at which this version became visible.
    pub commit_ts: Ts,
    /// The committed bytes; empty for tombstones.
    pub bytes: Vec<u8>,
}

impl ValueRecord {
    /// Encode as an old-version payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(21 + self.bytes.len());
        write_value(&mut buf, self);
        buf
    }

    /// Decode an old-version payload.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let mut cur = raw;
        let v = read_value(&mut cur)?;
        if !cur.is_empty() {
            return Err(Error::codec("trailing bytes after value record"));
        }
        Ok(v)
    }
}

/// The latest-namespace record for one user key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mixed {
    /// Current lock, at most one per key.
    pub lock: Option<Lock>,
    /// Latest committed value.
    pub value: Option<ValueRecord>,
}

impl Mixed {
    /// An empty record (nothing committed, nothing locked).
    pub fn new() -> Self {
        Mixed::default()
    }

    /// True when the record carries neither lock nor value and should be
    /// deleted rather than written back.
    pub fn is_empty(&self) -> bool {
        self.lock.is_none() && self.value.is_none()
    }

    /// The flag byte, also used as the record's `user_meta`.
    pub fn user_meta(&self) -> u8 {
        let mut flags = 0;
        if self.lock.is_some() {
            flags |= LOCK_FLAG;
        }
        if let Some(v) = &self.value {
            flags |= VALUE_FLAG;
            if v.kind == ValueKind::Delete {
                flags |= DEL_FLAG;
            }
        }
        flags
    }

    /// Encode to the on-disk form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.push(self.user_meta());
        if let Some(lock) = &self.lock {
            buf.push(lock.op.to_byte());
            write_u64(&mut buf, lock.start_ts);
            write_u64(&mut buf, lock.ttl_ms);
            write_u64(&mut buf, lock.rollback_ts);
            write_bytes(&mut buf, &lock.primary);
            match &lock.value {
                Some(v) => {
                    buf.push(1);
                    write_bytes(&mut buf, v);
                }
                None => buf.push(0),
            }
        }
        if let Some(value) = &self.value {
            write_value(&mut buf, value);
        }
        buf
    }

    /// Decode from the on-disk form.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let mut cur = raw;
        let flags = read_u8(&mut cur)?;
        let mut mixed = Mixed::new();
        if flags & LOCK_FLAG != 0 {
            let op = LockOp::from_byte(read_u8(&mut cur)?)?;
            let start_ts = read_u64(&mut cur)?;
            let ttl_ms = read_u64(&mut cur)?;
            let rollback_ts = read_u64(&mut cur)?;
            let primary = read_bytes(&mut cur)?;
            let value = match read_u8(&mut cur)? {
                0 => None,
                1 => Some(read_bytes(&mut cur)?),
                other => {
                    return Err(Error::codec(format!("invalid lock value marker {other}")));
                }
            };
            mixed.lock = Some(Lock {
                start_ts,
                primary,
                value,
                op,
                ttl_ms,
                rollback_ts,
            });
        }
        if flags & VALUE_FLAG != 0 {
            let value = read_value(&mut cur)?;
            let expect_del = flags & DEL_FLAG != 0;
            if expect_del != (value.kind == ValueKind::Delete) {
                return Err(Error::codec("DEL flag disagrees with value kind"));
            }
            mixed.value = Some(value);
        } else if flags & DEL_FLAG != 0 {
            return Err(Error::codec("DEL flag without value"));
        }
        if !cur.is_empty() {
            return Err(Error::codec("trailing bytes after mixed record"));
        }
        Ok(mixed)
    }
}

fn write_u64(buf: &mut Vec<u8>, v: u64) {
    let mut tmp = [0u8; 8];
    BigEndian::write_u64(&mut tmp, v);
    buf.extend_from_slice(&tmp);
}

fn write_bytes(buf: &mut Vec<u8>, b: &[u8]) {
    let mut tmp = [0u8; 4];
    BigEndian::write_u32(&mut tmp, b.len() as u32);
    buf.extend_from_slice(&tmp);
    buf.extend_from_slice(b);
}

fn write_value(buf: &mut Vec<u8>, v: &ValueRecord) {
    buf.push(v.kind.to_byte());
    write_u64(buf, v.start_ts);
    write_u64(buf, v.commit_ts);
    write_bytes(buf, &v.bytes);
}

fn read_u8(cur: &mut &[u8]) -> Result<u8> {
    if cur.is_empty() {
        return Err(Error::codec("unexpected end of record"));
    }
    let b = cur[0];
    *cur = &cur[1..];
    Ok(b)
}

fn read_u64(cur: &mut &[u8]) -> Result<u64> {
    if cur.len() < 8 {
        return Err(Error::codec("unexpected end of record"));
    }
    let v = BigEndian::read_u64(&cur[..8]);
    *cur = &cur[8..];
    Ok(v)
}

fn read_bytes(cur: &mut &[u8]) -> Result<Vec<u8>> {
    if cur.len() < 4 {
        return Err(Error::codec("unexpected end of record"));
    }
    let len = BigEndian::read_u32(&cur[..4]) as usize;
    *cur = &cur[4..];
    if cur.len() < len {
        return Err(Error::codec("length prefix exceeds record"));
    }
    let b = cur[..len].to_vec();
    *cur = &cur[len..];
    Ok(b)
}

fn read_value(cur: &mut &[u8]) -> Result<ValueRecord> {
    let kind = ValueKind::from_byte(read_u8(cur)?)?;
    let start_ts = read_u64(cur)?;
    let commit_ts = read_u64(cur)?;
    let bytes = read_bytes(cur)?;
    Ok(ValueRecord {
        kind,
        start_ts,
        commit_ts,
        bytes,
    })
}
