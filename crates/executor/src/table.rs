//! Table and index key layout
//!
//! ```text
//! Record key: 't' | table_id (8 bytes, comparable) | "_r" | handle (8 bytes, comparable)
//! Index key:  't' | table_id (8 bytes, comparable) | "_i" | index_id (8 bytes, comparable)
//!                 | column datums... [ | handle (8 bytes, comparable) ]
//! ```
//!
//! "Comparable" integers are sign-flipped big-endian, so byte order
//! matches numeric order and range scans over handles behave.

use crate::datum::{encode_datum, Datum};
use crate::error::{ExecError, ExecResult};
use byteorder::{BigEndian, ByteOrder};

const TABLE_PREFIX: u8 = b't';
const RECORD_SEP: &[u8] = b"_r";
const INDEX_SEP: &[u8] = b"_i";

const SIGN_MASK: u64 = 0x8000_0000_0000_0000;

/// Length of the fixed prefix of an index key, before the column datums.
pub const INDEX_KEY_PREFIX_LEN: usize = 1 + 8 + 2 + 8;

/// Length of a record key.
pub const ROW_KEY_LEN: usize = 1 + 8 + 2 + 8;

/// Declared output column of a scan.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column id as stored in row payloads.
    pub col_id: i64,
    /// True when this column is the row handle itself (synthesised, not
    /// read from the payload).
    pub pk_handle: bool,
    /// Default value when the payload lacks the column.
    pub default: Option<Datum>,
}

impl ColumnInfo {
    /// A regular payload column.
    pub fn new(col_id: i64) -> Self {
        ColumnInfo {
            col_id,
            pk_handle: false,
            default: None,
        }
    }

    /// The handle column.
    pub fn handle(col_id: i64) -> Self {
        ColumnInfo {
            col_id,
            pk_handle: true,
            default: None,
        }
    }

    /// A payload column with a default.
    pub fn with_default(col_id: i64, default: Datum) -> Self {
        ColumnInfo {
            col_id,
            pk_handle: false,
            default: Some(default),
        }
    }
}

/// Append a sign-flipped big-endian i64.
fn push_comparable_i64(buf: &mut Vec<u8>, v: i64) {
    let mut tmp = [0u8; 8];
    BigEndian::write_u64(&mut tmp, (v as u64) ^ SIGN_MASK);
    buf.extend_from_slice(&tmp);
}

/// Read a sign-flipped big-endian i64.
pub(crate) fn read_comparable_i64(raw: &[u8]) -> ExecResult<i64> {
    if raw.len() < 8 {
        return Err(ExecError::codec("truncated comparable integer"));
    }
    Ok((BigEndian::read_u64(&raw[..8]) ^ SIGN_MASK) as i64)
}

/// The key prefix shared by every record of `table_id`.
pub fn record_prefix(table_id: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(11);
    buf.push(TABLE_PREFIX);
    push_comparable_i64(&mut buf, table_id);
    buf.extend_from_slice(RECORD_SEP);
    buf
}

/// The record key of `(table_id, handle)`.
pub fn encode_row_key(table_id: i64, handle: i64) -> Vec<u8> {
    let mut buf = record_prefix(table_id);
    push_comparable_i64(&mut buf, handle);
    buf
}

/// Extract the handle from a record key.
pub fn decode_row_handle(key: &[u8]) -> ExecResult<i64> {
    if key.len() < 8 {
        return Err(ExecError::codec("record key shorter than a handle"));
    }
    read_comparable_i64(&key[key.len() - 8..])
}

/// The key prefix shared by every entry of `(table_id, index_id)`.
pub fn index_prefix(table_id: i64, index_id: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(INDEX_KEY_PREFIX_LEN);
    buf.push(TABLE_PREFIX);
    push_comparable_i64(&mut buf, table_id);
    buf.extend_from_slice(INDEX_SEP);
    push_comparable_i64(&mut buf, index_id);
    buf
}

/// Build an index key from column values. Unique indexes omit the
/// trailing handle (it lives in the index value instead).
pub fn encode_index_key(
    table_id: i64,
    index_id: i64,
    values: &[Datum],
    handle: Option<i64>,
) -> Vec<u8> {
    let mut buf = index_prefix(table_id, index_id);
    for value in values {
        encode_datum(&mut buf, value);
    }
    if let Some(h) = handle {
        push_comparable_i64(&mut buf, h);
    }
    buf
}

/// Encode a handle for storage in a unique index's value.
pub fn encode_handle_value(handle: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8);
    push_comparable_i64(&mut buf, handle);
    buf
}
