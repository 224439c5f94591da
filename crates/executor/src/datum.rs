//! Typed column values and their binary form
//!
//! One tag-byte encoding serves both row payloads and index keys. The
//! numeric forms are order-preserving (sign-flipped big-endian integers,
//! total-order transformed floats) so encoded index keys compare the way
//! their datums do; byte strings are length-prefixed.
//!
//! # Format
//!
//! ```text
//! ┌───────────┬──────────────────────────────────────────────┐
//! │ Tag (u8)  │ Payload                                      │
//! ├───────────┼──────────────────────────────────────────────┤
//! │ 0x00 NIL  │ -                                            │
//! │ 0x01 BYTES│ u32 BE length + bytes                        │
//! │ 0x03 INT  │ 8 bytes BE, sign bit flipped                 │
//! │ 0x04 UINT │ 8 bytes BE                                   │
//! │ 0x05 FLOAT│ 8 bytes BE, IEEE-754 total-order transform   │
//! └───────────┴──────────────────────────────────────────────┘
//! ```

use crate::error::{ExecError, ExecResult};
use byteorder::{BigEndian, ByteOrder};
use std::cmp::Ordering;

const NIL_TAG: u8 = 0x00;
const BYTES_TAG: u8 = 0x01;
const INT_TAG: u8 = 0x03;
const UINT_TAG: u8 = 0x04;
const FLOAT_TAG: u8 = 0x05;

const SIGN_MASK: u64 = 0x8000_0000_0000_0000;

/// A typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// SQL NULL.
    Null,
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Double-precision float.
    Float(f64),
    /// Raw byte string.
    Bytes(Vec<u8>),
}

impl Datum {
    /// Truthiness for predicate evaluation; NULL is not truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Datum::Null => false,
            Datum::Int(v) => *v != 0,
            Datum::UInt(v) => *v != 0,
            Datum::Float(v) => *v != 0.0,
            Datum::Bytes(b) => !b.is_empty(),
        }
    }
}

/// Append `datum` to `buf`.
pub fn encode_datum(buf: &mut Vec<u8>, datum: &Datum) {
    match datum {
        Datum::Null => buf.push(NIL_TAG),
        Datum::Bytes(b) => {
            buf.push(BYTES_TAG);
            let mut len = [0u8; 4];
            BigEndian::write_u32(&mut len, b.len() as u32);
            buf.extend_from_slice(&len);
            buf.extend_from_slice(b);
        }
        Datum::Int(v) => {
            buf.push(INT_TAG);
            let mut tmp = [0u8; 8];
            BigEndian::write_u64(&mut tmp, (*v as u64) ^ SIGN_MASK);
            buf.extend_from_slice(&tmp);
        }
        Datum::UInt(v) => {
            buf.push(UINT_TAG);
            let mut tmp = [0u8; 8];
            BigEndian::write_u64(&mut tmp, *v);
            buf.extend_from_slice(&tmp);
        }
        Datum::Float(v) => {
            buf.push(FLOAT_TAG);
            let bits = v.to_bits();
            let ordered = if bits & SIGN_MASK == 0 {
                bits | SIGN_MASK
            } else {
                !bits
            };
            let mut tmp = [0u8; 8];
            BigEndian::write_u64(&mut tmp, ordered);
            buf.extend_from_slice(&tmp);
        }
    }
}

/// Decode one datum from the front of `cur`, advancing it.
pub fn decode_datum(cur: &mut &[u8]) -> ExecResult<Datum> {
    if cur.is_empty() {
        return Err(ExecError::codec("unexpected end of datum stream"));
    }
    let tag = cur[0];
    *cur = &cur[1..];
    match tag {
        NIL_TAG => Ok(Datum::Null),
        BYTES_TAG => {
            if cur.len() < 4 {
                return Err(ExecError::codec("truncated bytes length"));
            }
            let len = BigEndian::read_u32(&cur[..4]) as usize;
            *cur = &cur[4..];
            if cur.len() < len {
                return Err(ExecError::codec("truncated bytes payload"));
            }
            let bytes = cur[..len].to_vec();
            *cur = &cur[len..];
            Ok(Datum::Bytes(bytes))
        }
        INT_TAG => {
            let raw = read_u64(cur)?;
            Ok(Datum::Int((raw ^ SIGN_MASK) as i64))
        }
        UINT_TAG => Ok(Datum::UInt(read_u64(cur)?)),
        FLOAT_TAG => {
            let ordered = read_u64(cur)?;
            let bits = if ordered & SIGN_MASK != 0 {
                ordered & !SIGN_MASK
            } else {
                !ordered
            };
            Ok(Datum::Float(f64::from_bits(bits)))
        }
        other => Err(ExecError::codec(format!("unknown datum tag {other:#04x}"))),
    }
}

fn read_u64(cur: &mut &[u8]) -> ExecResult<u64> {
    if cur.len() < 8 {
        return Err(ExecError::codec("truncated 8-byte datum payload"));
    }
    let v = BigEndian::read_u64(&cur[..8]);
    *cur = &cur[8..];
    Ok(v)
}

/// Total order over datums for sorting: NULL first, then numerics by
/// value (cross-type), then byte strings.
pub fn cmp_datum(a: &Datum, b: &Datum) -> Ordering {
    use Datum::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Int(x), Int(y)) => x.cmp(y),
        (UInt(x), UInt(y)) => x.cmp(y),
        (Int(x), UInt(y)) => cmp_i128(*x as i128, *y as i128),
        (UInt(x), Int(y)) => cmp_i128(*x as i128, *y as i128),
        (Float(x), Float(y)) => x.total_cmp(y),
        (Float(x), Int(y)) => x.total_cmp(&(*y as f64)),
        (Float(x), UInt(y)) => x.total_cmp(&(*y as f64)),
        (Int(x), Float(y)) => (*x as f64).total_cmp(y),
        (UInt(x), Float(y)) => (*x as f64).total_cmp(y),
        (Bytes(x), Bytes(y)) => x.cmp(y),
        (Bytes(_), _) => Ordering::Greater,
        (_, Bytes(_)) => Ordering::Less,
    }
}

fn cmp_i128(a: i128, b: i128) -> Ordering {
    a.cmp(&b)
}
