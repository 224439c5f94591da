//! On-wire row payload
//!
//! A row value is a flat sequence of `(column id, datum)` pairs, each
//! element in the datum encoding. Order of pairs is not significant;
//! scans project into the declared column order.

use crate::datum::{decode_datum, encode_datum, Datum};
use crate::error::{ExecError, ExecResult};

/// Encode `(column id, datum)` pairs into the row payload form.
pub fn encode_row(cols: &[(i64, Datum)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(cols.len() * 16);
    for (col_id, datum) in cols {
        encode_datum(&mut buf, &Datum::Int(*col_id));
        encode_datum(&mut buf, datum);
    }
    buf
}

/// Decode a row payload back into `(column id, datum)` pairs.
pub fn decode_row(mut raw: &[u8]) -> ExecResult<Vec<(i64, Datum)>> {
    let mut out = Vec::new();
    while !raw.is_empty() {
        let id = match decode_datum(&mut raw)? {
            Datum::Int(id) => id,
            other => {
                return Err(ExecError::codec(format!(
                    "column id must be an integer datum, got {other:?}"
                )))
            }
        };
        let datum = decode_datum(&mut raw)?;
        out.push((id, datum));
    }
    Ok(out)
}
