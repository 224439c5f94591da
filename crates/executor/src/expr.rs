//! Expression evaluation
//!
//! Expressions are a tagged tree with a pure evaluator over a row's
//! datums. Comparison and logic follow SQL three-valued semantics: any
//! NULL operand makes a comparison NULL, and NULL is not truthy.

use crate::datum::{cmp_datum, Datum};
use crate::error::{ExecError, ExecResult};
use crate::exec::Row;
use std::cmp::Ordering;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>=`
    Ge,
    /// `>`
    Gt,
}

impl CmpOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Ge => ordering != Ordering::Less,
            CmpOp::Gt => ordering == Ordering::Greater,
        }
    }
}

/// An expression over a row.
#[derive(Debug, Clone)]
pub enum Expr {
    /// The value of the row's n-th declared column.
    Column(usize),
    /// A constant.
    Const(Datum),
    /// Comparison of two sub-expressions.
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    /// Logical conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
    /// NULL test (never NULL itself).
    IsNull(Box<Expr>),
}

impl Expr {
    /// Convenience constructor for `column <op> constant`.
    pub fn cmp_col(op: CmpOp, column: usize, constant: Datum) -> Self {
        Expr::Cmp(
            op,
            Box::new(Expr::Column(column)),
            Box::new(Expr::Const(constant)),
        )
    }

    /// Evaluate over `row`, yielding a datum.
    pub fn eval(&self, row: &Row) -> ExecResult<Datum> {
        match self {
            Expr::Column(idx) => row
                .values
                .get(*idx)
                .cloned()
                .ok_or_else(|| ExecError::eval(format!("column index {idx} out of range"))),
            Expr::Const(d) => Ok(d.clone()),
            Expr::Cmp(op, lhs, rhs) => {
                let l = lhs.eval(row)?;
                let r = rhs.eval(row)?;
                if l == Datum::Null || r == Datum::Null {
                    return Ok(Datum::Null);
                }
                Ok(bool_datum(op.holds(cmp_datum(&l, &r))))
            }
            Expr::And(lhs, rhs) => {
                let l = lhs.eval(row)?;
                let r = rhs.eval(row)?;
                Ok(match (truth(&l), truth(&r)) {
                    (Some(false), _) | (_, Some(false)) => bool_datum(false),
                    (Some(true), Some(true)) => bool_datum(true),
                    _ => Datum::Null,
                })
            }
            Expr::Or(lhs, rhs) => {
                let l = lhs.eval(row)?;
                let r = rhs.eval(row)?;
                Ok(match (truth(&l), truth(&r)) {
                    (Some(true), _) | (_, Some(true)) => bool_datum(true),
                    (Some(false), Some(false)) => bool_datum(false),
                    _ => Datum::Null,
                })
            }
            Expr::Not(inner) => {
                let v = inner.eval(row)?;
                Ok(match truth(&v) {
                    Some(b) => bool_datum(!b),
                    None => Datum::Null,
                })
            }
            Expr::IsNull(inner) => Ok(bool_datum(inner.eval(row)? == Datum::Null)),
        }
    }
}

fn bool_datum(b: bool) -> Datum {
    Datum::Int(b as i64)
}

/// Three-valued truth: `None` is NULL.
fn truth(d: &Datum) -> Option<bool> {
    match d {
        Datum::Null => None,
        other => Some(other.is_truthy()),
    }
}
