//! # BasaltDB
//!
//! The core of a distributed-transaction key-value node: a multi-version,
//! two-phase-commit storage engine layered on an ordered backing store,
//! plus the coprocessor executor pipeline that consumes its snapshot
//! reads.
//!
//! # Quick Start
//!
//! ```
//! use basaltdb::{Mutation, OpContext, RegionContext, TxnEngine};
//! use basaltdb::{MemStore, Store};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn Store> = Arc::new(MemStore::new());
//! let region = Arc::new(RegionContext::new(Vec::new(), Vec::new()));
//! let engine = TxnEngine::new(store, region);
//! let ctx = OpContext::new();
//!
//! // Two-phase commit: prewrite locks, commit publishes.
//! let failures = engine
//!     .prewrite(&ctx, &[Mutation::put(b"k".as_slice(), b"v".as_slice())], b"k", 100, 3000)
//!     .unwrap();
//! assert!(failures.is_empty());
//! engine.commit(&ctx, &[b"k".to_vec()], 100, 101).unwrap();
//!
//! // Snapshot reads honour the caller's timestamp.
//! assert_eq!(engine.get(&ctx, b"k", 102).unwrap().as_deref(), Some(b"v".as_slice()));
//! assert_eq!(engine.get(&ctx, b"k", 100).unwrap(), None);
//! ```
//!
//! # Layers
//!
//! | Crate | Role |
//! |-------|------|
//! | `basalt-core` | Timestamps, record codec, errors, store contract |
//! | `basalt-storage` | In-memory ordered backing store |
//! | `basalt-concurrency` | Region latches and the transaction index |
//! | `basalt-engine` | The MVCC engine and its write worker |
//! | `basalt-executor` | Table/index scans, selection, limit, top-N |

pub use basalt_concurrency::RegionContext;
pub use basalt_core::{
    compose_ts, physical, Error, KvPair, Lock, LockOp, Mixed, OpContext, Result, SnapshotSource,
    Store, Ts, ValueKind, ValueRecord, WriteBatch, LOCK_VER,
};
pub use basalt_engine::{LockInfo, Mutation, MutationOp, MvccSnapshot, TxnEngine};
pub use basalt_executor::{
    CmpOp, ColumnInfo, Datum, ExecError, ExecResult, Executor, Expr, IndexScan, KeyRange, Limit,
    OrderBy, Row, Selection, TableScan, TopN,
};
pub use basalt_storage::MemStore;
