// Copyright 2025 Cowtable Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Cowtable - in-memory tuple storage with copy-on-write snapshot scans
//!
//! Cowtable is the core of a partitioned, in-memory, tuple-oriented
//! relational storage engine. Tuples live in fixed-size blocks of slots;
//! its distinguishing feature is the **copy-on-write snapshot scan**: a
//! long-running, consistent full-table scan that proceeds concurrently with
//! ongoing mutations against the same table, without ever blocking writers
//! and without shadow-copying the table up front.
//!
//! ## How the snapshot stays consistent
//!
//! Activating a scan defines the snapshot horizon. From then on the table
//! announces every mutation to the scan before applying it:
//!
//! - rows inserted after activation are dirty-marked and never emitted;
//! - a row updated before the cursor reaches it has its pre-image deep-copied
//!   into a side table, drained after the live pass;
//! - a row deleted ahead of the cursor is kept readable (pending-delete)
//!   until the scan has emitted it;
//! - compaction may free whole blocks mid-scan; the cursor repairs itself
//!   and no emission is lost or duplicated.
//!
//! ## Quick Start
//!
//! ```rust
//! use cowtable::{BlockTable, DataType, Row, SchemaBuilder, TableConfig, Value};
//!
//! let schema = SchemaBuilder::new("users")
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::Text)
//!     .build();
//! let table = BlockTable::new("users", schema, TableConfig::default());
//!
//! table.insert(Row::from_values(vec![Value::integer(1), Value::text("Alice")])).unwrap();
//! let bob = table
//!     .insert(Row::from_values(vec![Value::integer(2), Value::text("Bob")]))
//!     .unwrap();
//!
//! // Start a consistent scan, then mutate behind its back
//! let mut scan = table.begin_snapshot();
//! scan.activate();
//! table.update(bob, Row::from_values(vec![Value::integer(2), Value::text("Robert")])).unwrap();
//!
//! let mut names: Vec<String> = Vec::new();
//! while let Some(tuple) = scan.advance() {
//!     names.push(tuple.row().get(1).unwrap().to_string());
//!     scan.cleanup_tuple(&tuple, false);
//! }
//! names.sort();
//!
//! // The scan saw the activation-time value of Bob's row
//! assert_eq!(names, vec!["Alice", "Bob"]);
//! assert_eq!(scan.outcome(), Some(true));
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core types ([`DataType`], [`Value`], [`Row`], [`Schema`], [`Error`])
//! - [`storage`] - Block store, table, surgeon, and the COW scan machinery
//! - [`common`] - Utilities (scratch pool, version)

// Use mimalloc as global allocator when feature is enabled
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod common;
pub mod core;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{
    parse_timestamp, DataType, Error, Result, Row, Schema, SchemaBuilder, SchemaColumn, Value,
};

// Re-export common utilities
pub use common::{PoolStats, RowPool};

// Re-export storage types
pub use storage::{
    BlockId, BlockTable, SnapshotScan, SnapshotStats, SnapshotTuple, TableConfig, TupleAddress,
    TupleFlags, TupleOrigin,
};
