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

//! Copy-on-write snapshot scans
//!
//! A consistent full-table scan that runs concurrently with mutations,
//! without blocking writers and without shadow-copying the table:
//!
//! - [`CowContext`] - activation, dual-phase advance, the mutation
//!   notification protocol, and end-of-scan reconciliation
//! - [`CowCursor`] - the live-block cursor with the passed-slot oracle and
//!   compaction repair
//! - [`BackupStore`] - the append-only side table of preserved pre-images
//! - [`SnapshotScan`] - the consumer handle that drives all of the above

pub mod backup;
pub mod context;
pub mod cursor;
pub mod stream;

pub use backup::{BackupCursor, BackupStore};
pub use context::{CowContext, SnapshotStats, SnapshotTuple, TupleOrigin};
pub use cursor::CowCursor;
pub use stream::SnapshotScan;
