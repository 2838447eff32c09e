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

//! Storage module for Cowtable
//!
//! This module contains the storage layer components:
//! - Fixed-size tuple blocks and stable tuple addressing
//! - The block table with its mutation and notification dispatch
//! - The privileged surgeon handle for block manipulation
//! - Copy-on-write snapshot scan machinery
//! - Configuration types

pub mod block;
pub mod config;
pub mod cow;
pub mod surgeon;
pub mod table;

// Re-export block types
pub use block::{Block, BlockId, TupleAddress, TupleFlags, TupleSlot};

// Re-export config types
pub use config::TableConfig;

// Re-export table and surgeon types
pub use surgeon::TableSurgeon;
pub use table::BlockTable;

// Re-export COW snapshot types
pub use cow::{
    BackupCursor, BackupStore, CowContext, CowCursor, SnapshotScan, SnapshotStats, SnapshotTuple,
    TupleOrigin,
};
