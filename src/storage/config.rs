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

//! Storage engine configuration
//!

/// Configuration options for a block table
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Number of tuple slots per block
    /// Default: 256
    pub block_capacity: u32,

    /// Index of the partitioning column, if the table is partitioned
    /// Reported in snapshot diagnostics; routing is out of scope here
    pub partition_column: Option<usize>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            block_capacity: 256,
            partition_column: None,
        }
    }
}

impl TableConfig {
    /// Creates a new TableConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the block capacity
    ///
    /// Small capacities are useful in tests to force multi-block layouts.
    pub fn with_block_capacity(mut self, slots: u32) -> Self {
        assert!(slots > 0, "block capacity must be positive");
        self.block_capacity = slots;
        self
    }

    /// Builder method to set the partition column
    pub fn with_partition_column(mut self, column: usize) -> Self {
        self.partition_column = Some(column);
        self
    }
}
