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

//! Scratch pool for pre-image copies
//!
//! A snapshot scan context owns one `RowPool`: the allocation funnel through
//! which every preserved pre-image is deep-copied. The pool hands out
//! detached `Arc<[Value]>` copies and counts what passed through; the copies
//! are owned by the side table and never come back. An allocation failure
//! here is fatal to the snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::{Row, Value};

/// Allocation funnel for pre-image deep copies
pub struct RowPool {
    /// Deep copies served
    copies: AtomicUsize,
    /// Total values deep-copied
    values_copied: AtomicUsize,
}

impl RowPool {
    /// Create a new pool
    pub fn new() -> Self {
        Self {
            copies: AtomicUsize::new(0),
            values_copied: AtomicUsize::new(0),
        }
    }

    /// Deep-copy a row into an immutable shared slice
    ///
    /// Every heap payload in the copy is independent of the source row, so
    /// the result stays valid after the source slot is overwritten or freed.
    pub fn deep_copy(&self, row: &Row) -> Arc<[Value]> {
        self.copies.fetch_add(1, Ordering::Relaxed);
        self.values_copied.fetch_add(row.len(), Ordering::Relaxed);

        let values: Vec<Value> = row.iter().map(Value::deep_clone).collect();
        Arc::from(values)
    }

    /// Pool statistics snapshot
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            copies: self.copies.load(Ordering::Relaxed),
            values_copied: self.values_copied.load(Ordering::Relaxed),
        }
    }
}

impl Default for RowPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a [`RowPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub copies: usize,
    pub values_copied: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_copy_is_independent() {
        let pool = RowPool::new();
        let row = Row::from_values(vec![Value::integer(1), Value::text("payload")]);

        let copy = pool.deep_copy(&row);
        assert_eq!(copy.len(), 2);
        assert_eq!(copy[1], Value::text("payload"));

        if let (Some(Value::Text(src)), Value::Text(dst)) = (row.get(1), &copy[1]) {
            assert!(!Arc::ptr_eq(src, dst));
        } else {
            panic!("expected text values");
        }
    }

    #[test]
    fn test_pool_counts_copies() {
        let pool = RowPool::new();
        pool.deep_copy(&Row::from_values(vec![Value::integer(1)]));
        pool.deep_copy(&Row::from_values(vec![
            Value::integer(2),
            Value::text("x"),
            Value::boolean(true),
        ]));

        let stats = pool.stats();
        assert_eq!(stats.copies, 2);
        assert_eq!(stats.values_copied, 4);
    }
}
