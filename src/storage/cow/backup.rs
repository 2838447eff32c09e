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

//! Preserved-image side table
//!
//! An append-only store of deep-copied pre-images. When a tuple the scan
//! cursor has not reached yet is about to be overwritten, its pre-image is
//! copied here; the scan drains the store after the live pass. Unordered,
//! no keys, no de-duplication, traversed at most once.

use std::sync::Arc;

use crate::common::RowPool;
use crate::core::{Row, Value};

/// Append-only store of deep-copied pre-images
#[derive(Default)]
pub struct BackupStore {
    rows: Vec<Arc<[Value]>>,
}

impl BackupStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Append a deep copy of `row`
    ///
    /// The copy's heap payloads are independent of live tuple storage, so
    /// the pre-image survives the slot being overwritten or freed.
    pub fn insert_deep_copy(&mut self, row: &Row, pool: &RowPool) {
        self.rows.push(pool.deep_copy(row));
    }

    /// Number of preserved pre-images
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if nothing has been preserved
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One-shot cursor over the preserved pre-images
    ///
    /// Create the drain cursor only once inserts have ceased; a cursor does
    /// not observe rows appended after the position it has read past.
    pub fn cursor(&self) -> BackupCursor {
        BackupCursor { next: 0 }
    }
}

/// One-shot cursor over a [`BackupStore`]
pub struct BackupCursor {
    next: usize,
}

impl BackupCursor {
    /// Produce the next preserved pre-image, or None when drained
    pub fn next(&mut self, store: &BackupStore) -> Option<Row> {
        let arc = store.rows.get(self.next)?;
        self.next += 1;
        Some(Row::from_arc(Arc::clone(arc)))
    }

    /// Number of pre-images this cursor would still produce
    pub fn remaining(&self, store: &BackupStore) -> usize {
        store.rows.len().saturating_sub(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, name: &str) -> Row {
        Row::from_values(vec![Value::integer(id), Value::text(name)])
    }

    #[test]
    fn test_backup_store_append_and_drain() {
        let pool = RowPool::new();
        let mut store = BackupStore::new();
        assert!(store.is_empty());

        store.insert_deep_copy(&row(1, "a"), &pool);
        store.insert_deep_copy(&row(2, "b"), &pool);
        assert_eq!(store.len(), 2);

        let mut cursor = store.cursor();
        assert_eq!(cursor.remaining(&store), 2);
        assert_eq!(cursor.next(&store), Some(row(1, "a")));
        assert_eq!(cursor.next(&store), Some(row(2, "b")));
        assert_eq!(cursor.next(&store), None);
        assert_eq!(cursor.remaining(&store), 0);
    }

    #[test]
    fn test_backup_copies_are_detached() {
        let pool = RowPool::new();
        let mut store = BackupStore::new();

        let mut live = row(1, "original");
        store.insert_deep_copy(&live, &pool);
        // Overwrite the live row after preservation
        live.set(1, Value::text("mutated"));

        let mut cursor = store.cursor();
        assert_eq!(cursor.next(&store), Some(row(1, "original")));
    }
}
