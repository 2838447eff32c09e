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

//! Consumer handle for a snapshot scan
//!
//! [`SnapshotScan`] owns a scan context for its lifetime: it registers the
//! context for mutation notifications at activation, drives it under the
//! table lock, and retires it when the scan completes. Between `advance`
//! calls the caller is free to mutate the table, scan another table, or do
//! anything else; that return is the engine's backpressure point.
//!
//! Dropping a scan mid-flight deregisters the context but leaves the table
//! in snapshot mode; the owner disarms it with
//! [`BlockTable::abort_snapshot`](crate::storage::BlockTable::abort_snapshot).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::Row;
use crate::storage::surgeon::TableSurgeon;
use crate::storage::table::{BlockTable, ContextHandle};

use super::context::{CowContext, SnapshotStats, SnapshotTuple};

/// A consumer's handle on one copy-on-write snapshot scan
pub struct SnapshotScan<'t> {
    table: &'t BlockTable,
    id: u64,
    ctx: Arc<Mutex<CowContext>>,
    registered: bool,
    completed: bool,
}

impl<'t> SnapshotScan<'t> {
    pub(crate) fn new(table: &'t BlockTable, id: u64, ctx: Arc<Mutex<CowContext>>) -> Self {
        Self {
            table,
            id,
            ctx,
            registered: false,
            completed: false,
        }
    }

    /// Activate the scan: arm snapshot mode and the notification protocol
    ///
    /// A no-op on a scan that has already completed.
    pub fn activate(&mut self) {
        if self.completed {
            return;
        }
        {
            let mut inner = self.table.inner.write();
            let mut surgeon = TableSurgeon::new(&mut inner);
            self.ctx.lock().activate(&mut surgeon);
        }
        if !self.registered && self.ctx.lock().is_armed() {
            self.table.register_context(ContextHandle {
                id: self.id,
                ctx: Arc::clone(&self.ctx),
            });
            self.registered = true;
        }
    }

    /// Emit the next snapshot tuple, or None at end of snapshot
    pub fn advance(&mut self) -> Option<SnapshotTuple> {
        if self.completed {
            return None;
        }
        let result = {
            let mut inner = self.table.inner.write();
            let mut surgeon = TableSurgeon::new(&mut inner);
            self.ctx.lock().advance(&mut surgeon)
        };
        if result.is_none() && self.ctx.lock().is_exhausted() {
            self.complete();
        }
        result
    }

    /// Fill `out` with up to `limit` rows, releasing each tuple as it goes
    ///
    /// Counts one serialization batch when any row was produced. Returns
    /// the number of rows appended; 0 means the snapshot is exhausted.
    pub fn next_batch(&mut self, out: &mut Vec<Row>, limit: usize) -> usize {
        let mut produced = 0;
        while produced < limit {
            let Some(tuple) = self.advance() else {
                break;
            };
            self.cleanup_tuple(&tuple, false);
            out.push(tuple.into_row());
            produced += 1;
        }
        if produced > 0 {
            self.ctx.lock().note_serialization_batch();
        }
        produced
    }

    /// Release a tuple received from `advance`
    ///
    /// Frees pending-delete storage the snapshot was keeping alive;
    /// `delete_tuple` requests a transactional delete of the tuple itself.
    pub fn cleanup_tuple(&mut self, tuple: &SnapshotTuple, delete_tuple: bool) {
        let mut inner = self.table.inner.write();
        let mut surgeon = TableSurgeon::new(&mut inner);
        self.ctx
            .lock()
            .cleanup_tuple(&mut surgeon, tuple, delete_tuple);
    }

    /// Assert the countdown invariant during the live pass
    ///
    /// Recounts remaining live emissions plus preserved pre-images and
    /// compares them against the countdown, logging a diagnostic labelled
    /// `label` on mismatch. Returns true when consistent.
    pub fn check_remaining_tuples(&self, label: &str) -> bool {
        let mut inner = self.table.inner.write();
        let surgeon = TableSurgeon::new(&mut inner);
        self.ctx.lock().check_remaining_tuples(&surgeon, label)
    }

    /// Counters of this scan
    pub fn stats(&self) -> SnapshotStats {
        self.ctx.lock().stats()
    }

    /// Remaining tuple countdown (-1 while untracked)
    pub fn tuples_remaining(&self) -> i64 {
        self.ctx.lock().tuples_remaining()
    }

    /// Number of preserved pre-images not yet drained
    pub fn preserved_count(&self) -> usize {
        self.ctx.lock().backup_len()
    }

    /// Reconciliation verdict: Some(true) for a healthy snapshot,
    /// Some(false) for a logged failure, None while the scan is in flight
    pub fn outcome(&self) -> Option<bool> {
        self.ctx.lock().outcome()
    }

    fn complete(&mut self) {
        self.completed = true;
        if self.registered {
            self.registered = false;
            let last = self.table.deregister_context(self.id);
            if last {
                let mut inner = self.table.inner.write();
                TableSurgeon::new(&mut inner).deactivate_snapshot();
            }
        }
    }
}

impl Drop for SnapshotScan<'_> {
    fn drop(&mut self) {
        // An abandoned scan stops receiving notifications, but snapshot
        // mode stays armed until the owner calls abort_snapshot.
        if self.registered {
            self.table.deregister_context(self.id);
        }
    }
}
