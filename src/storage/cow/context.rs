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

//! Copy-on-write snapshot scan context
//!
//! The context interposes between a full-table scan and the table's ongoing
//! mutations so the scan observes exactly the activation-time row set:
//! every live row as it existed the moment the scan was activated, no rows
//! inserted afterwards, pre-update values for rows mutated before the cursor
//! reached them. Writers never block; the context preserves pre-images into
//! a side table instead, and drains that side table after the live pass.
//!
//! The scan runs in two phases, expressed as a tagged cursor: `ScanLive`
//! walks the persistent blocks, `DrainBackup` walks the preserved
//! pre-images. Phase-specific operations (the passed-slot oracle, compaction
//! repair) exist only on the live cursor, so the type system rules them out
//! during the drain.

use crate::common::RowPool;
use crate::core::Row;
use crate::storage::block::{BlockId, TupleAddress, TupleSlot};
use crate::storage::surgeon::TableSurgeon;

use super::backup::{BackupCursor, BackupStore};
use super::cursor::CowCursor;

/// Where an emitted tuple came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleOrigin {
    /// Emitted by the live cursor; the address names real slot storage
    Live(TupleAddress),
    /// Emitted from the preserved-image side table; owns its storage
    Backup,
}

/// A tuple handed to the snapshot consumer
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotTuple {
    row: Row,
    origin: TupleOrigin,
}

impl SnapshotTuple {
    /// The tuple's column values
    pub fn row(&self) -> &Row {
        &self.row
    }

    /// Consume the tuple, keeping the row
    pub fn into_row(self) -> Row {
        self.row
    }

    /// The live slot address, for live-phase emissions
    pub fn address(&self) -> Option<TupleAddress> {
        match self.origin {
            TupleOrigin::Live(addr) => Some(addr),
            TupleOrigin::Backup => None,
        }
    }

    /// Where this tuple came from
    pub fn origin(&self) -> TupleOrigin {
        self.origin
    }
}

/// Monotonic counters of a snapshot scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    /// Tuples inserted after activation (dirty-marked, never copied)
    pub inserts: u64,
    /// Pre-images preserved for updates and relocations
    pub updates: u64,
    /// Deletes observed before the cursor passed the tuple
    pub deletes: u64,
    /// Blocks compacted away during the live pass
    pub blocks_compacted: u64,
    /// Batches handed to the snapshot consumer
    pub serialization_batches: u64,
    /// Candidate slots rejected because the tuple was dirty
    pub skipped_dirty_rows: u64,
    /// Candidate slots rejected because the slot was inactive
    pub skipped_inactive_rows: u64,
}

/// The scan's phase, as a tagged cursor
enum ScanPhase {
    /// Walking the persistent blocks
    ScanLive(CowCursor),
    /// Draining the preserved-image side table
    DrainBackup(BackupCursor),
}

/// Copy-on-write snapshot scan context
///
/// Constructed by the table, activated exactly once, advanced until
/// exhausted, then reconciled. The table forwards every mutation to the
/// context through the `on_*` notifications before the mutation becomes
/// observable.
pub struct CowContext {
    table_name: String,
    table_kind: &'static str,
    partition_column: Option<usize>,

    phase: Option<ScanPhase>,
    finished_table_scan: bool,

    /// Snapshot-expected row count; -1 means untracked (test mode)
    total_tuples: i64,
    /// Countdown to zero across both phases
    tuples_remaining: i64,

    inserts: u64,
    updates: u64,
    deletes: u64,
    blocks_compacted: u64,
    serialization_batches: u64,
    /// Live-cursor skip counters, captured at the phase flip
    skipped_dirty_rows: u64,
    skipped_inactive_rows: u64,

    pool: RowPool,
    backup: BackupStore,

    /// Reconciliation verdict, set when the scan exhausts
    outcome: Option<bool>,
}

impl CowContext {
    /// Create a context expecting `total_tuples` rows (-1 for untracked)
    pub(crate) fn new(
        table_name: String,
        table_kind: &'static str,
        partition_column: Option<usize>,
        total_tuples: i64,
    ) -> Self {
        Self {
            table_name,
            table_kind,
            partition_column,
            phase: None,
            finished_table_scan: false,
            total_tuples,
            tuples_remaining: total_tuples,
            inserts: 0,
            updates: 0,
            deletes: 0,
            blocks_compacted: 0,
            serialization_batches: 0,
            skipped_dirty_rows: 0,
            skipped_inactive_rows: 0,
            pool: RowPool::new(),
            backup: BackupStore::new(),
            outcome: None,
        }
    }

    // =========================================================================
    // Activation
    // =========================================================================

    /// Arm the scan: enter snapshot mode and install the live cursor
    ///
    /// A no-op once the scan has fully completed. Re-activating a scan that
    /// is still in flight is a caller error.
    pub(crate) fn activate(&mut self, surgeon: &mut TableSurgeon<'_>) {
        if self.finished_table_scan && self.tuples_remaining == 0 {
            return;
        }
        debug_assert!(self.phase.is_none(), "snapshot scan activated twice");
        surgeon.activate_snapshot();
        self.phase = Some(ScanPhase::ScanLive(CowCursor::new(surgeon)));
    }

    /// Whether the scan has been armed
    pub(crate) fn is_armed(&self) -> bool {
        self.phase.is_some()
    }

    // =========================================================================
    // Advancing
    // =========================================================================

    /// Emit the next snapshot tuple, or None at end of snapshot
    ///
    /// The first exhaustion of the live cursor flips the scan to the backup
    /// drain; exhaustion of the drain runs reconciliation. When the tuple
    /// countdown hits zero on an emission, outstanding block hand-backs are
    /// flushed so the final block does not linger in the pending list.
    pub(crate) fn advance(&mut self, surgeon: &mut TableSurgeon<'_>) -> Option<SnapshotTuple> {
        debug_assert!(
            self.outcome.is_none(),
            "advance called after the snapshot was exhausted"
        );
        if self.outcome.is_some() {
            return None;
        }

        let mut emitted = self.next_tuple(surgeon);
        if emitted.is_none() && !self.finished_table_scan {
            self.finished_table_scan = true;
            if let Some(ScanPhase::ScanLive(cursor)) = &self.phase {
                self.skipped_dirty_rows = cursor.skipped_dirty_rows();
                self.skipped_inactive_rows = cursor.skipped_inactive_rows();
            }
            self.phase = Some(ScanPhase::DrainBackup(self.backup.cursor()));
            emitted = self.next_tuple(surgeon);
        }

        match emitted {
            Some(tuple) => {
                if self.tuples_remaining > 0 {
                    self.tuples_remaining -= 1;
                }
                if self.tuples_remaining == 0 {
                    if let Some(ScanPhase::ScanLive(cursor)) = &mut self.phase {
                        cursor.finalize(surgeon);
                    }
                }
                Some(tuple)
            }
            None => {
                let ok = self.reconcile(surgeon);
                self.outcome = Some(ok);
                None
            }
        }
    }

    fn next_tuple(&mut self, surgeon: &mut TableSurgeon<'_>) -> Option<SnapshotTuple> {
        let Self { phase, backup, .. } = self;
        match phase.as_mut() {
            Some(ScanPhase::ScanLive(cursor)) => cursor.next(surgeon).map(|(addr, row)| {
                SnapshotTuple {
                    row,
                    origin: TupleOrigin::Live(addr),
                }
            }),
            Some(ScanPhase::DrainBackup(cursor)) => cursor.next(backup).map(|row| SnapshotTuple {
                row,
                origin: TupleOrigin::Backup,
            }),
            None => {
                debug_assert!(false, "advance called before activation");
                None
            }
        }
    }

    /// Whether advance has reported end of snapshot
    pub(crate) fn is_exhausted(&self) -> bool {
        self.outcome.is_some()
    }

    /// Reconciliation verdict, once the scan has exhausted
    pub(crate) fn outcome(&self) -> Option<bool> {
        self.outcome
    }

    // =========================================================================
    // Notifications from the table
    // =========================================================================

    /// A tuple was inserted; always allows the insert
    pub(crate) fn on_tuple_insert(&mut self, addr: TupleAddress, slot: &mut TupleSlot) -> bool {
        self.mark_dirty(addr, slot, true);
        true
    }

    /// A tuple is about to be updated in place; always allows the update
    ///
    /// The slot must still hold the pre-image when this runs.
    pub(crate) fn on_tuple_update(&mut self, addr: TupleAddress, slot: &mut TupleSlot) -> bool {
        self.mark_dirty(addr, slot, false);
        true
    }

    /// A tuple is about to be deleted
    ///
    /// Returns true if the table may free the storage immediately: the
    /// tuple is already backed up or post-activation (dirty), the snapshot
    /// is past its live pass, or the cursor has already emitted the slot.
    /// Returns false to defer the physical delete; the slot is flagged
    /// pending-delete so the cursor still finds the pre-image, and the scan
    /// frees it through `cleanup_tuple`.
    pub(crate) fn on_tuple_delete(&mut self, addr: TupleAddress, slot: &TupleSlot) -> bool {
        debug_assert!(self.phase.is_some(), "notified before activation");
        if slot.flags().is_dirty() || self.finished_table_scan {
            return true;
        }
        // Loose count: the cursor may already be past this slot
        self.deletes += 1;

        match &self.phase {
            Some(ScanPhase::ScanLive(cursor)) => !cursor.need_to_dirty_tuple(addr),
            _ => true,
        }
    }

    /// A block was compacted away
    ///
    /// During the backup drain the notification is ignored: the freed block
    /// is persistent-table storage, irrelevant to the side table the scan is
    /// now reading.
    pub(crate) fn on_block_compacted_away(&mut self, block: BlockId) {
        debug_assert!(self.phase.is_some(), "notified before activation");
        if self.finished_table_scan {
            return;
        }
        self.blocks_compacted += 1;
        if let Some(ScanPhase::ScanLive(cursor)) = &mut self.phase {
            cursor.notify_block_was_compacted_away(block);
        }
    }

    /// Dirty-marking policy shared by the insert and update notifications
    ///
    /// A tuple ahead of the cursor is dirtied so the live pass skips it;
    /// updates additionally preserve the pre-image, inserts are
    /// post-activation rows and must not be copied. A tuple the cursor has
    /// already passed needs nothing, and once the live pass is over the
    /// whole protocol stands down.
    fn mark_dirty(&mut self, addr: TupleAddress, slot: &mut TupleSlot, is_new: bool) {
        debug_assert!(self.phase.is_some(), "notified before activation");

        // An update or delete of an already-dirty tuple needs no further action
        if !is_new && slot.flags().is_dirty() {
            return;
        }

        if self.finished_table_scan {
            slot.clear_dirty();
            return;
        }

        let Self {
            phase,
            backup,
            pool,
            inserts,
            updates,
            ..
        } = self;
        let Some(ScanPhase::ScanLive(cursor)) = phase.as_ref() else {
            slot.clear_dirty();
            return;
        };

        if cursor.need_to_dirty_tuple(addr) {
            slot.set_dirty();
            if is_new {
                // Post-activation row: mark it, never back it up
                *inserts += 1;
            } else {
                *updates += 1;
                backup.insert_deep_copy(slot.row(), pool);
            }
        } else {
            slot.clear_dirty();
        }
    }

    // =========================================================================
    // Consumer-side cleanup
    // =========================================================================

    /// Release a tuple the consumer is done with
    ///
    /// A pending-delete tuple's storage is freed now that the snapshot has
    /// read it; `delete_tuple` additionally requests a transactional delete
    /// of the tuple itself (rebalancing flows that wrap the scan in a
    /// transaction). Backup-phase emissions own their storage and their
    /// source slot may already be recycled, so only live-phase emissions
    /// reach the surgeon.
    pub(crate) fn cleanup_tuple(
        &mut self,
        surgeon: &mut TableSurgeon<'_>,
        tuple: &SnapshotTuple,
        delete_tuple: bool,
    ) {
        let Some(addr) = tuple.address() else {
            return;
        };
        if surgeon.is_pending_delete(addr) {
            debug_assert!(!surgeon.is_pending_delete_on_undo_release(addr));
            // The cursor is parked on the tuple's block; hand the hint over
            // to skip the directory walk.
            let hint = match &self.phase {
                Some(ScanPhase::ScanLive(cursor)) => cursor.current_block(),
                _ => None,
            };
            surgeon.delete_tuple_storage(addr, hint);
        } else if delete_tuple {
            surgeon.delete_tuple_for_undo(addr, true);
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Reconcile at end of scan; true on a healthy snapshot
    ///
    /// Healthy means the countdown reached zero and no block is stranded in
    /// a pending list. Untracked mode clamps the countdown and succeeds.
    /// Anything else builds a full diagnostic; stranded blocks are returned
    /// best-effort, a block-accounting inconsistency is fatal, and otherwise
    /// the failure is logged and reported to the caller.
    fn reconcile(&mut self, surgeon: &mut TableSurgeon<'_>) -> bool {
        let pending = surgeon.snapshot_pending_block_count();
        let pending_load = surgeon.snapshot_pending_load_block_count();

        if self.tuples_remaining > 0 || pending > 0 || pending_load > 0 {
            let message = format!(
                "tuple count > 0 after streaming:\n\
                 Table name: {}\n\
                 Table type: {}\n\
                 Original tuple count: {}\n\
                 Active tuple count: {}\n\
                 Remaining tuple count: {}\n\
                 Pending block count: {}\n\
                 Pending load block count: {}\n\
                 Compacted block count: {}\n\
                 Dirty insert count: {}\n\
                 Dirty delete count: {}\n\
                 Dirty update count: {}\n\
                 Partition column: {}\n\
                 Skipped dirty rows: {}\n\
                 Skipped inactive rows: {}",
                self.table_name,
                self.table_kind,
                self.total_tuples,
                surgeon.active_tuple_count(),
                self.tuples_remaining,
                pending,
                pending_load,
                self.blocks_compacted,
                self.inserts,
                self.deletes,
                self.updates,
                self.partition_column
                    .map_or_else(|| "-".to_string(), |c| c.to_string()),
                self.skipped_dirty_rows,
                self.skipped_inactive_rows,
            );

            if pending > 0 {
                // Blocks were orphaned or the cursor was corrupted. Return
                // everything to the non-pending lists so the next snapshot
                // starts from a pristine table.
                for id in surgeon.block_ids() {
                    surgeon.snapshot_finished_scanning_block(id, None);
                }
            }
            if !surgeon.block_count_consistent() {
                panic!("{}", message);
            }
            log::error!("{}", message);
            self.tuples_remaining = 0;
            false
        } else {
            if self.tuples_remaining < 0 {
                // Untracked test mode: force the countdown to zero
                self.tuples_remaining = 0;
            }
            true
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Recount the remaining tuples and compare against the countdown
    ///
    /// Only meaningful during the live pass, where the countdown must equal
    /// the live cursor's remaining emissions plus the side table's backlog;
    /// once the scan has flipped to the backup drain the recount is
    /// impossible and the check trivially passes. Logs at error level and
    /// returns false on a mismatch.
    pub(crate) fn check_remaining_tuples(
        &self,
        surgeon: &TableSurgeon<'_>,
        label: &str,
    ) -> bool {
        let Some(ScanPhase::ScanLive(cursor)) = &self.phase else {
            return true;
        };
        if self.tuples_remaining < 0 {
            // Untracked mode has nothing to compare against
            return true;
        }

        let count1 = cursor.count_remaining(surgeon) as i64;
        let mut walker = self.backup.cursor();
        let mut count2 = 0i64;
        while walker.next(&self.backup).is_some() {
            count2 += 1;
        }

        if self.tuples_remaining != count1 + count2 {
            log::error!(
                "{} remaining tuple count mismatch: table={} partcol={} \
                 count={} count1={} count2={} expected={} compacted={} batches={} \
                 inserts={} updates={}",
                label,
                self.table_name,
                self.partition_column
                    .map_or_else(|| "-".to_string(), |c| c.to_string()),
                count1 + count2,
                count1,
                count2,
                self.tuples_remaining,
                self.blocks_compacted,
                self.serialization_batches,
                self.inserts,
                self.updates,
            );
            return false;
        }
        true
    }

    /// Snapshot of the scan's counters
    pub(crate) fn stats(&self) -> SnapshotStats {
        let (skipped_dirty, skipped_inactive) = match &self.phase {
            Some(ScanPhase::ScanLive(cursor)) => {
                (cursor.skipped_dirty_rows(), cursor.skipped_inactive_rows())
            }
            _ => (self.skipped_dirty_rows, self.skipped_inactive_rows),
        };
        SnapshotStats {
            inserts: self.inserts,
            updates: self.updates,
            deletes: self.deletes,
            blocks_compacted: self.blocks_compacted,
            serialization_batches: self.serialization_batches,
            skipped_dirty_rows: skipped_dirty,
            skipped_inactive_rows: skipped_inactive,
        }
    }

    /// Remaining tuple countdown
    pub(crate) fn tuples_remaining(&self) -> i64 {
        self.tuples_remaining
    }

    /// Number of preserved pre-images
    pub(crate) fn backup_len(&self) -> usize {
        self.backup.len()
    }

    /// Count one batch handed to the snapshot consumer
    pub(crate) fn note_serialization_batch(&mut self) {
        self.serialization_batches += 1;
    }
}
