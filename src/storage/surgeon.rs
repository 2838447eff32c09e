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

//! Privileged block-surgery handle
//!
//! A [`TableSurgeon`] is a borrow-scoped handle over a table's locked inner
//! state. The snapshot machinery does all of its block manipulation through
//! it: arming and disarming snapshot mode, returning scanned blocks to the
//! non-pending list, freeing deferred-delete tuple storage, and checking
//! block accounting invariants.

use std::collections::BTreeSet;

use crate::core::Row;

use super::block::{BlockId, TupleAddress, TupleFlags};
use super::table::TableInner;

/// Borrow-scoped privileged handle over a table's block store
pub struct TableSurgeon<'a> {
    inner: &'a mut TableInner,
}

impl<'a> TableSurgeon<'a> {
    pub(crate) fn new(inner: &'a mut TableInner) -> Self {
        Self { inner }
    }

    // =========================================================================
    // Snapshot mode
    // =========================================================================

    /// Arm snapshot mode: every current block becomes pending-scan
    ///
    /// On the inactive-to-active transition, dirty bits left over from a
    /// previous snapshot are cleared; a stale bit would hide a live tuple
    /// from the new cursor. Activating on top of an already-armed table
    /// (a second context joining before any scan advances) must not touch
    /// the bits the first context has started setting.
    pub fn activate_snapshot(&mut self) {
        if !self.inner.snapshot.active {
            for block in self.inner.blocks.values_mut() {
                for (_, slot) in block.slots_mut() {
                    slot.clear_dirty();
                }
            }
        }
        self.inner.snapshot.active = true;
        self.inner.snapshot.pending = self.inner.blocks.keys().copied().collect();
        self.inner.snapshot.pending_load.clear();
        self.inner.snapshot.horizon = BlockId(self.inner.next_block);
    }

    /// Disarm snapshot mode and clear the pending sets
    pub fn deactivate_snapshot(&mut self) {
        self.inner.snapshot.active = false;
        self.inner.snapshot.pending.clear();
        self.inner.snapshot.pending_load.clear();
    }

    /// Whether snapshot mode is armed
    pub fn snapshot_active(&self) -> bool {
        self.inner.snapshot.active
    }

    /// Return a block to the non-pending list once a cursor is done with it
    pub fn snapshot_finished_scanning_block(&mut self, id: BlockId, next: Option<BlockId>) {
        let was_pending = self.inner.snapshot.pending.remove(&id);
        let was_pending_load = self.inner.snapshot.pending_load.remove(&id);
        if was_pending || was_pending_load {
            log::trace!(
                "finished scanning {}, next block {:?}",
                id,
                next.map(|b| b.0)
            );
        }
    }

    /// Number of blocks still pending snapshot scan
    pub fn snapshot_pending_block_count(&self) -> usize {
        self.inner.snapshot.pending.len()
    }

    /// Number of bulk-loaded blocks still pending hand-back
    pub fn snapshot_pending_load_block_count(&self) -> usize {
        self.inner.snapshot.pending_load.len()
    }

    // =========================================================================
    // Tuple storage
    // =========================================================================

    /// Free the storage of a pending-delete tuple
    ///
    /// `block_hint` is the block the caller's cursor is currently on; when it
    /// names the tuple's block the directory walk is skipped. Returns false
    /// if the slot is gone or not eligible (not pending-delete, or deferred
    /// to undo release).
    pub fn delete_tuple_storage(&mut self, addr: TupleAddress, block_hint: Option<BlockId>) -> bool {
        debug_assert!(block_hint.map_or(true, |b| b == addr.block));
        let Some(block) = self.inner.blocks.get_mut(&addr.block) else {
            return false;
        };
        let Some(slot) = block.slot(addr.slot) else {
            return false;
        };
        let flags = slot.flags();
        if !flags.is_pending_delete() || flags.is_pending_delete_on_undo_release() {
            return false;
        }
        block.clear_slot(addr.slot).is_some()
    }

    /// Delete a tuple with undo support
    ///
    /// Transactional deletes flag the slot and defer the physical free to
    /// undo release; non-transactional deletes free immediately. Returns
    /// false if there is no live tuple at the address.
    pub fn delete_tuple_for_undo(&mut self, addr: TupleAddress, txnal: bool) -> bool {
        {
            let Some(block) = self.inner.blocks.get_mut(&addr.block) else {
                return false;
            };
            match block.slot(addr.slot) {
                Some(slot) if slot.flags().is_live() => {}
                _ => return false,
            }
            if txnal {
                block.mark_pending_delete_on_undo(addr.slot);
            } else {
                block.clear_slot(addr.slot);
            }
        }
        if txnal {
            self.inner.undo.push(addr);
        }
        self.inner.active_tuples -= 1;
        true
    }

    // =========================================================================
    // Accounting
    // =========================================================================

    /// All block ids in the directory, in address order
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.inner.blocks.keys().copied().collect()
    }

    /// Number of logically live tuples in the table
    pub fn active_tuple_count(&self) -> i64 {
        self.inner.active_tuples
    }

    /// Verify block bookkeeping invariants
    ///
    /// Pending sets must be subsets of the block directory and per-block
    /// live counts must sum to the table's active tuple count.
    pub fn block_count_consistent(&self) -> bool {
        self.inner.block_count_consistent()
    }

    // =========================================================================
    // Cursor support
    // =========================================================================

    /// Pending-scan block ids in address order (cursor seed)
    pub(crate) fn snapshot_pending_ids(&self) -> BTreeSet<BlockId> {
        self.inner.snapshot.pending.iter().copied().collect()
    }

    /// First block id past the activation horizon
    pub(crate) fn snapshot_horizon(&self) -> BlockId {
        self.inner.snapshot.horizon
    }

    /// Number of materialized slots in a block
    pub(crate) fn block_slot_count(&self, id: BlockId) -> Option<u32> {
        self.inner.blocks.get(&id).map(|b| b.slot_count())
    }

    /// Flags of a slot, if the block and slot exist
    pub(crate) fn slot_flags(&self, addr: TupleAddress) -> Option<TupleFlags> {
        self.inner.slot(addr).map(|s| s.flags())
    }

    /// Clone of a slot's row payload
    pub(crate) fn slot_row(&self, addr: TupleAddress) -> Option<Row> {
        self.inner.slot(addr).map(|s| s.row().clone())
    }

    /// Whether the slot at the address is flagged pending-delete
    pub(crate) fn is_pending_delete(&self, addr: TupleAddress) -> bool {
        self.slot_flags(addr).is_some_and(|f| f.is_pending_delete())
    }

    /// Whether the slot at the address is deferred to undo release
    pub(crate) fn is_pending_delete_on_undo_release(&self, addr: TupleAddress) -> bool {
        self.slot_flags(addr)
            .is_some_and(|f| f.is_pending_delete_on_undo_release())
    }
}
