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

//! Copy-on-write cursor over live blocks
//!
//! The cursor walks the activation-time block set in address order, skipping
//! inactive slots and dirty tuples. It is the authority on "has the scan
//! read past this slot?" - the question the notification protocol asks to
//! decide whether a mutation needs its pre-image preserved.
//!
//! Side effect contract: exhausting a block hands it back to the table's
//! non-pending list through the surgeon. The hand-back happens on the `next`
//! call that walks past the block's end, one call after the block's last
//! tuple was emitted; [`CowCursor::finalize`] exists so a caller that knows
//! the scan is complete can flush that last hand-back without a speculative
//! `next`.

use std::collections::BTreeSet;

use crate::core::Row;
use crate::storage::block::{BlockId, TupleAddress};
use crate::storage::surgeon::TableSurgeon;

/// Cursor over the blocks a snapshot scan still has to visit
pub struct CowCursor {
    /// Blocks not yet entered, in address order
    remaining: BTreeSet<BlockId>,
    /// Block currently being walked
    current: Option<BlockId>,
    /// Next slot index to examine in the current block
    next_slot: u32,
    /// Blocks at or past this id were allocated after activation
    horizon: BlockId,
    /// Candidate slots rejected because the tuple was dirty
    skipped_dirty_rows: u64,
    /// Candidate slots rejected because the slot was inactive
    skipped_inactive_rows: u64,
}

impl CowCursor {
    /// Build a cursor over the surgeon's pending-scan block set
    pub fn new(surgeon: &TableSurgeon<'_>) -> Self {
        Self {
            remaining: surgeon.snapshot_pending_ids(),
            current: None,
            next_slot: 0,
            horizon: surgeon.snapshot_horizon(),
            skipped_dirty_rows: 0,
            skipped_inactive_rows: 0,
        }
    }

    /// Emit the next live, clean tuple, or None when the live pass is done
    pub fn next(&mut self, surgeon: &mut TableSurgeon<'_>) -> Option<(TupleAddress, Row)> {
        loop {
            let block_id = match self.current {
                Some(id) => id,
                None => {
                    let id = self.remaining.pop_first()?;
                    self.current = Some(id);
                    self.next_slot = 0;
                    id
                }
            };

            let Some(slot_count) = surgeon.block_slot_count(block_id) else {
                // The block vanished without a compaction notification;
                // nothing to hand back.
                self.current = None;
                continue;
            };

            while self.next_slot < slot_count {
                let addr = TupleAddress::new(block_id, self.next_slot);
                self.next_slot += 1;
                let Some(flags) = surgeon.slot_flags(addr) else {
                    self.skipped_inactive_rows += 1;
                    continue;
                };
                if !flags.is_active() {
                    self.skipped_inactive_rows += 1;
                    continue;
                }
                if flags.is_dirty() {
                    self.skipped_dirty_rows += 1;
                    continue;
                }
                match surgeon.slot_row(addr) {
                    Some(row) => return Some((addr, row)),
                    None => {
                        self.skipped_inactive_rows += 1;
                        continue;
                    }
                }
            }

            // Walked past the end: hand the block back before moving on
            let next = self.remaining.first().copied();
            surgeon.snapshot_finished_scanning_block(block_id, next);
            self.current = None;
        }
    }

    /// True iff the cursor has not yet read past the slot at `addr`
    ///
    /// This is the oracle the notification protocol uses: a mutation to a
    /// not-yet-passed slot must preserve its pre-image, a mutation behind
    /// the cursor needs nothing. Blocks past the activation horizon were
    /// allocated after the snapshot began; the cursor will never visit them,
    /// and their tuples are treated as not-passed so inserts there get
    /// dirty-marked.
    pub fn need_to_dirty_tuple(&self, addr: TupleAddress) -> bool {
        if self.current == Some(addr.block) {
            return addr.slot >= self.next_slot;
        }
        if self.remaining.contains(&addr.block) {
            return true;
        }
        addr.block >= self.horizon
    }

    /// Repair the cursor after `block` was compacted out of existence
    ///
    /// The table has already relocated the block's contents and is about to
    /// recycle its memory; the cursor must not touch it again. Whatever the
    /// cursor would still have emitted from it now reaches the scan either
    /// dirty-marked at its new address or as a preserved pre-image, so
    /// dropping the block keeps the remaining-emission set intact.
    pub fn notify_block_was_compacted_away(&mut self, block: BlockId) {
        if self.current == Some(block) {
            // The table retires the block from the pending sets itself;
            // no hand-back for freed memory.
            self.current = None;
        } else {
            self.remaining.remove(&block);
        }
    }

    /// Count the tuples this cursor would still emit if nothing mutated
    pub fn count_remaining(&self, surgeon: &TableSurgeon<'_>) -> u64 {
        let mut count = 0;
        if let Some(block_id) = self.current {
            count += self.count_block(surgeon, block_id, self.next_slot);
        }
        for &block_id in &self.remaining {
            count += self.count_block(surgeon, block_id, 0);
        }
        count
    }

    fn count_block(&self, surgeon: &TableSurgeon<'_>, block_id: BlockId, from_slot: u32) -> u64 {
        let Some(slot_count) = surgeon.block_slot_count(block_id) else {
            return 0;
        };
        let mut count = 0;
        for slot in from_slot..slot_count {
            let addr = TupleAddress::new(block_id, slot);
            if let Some(flags) = surgeon.slot_flags(addr) {
                if flags.is_active() && !flags.is_dirty() {
                    count += 1;
                }
            }
        }
        count
    }

    /// Flush all outstanding block hand-backs
    ///
    /// Called when the scan's tuple countdown reaches zero: every slot the
    /// cursor has not examined must be inactive or dirty, so the held block
    /// and any remaining ones can be returned immediately instead of waiting
    /// for one more `next` call to walk past them.
    pub fn finalize(&mut self, surgeon: &mut TableSurgeon<'_>) {
        if let Some(block_id) = self.current.take() {
            self.skip_to_end(surgeon, block_id, self.next_slot);
            let next = self.remaining.first().copied();
            surgeon.snapshot_finished_scanning_block(block_id, next);
        }
        while let Some(block_id) = self.remaining.pop_first() {
            self.skip_to_end(surgeon, block_id, 0);
            let next = self.remaining.first().copied();
            surgeon.snapshot_finished_scanning_block(block_id, next);
        }
    }

    fn skip_to_end(&mut self, surgeon: &TableSurgeon<'_>, block_id: BlockId, from_slot: u32) {
        let Some(slot_count) = surgeon.block_slot_count(block_id) else {
            return;
        };
        for slot in from_slot..slot_count {
            let addr = TupleAddress::new(block_id, slot);
            match surgeon.slot_flags(addr) {
                Some(flags) if flags.is_active() => {
                    debug_assert!(
                        flags.is_dirty(),
                        "finalize abandoned a live clean tuple at {addr}"
                    );
                    self.skipped_dirty_rows += 1;
                }
                _ => self.skipped_inactive_rows += 1,
            }
        }
    }

    /// Block the cursor is currently positioned on
    pub fn current_block(&self) -> Option<BlockId> {
        self.current
    }

    /// Candidate slots rejected because the tuple was dirty
    pub fn skipped_dirty_rows(&self) -> u64 {
        self.skipped_dirty_rows
    }

    /// Candidate slots rejected because the slot was inactive
    pub fn skipped_inactive_rows(&self) -> u64 {
        self.skipped_inactive_rows
    }
}
