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

//! Block-structured persistent table
//!
//! [`BlockTable`] owns the block directory and the mutation API. Every
//! mutation is announced to the registered snapshot scan contexts before it
//! becomes observable; delete verdicts combine by logical AND, so a tuple is
//! physically freed only when every context has either emitted it or backed
//! it up. Compaction relocates live tuples through the same notification
//! path, which is what lets a long-running snapshot scan survive blocks
//! disappearing underneath its cursor.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::core::{Error, Result, Row, Schema};

use super::block::{Block, BlockId, TupleAddress, TupleFlags, TupleSlot};
use super::config::TableConfig;
use super::cow::context::CowContext;
use super::cow::stream::SnapshotScan;
use super::surgeon::TableSurgeon;

/// Snapshot bookkeeping shared by the table and the surgeon
pub(crate) struct SnapshotState {
    pub(crate) active: bool,
    /// Blocks not yet handed back by a scan cursor
    pub(crate) pending: FxHashSet<BlockId>,
    /// Bulk-loaded blocks staged during an active snapshot
    pub(crate) pending_load: FxHashSet<BlockId>,
    /// First block id allocated after activation
    pub(crate) horizon: BlockId,
}

impl SnapshotState {
    fn new() -> Self {
        Self {
            active: false,
            pending: FxHashSet::default(),
            pending_load: FxHashSet::default(),
            horizon: BlockId(0),
        }
    }
}

/// Lock-protected table state
pub(crate) struct TableInner {
    pub(crate) block_capacity: u32,
    pub(crate) blocks: BTreeMap<BlockId, Block>,
    pub(crate) next_block: u64,
    pub(crate) active_tuples: i64,
    pub(crate) snapshot: SnapshotState,
    /// For-undo deletes awaiting release or rollback
    pub(crate) undo: Vec<TupleAddress>,
}

impl TableInner {
    fn new(block_capacity: u32) -> Self {
        Self {
            block_capacity,
            blocks: BTreeMap::new(),
            next_block: 0,
            active_tuples: 0,
            snapshot: SnapshotState::new(),
            undo: Vec::new(),
        }
    }

    fn alloc_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(id, Block::new(id, self.block_capacity));
        id
    }

    /// Lowest-addressed block with a free slot
    fn insert_target(&self) -> Option<BlockId> {
        self.blocks
            .values()
            .find(|b| b.has_capacity())
            .map(|b| b.id())
    }

    pub(crate) fn slot(&self, addr: TupleAddress) -> Option<&TupleSlot> {
        self.blocks.get(&addr.block)?.slot(addr.slot)
    }

    pub(crate) fn slot_mut(&mut self, addr: TupleAddress) -> Option<&mut TupleSlot> {
        self.blocks.get_mut(&addr.block)?.slot_mut(addr.slot)
    }

    pub(crate) fn block_count_consistent(&self) -> bool {
        let directory_has = |id: &BlockId| self.blocks.contains_key(id);
        if !self.snapshot.pending.iter().all(directory_has) {
            return false;
        }
        if !self.snapshot.pending_load.iter().all(directory_has) {
            return false;
        }
        let live: i64 = self.blocks.values().map(|b| b.live_count() as i64).sum();
        live == self.active_tuples
    }
}

/// A registered snapshot scan context
pub(crate) struct ContextHandle {
    pub(crate) id: u64,
    pub(crate) ctx: Arc<Mutex<CowContext>>,
}

/// Partitioned in-memory tuple table backed by fixed-size blocks
///
/// One engine thread owns a table: mutations and snapshot scan advances are
/// interleaved, never concurrent. The locks exist because the table is
/// shared engine-wide, not to serialize within a scan.
pub struct BlockTable {
    name: String,
    schema: Schema,
    config: TableConfig,
    pub(crate) inner: RwLock<TableInner>,
    pub(crate) contexts: Mutex<Vec<ContextHandle>>,
    next_context_id: AtomicU64,
}

impl BlockTable {
    /// Create an empty table
    pub fn new(name: impl Into<String>, schema: Schema, config: TableConfig) -> Self {
        let block_capacity = config.block_capacity;
        Self {
            name: name.into(),
            schema,
            config,
            inner: RwLock::new(TableInner::new(block_capacity)),
            contexts: Mutex::new(Vec::new()),
            next_context_id: AtomicU64::new(0),
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table kind, as reported in snapshot diagnostics
    pub fn kind(&self) -> &'static str {
        "persistent"
    }

    /// Table schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Table configuration
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    // =========================================================================
    // Mutation API
    // =========================================================================

    /// Insert a tuple, returning its address
    pub fn insert(&self, row: Row) -> Result<TupleAddress> {
        self.schema.validate_row(&row)?;
        let mut inner = self.inner.write();
        let target = match inner.insert_target() {
            Some(id) => id,
            None => inner.alloc_block(),
        };
        let block = inner
            .blocks
            .get_mut(&target)
            .expect("insert target must exist");
        let slot_idx = block.place(row, TupleFlags::active());
        let addr = TupleAddress::new(target, slot_idx);
        inner.active_tuples += 1;

        // Announce before the tuple is observable outside the table lock
        let slot = inner.slot_mut(addr).expect("placed slot must exist");
        for handle in self.contexts.lock().iter() {
            handle.ctx.lock().on_tuple_insert(addr, slot);
        }
        Ok(addr)
    }

    /// Update the tuple at `addr` in place
    pub fn update(&self, addr: TupleAddress, row: Row) -> Result<()> {
        self.schema.validate_row(&row)?;
        let mut inner = self.inner.write();
        let slot = match inner.slot_mut(addr) {
            Some(slot) if slot.flags().is_live() => slot,
            _ => return Err(Error::TupleNotFound(addr)),
        };

        // Contexts read the pre-image out of the slot, so they must run
        // before the new values land.
        for handle in self.contexts.lock().iter() {
            handle.ctx.lock().on_tuple_update(addr, slot);
        }
        slot.row = row;
        Ok(())
    }

    /// Delete the tuple at `addr`
    ///
    /// Physical storage is freed immediately only if every registered scan
    /// context agrees; otherwise the slot is flagged pending-delete and the
    /// scan that still needs the pre-image frees it later through
    /// `cleanup_tuple`.
    pub fn delete(&self, addr: TupleAddress) -> Result<()> {
        let mut inner = self.inner.write();
        let allow = {
            let slot = match inner.slot(addr) {
                Some(slot) if slot.flags().is_live() => slot,
                _ => return Err(Error::TupleNotFound(addr)),
            };
            let mut allow = true;
            for handle in self.contexts.lock().iter() {
                allow &= handle.ctx.lock().on_tuple_delete(addr, slot);
            }
            allow
        };

        let block = inner
            .blocks
            .get_mut(&addr.block)
            .expect("checked block must exist");
        if allow {
            block.clear_slot(addr.slot);
        } else {
            block.mark_pending_delete(addr.slot);
        }
        inner.active_tuples -= 1;
        Ok(())
    }

    /// Bulk-load rows into fresh, densely packed blocks
    ///
    /// Loaded blocks never top off existing ones. During an active snapshot
    /// the fresh blocks pass through the pending-load set while their tuples
    /// are dirty-marked, then are handed straight back: they hold only
    /// post-activation rows and the cursor has nothing to read there.
    pub fn load_rows(&self, rows: &[Row]) -> Result<Vec<TupleAddress>> {
        for row in rows {
            self.schema.validate_row(row)?;
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut inner = self.inner.write();
        let capacity = inner.block_capacity as usize;
        let mut addrs = Vec::with_capacity(rows.len());
        let mut new_blocks = Vec::new();
        for chunk in rows.chunks(capacity) {
            let id = inner.alloc_block();
            new_blocks.push(id);
            let block = inner.blocks.get_mut(&id).expect("fresh block must exist");
            for row in chunk {
                let slot_idx = block.place(row.clone(), TupleFlags::active());
                addrs.push(TupleAddress::new(id, slot_idx));
            }
        }
        inner.active_tuples += rows.len() as i64;

        let snapshot_active = inner.snapshot.active;
        if snapshot_active {
            for id in &new_blocks {
                inner.snapshot.pending_load.insert(*id);
            }
        }

        {
            let contexts = self.contexts.lock();
            if !contexts.is_empty() {
                for addr in &addrs {
                    let slot = inner.slot_mut(*addr).expect("loaded slot must exist");
                    for handle in contexts.iter() {
                        handle.ctx.lock().on_tuple_insert(*addr, slot);
                    }
                }
            }
        }

        if snapshot_active {
            let mut surgeon = TableSurgeon::new(&mut inner);
            for id in new_blocks {
                surgeon.snapshot_finished_scanning_block(id, None);
            }
        }
        Ok(addrs)
    }

    /// Compact `source` out of existence, relocating its live tuples into
    /// holes elsewhere
    ///
    /// Returns the relocation map (old address, new address). Under an
    /// active snapshot each relocation is announced through the update
    /// notification before the move, so a pre-image of every un-passed tuple
    /// lands in the side table; the relocated instance is dirty-marked so no
    /// cursor can emit it again at its new address. Pending-delete tuples
    /// are reclaimed here instead of relocated: their pre-image is already
    /// secured, and nothing else will free them once their address is gone.
    pub fn compact_block(&self, source: BlockId) -> Result<Vec<(TupleAddress, TupleAddress)>> {
        let mut inner = self.inner.write();
        let mut source_block = inner
            .blocks
            .remove(&source)
            .ok_or(Error::BlockNotFound(source))?;
        let snapshot_active = inner.snapshot.active;

        let mut staged: SmallVec<[(u32, Row, TupleFlags); 16]> = SmallVec::new();
        {
            let contexts = self.contexts.lock();
            for (idx, slot) in source_block.slots_mut() {
                if !slot.flags().is_active() {
                    continue;
                }
                let addr = TupleAddress::new(source, idx);
                for handle in contexts.iter() {
                    handle.ctx.lock().on_tuple_update(addr, slot);
                }
                let flags = slot.flags();
                if flags.is_pending_delete() && !flags.is_pending_delete_on_undo_release() {
                    continue;
                }
                staged.push((idx, std::mem::take(&mut slot.row), flags));
            }
        }

        let mut moves = Vec::with_capacity(staged.len());
        for (old_idx, row, mut flags) in staged {
            if snapshot_active {
                flags.set(TupleFlags::DIRTY);
            }
            let target = match inner.insert_target() {
                Some(id) => id,
                None => inner.alloc_block(),
            };
            let block = inner
                .blocks
                .get_mut(&target)
                .expect("relocation target must exist");
            let slot_idx = block.place(row, flags);
            moves.push((
                TupleAddress::new(source, old_idx),
                TupleAddress::new(target, slot_idx),
            ));
        }

        // For-undo deletes record addresses; keep the undo log pointing at
        // the relocated slots.
        if !inner.undo.is_empty() {
            for entry in inner.undo.iter_mut() {
                if let Some((_, new_addr)) = moves.iter().find(|(old, _)| *old == *entry) {
                    *entry = *new_addr;
                }
            }
        }

        // Announce after the contents moved, before the memory is recycled
        for handle in self.contexts.lock().iter() {
            handle.ctx.lock().on_block_compacted_away(source);
        }
        inner.snapshot.pending.remove(&source);
        inner.snapshot.pending_load.remove(&source);
        log::debug!(
            "table {}: compacted {}, relocated {} tuples",
            self.name,
            source,
            moves.len()
        );
        drop(source_block);
        Ok(moves)
    }

    // =========================================================================
    // Undo log
    // =========================================================================

    /// Release all for-undo deletes, freeing their storage
    pub fn release_undo(&self) -> usize {
        let mut inner = self.inner.write();
        let undo = std::mem::take(&mut inner.undo);
        let released = undo.len();
        for addr in undo {
            if let Some(block) = inner.blocks.get_mut(&addr.block) {
                let eligible = block
                    .slot(addr.slot)
                    .is_some_and(|s| s.flags().is_pending_delete_on_undo_release());
                if eligible {
                    block.clear_slot(addr.slot);
                }
            }
        }
        released
    }

    /// Roll back all for-undo deletes, restoring the tuples
    pub fn rollback_undo(&self) -> usize {
        let mut inner = self.inner.write();
        let undo = std::mem::take(&mut inner.undo);
        let mut restored = 0;
        for addr in undo {
            if let Some(block) = inner.blocks.get_mut(&addr.block) {
                if block.unmark_pending_delete_on_undo(addr.slot) {
                    restored += 1;
                }
            }
        }
        inner.active_tuples += restored as i64;
        restored
    }

    // =========================================================================
    // Snapshot scans
    // =========================================================================

    /// Begin a snapshot scan expecting the current active tuple count
    pub fn begin_snapshot(&self) -> SnapshotScan<'_> {
        let total = self.inner.read().active_tuples;
        self.make_scan(total)
    }

    /// Begin a snapshot scan without tuple count tracking (test mode)
    pub fn begin_snapshot_untracked(&self) -> SnapshotScan<'_> {
        self.make_scan(-1)
    }

    fn make_scan(&self, total_tuples: i64) -> SnapshotScan<'_> {
        let ctx = CowContext::new(
            self.name.clone(),
            self.kind(),
            self.config.partition_column,
            total_tuples,
        );
        let id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        SnapshotScan::new(self, id, Arc::new(Mutex::new(ctx)))
    }

    /// Abort snapshot mode after an abandoned scan
    ///
    /// Dropping a [`SnapshotScan`] mid-scan deregisters its context but
    /// leaves the surgeon in snapshot mode; the owner calls this to disarm.
    pub fn abort_snapshot(&self) {
        self.contexts.lock().clear();
        let mut inner = self.inner.write();
        TableSurgeon::new(&mut inner).deactivate_snapshot();
    }

    pub(crate) fn register_context(&self, handle: ContextHandle) {
        self.contexts.lock().push(handle);
    }

    /// Deregister a context; returns true if it was the last one
    pub(crate) fn deregister_context(&self, id: u64) -> bool {
        let mut contexts = self.contexts.lock();
        contexts.retain(|h| h.id != id);
        contexts.is_empty()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of logically live tuples
    pub fn active_tuple_count(&self) -> i64 {
        self.inner.read().active_tuples
    }

    /// Number of blocks in the directory
    pub fn block_count(&self) -> usize {
        self.inner.read().blocks.len()
    }

    /// All block ids in address order
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.inner.read().blocks.keys().copied().collect()
    }

    /// Clone of the live row at `addr`, if any
    pub fn read_row(&self, addr: TupleAddress) -> Option<Row> {
        let inner = self.inner.read();
        inner
            .slot(addr)
            .filter(|s| s.flags().is_live())
            .map(|s| s.row().clone())
    }

    /// Verify block bookkeeping invariants
    pub fn block_count_consistent(&self) -> bool {
        self.inner.read().block_count_consistent()
    }
}
