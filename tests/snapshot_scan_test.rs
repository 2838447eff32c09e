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

//! Snapshot scan tests without concurrent mutation
//!
//! A quiescent scan must emit exactly the activation-time row set, leave the
//! tuple countdown at zero, keep every mutation counter at zero, and
//! reconcile cleanly.

use cowtable::{BlockTable, DataType, Row, SchemaBuilder, TableConfig, Value};

fn test_schema() -> cowtable::Schema {
    SchemaBuilder::new("inventory")
        .column("id", DataType::Integer)
        .column("name", DataType::Text)
        .build()
}

fn row(id: i64, name: &str) -> Row {
    Row::from_values(vec![Value::integer(id), Value::text(name)])
}

fn ids_of(rows: &[Row]) -> Vec<i64> {
    let mut ids: Vec<i64> = rows
        .iter()
        .map(|r| r.get(0).and_then(Value::as_int64).unwrap())
        .collect();
    ids.sort_unstable();
    ids
}

#[test]
fn test_quiescent_scan_emits_all_rows() {
    let table = BlockTable::new("inventory", test_schema(), TableConfig::default());
    for (id, name) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        table.insert(row(id, name)).expect("insert failed");
    }

    let mut scan = table.begin_snapshot();
    scan.activate();
    assert_eq!(scan.tuples_remaining(), 4);

    let mut emitted = Vec::new();
    while let Some(tuple) = scan.advance() {
        scan.cleanup_tuple(&tuple, false);
        emitted.push(tuple.into_row());
    }

    assert_eq!(ids_of(&emitted), vec![1, 2, 3, 4]);
    assert_eq!(scan.tuples_remaining(), 0);

    let stats = scan.stats();
    assert_eq!(stats.inserts, 0);
    assert_eq!(stats.updates, 0);
    assert_eq!(stats.deletes, 0);
    assert_eq!(stats.blocks_compacted, 0);

    assert_eq!(scan.outcome(), Some(true));
    assert!(table.block_count_consistent());
}

#[test]
fn test_quiescent_scan_multi_block() {
    let table = BlockTable::new(
        "inventory",
        test_schema(),
        TableConfig::new().with_block_capacity(2),
    );
    for id in 0..7 {
        table.insert(row(id, "r")).expect("insert failed");
    }
    assert_eq!(table.block_count(), 4);

    let mut scan = table.begin_snapshot();
    scan.activate();

    let mut emitted = Vec::new();
    while let Some(tuple) = scan.advance() {
        scan.cleanup_tuple(&tuple, false);
        emitted.push(tuple.into_row());
    }

    assert_eq!(ids_of(&emitted), (0..7).collect::<Vec<_>>());
    assert_eq!(scan.outcome(), Some(true));
    assert!(table.block_count_consistent());
}

#[test]
fn test_scan_of_empty_table() {
    let table = BlockTable::new("inventory", test_schema(), TableConfig::default());

    let mut scan = table.begin_snapshot();
    scan.activate();
    assert_eq!(scan.tuples_remaining(), 0);
    assert!(scan.advance().is_none());
    assert_eq!(scan.outcome(), Some(true));
}

#[test]
fn test_activation_is_idempotent_after_completion() {
    let table = BlockTable::new("inventory", test_schema(), TableConfig::default());
    table.insert(row(1, "a")).unwrap();

    let mut scan = table.begin_snapshot();
    scan.activate();
    while let Some(tuple) = scan.advance() {
        scan.cleanup_tuple(&tuple, false);
    }
    assert_eq!(scan.outcome(), Some(true));

    // finished && remaining == 0: a further activate must be a no-op
    scan.activate();
    assert!(scan.advance().is_none());
    assert_eq!(scan.outcome(), Some(true));
}

#[test]
fn test_untracked_mode_clamps_to_zero() {
    let table = BlockTable::new("inventory", test_schema(), TableConfig::default());
    for id in 0..5 {
        table.insert(row(id, "r")).unwrap();
    }

    let mut scan = table.begin_snapshot_untracked();
    scan.activate();
    assert_eq!(scan.tuples_remaining(), -1);

    let mut count = 0;
    while let Some(tuple) = scan.advance() {
        scan.cleanup_tuple(&tuple, false);
        count += 1;
    }
    assert_eq!(count, 5);

    // Reconciliation forces the untracked countdown to zero and succeeds
    assert_eq!(scan.tuples_remaining(), 0);
    assert_eq!(scan.outcome(), Some(true));
}

#[test]
fn test_batched_scan_counts_serialization_batches() {
    let table = BlockTable::new("inventory", test_schema(), TableConfig::default());
    for id in 0..10 {
        table.insert(row(id, "r")).unwrap();
    }

    let mut scan = table.begin_snapshot();
    scan.activate();

    let mut all = Vec::new();
    let mut batches = 0;
    loop {
        let produced = scan.next_batch(&mut all, 4);
        if produced == 0 {
            break;
        }
        batches += 1;
        assert!(produced <= 4);
    }

    assert_eq!(batches, 3); // 4 + 4 + 2
    assert_eq!(ids_of(&all), (0..10).collect::<Vec<_>>());
    assert_eq!(scan.stats().serialization_batches, 3);
    assert_eq!(scan.outcome(), Some(true));
}

#[test]
fn test_abandoned_scan_leaves_snapshot_mode_armed() {
    let table = BlockTable::new("inventory", test_schema(), TableConfig::default());
    for id in 0..4 {
        table.insert(row(id, "r")).unwrap();
    }

    {
        let mut scan = table.begin_snapshot();
        scan.activate();
        let tuple = scan.advance().expect("first advance must emit");
        scan.cleanup_tuple(&tuple, false);
        // Dropped mid-scan
    }

    // The owner is responsible for informing the surgeon of the abort
    table.abort_snapshot();
    assert!(table.block_count_consistent());

    // A fresh scan over the same table works
    let mut scan = table.begin_snapshot();
    scan.activate();
    let mut emitted = Vec::new();
    while let Some(tuple) = scan.advance() {
        scan.cleanup_tuple(&tuple, false);
        emitted.push(tuple.into_row());
    }
    assert_eq!(ids_of(&emitted), vec![0, 1, 2, 3]);
    assert_eq!(scan.outcome(), Some(true));
}
