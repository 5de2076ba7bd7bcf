// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

use reedtree::BTreeBuilder;
use tempfile::tempdir;

#[test]
fn duplicate_handling() {
    // S2: degree 4, insert 5,5,5.
    let dir = tempdir().unwrap();
    let tree = BTreeBuilder::new()
        .path(dir.path().join("tree"))
        .degree(4)
        .key_size_bytes(64)
        .build::<i64>()
        .unwrap();

    tree.add(5).unwrap();
    tree.add(5).unwrap();
    tree.add(5).unwrap();

    assert_eq!(tree.iterate().collect::<Vec<_>>(), vec![5, 5, 5]);
    assert_eq!(tree.find(&5).unwrap(), Some(5));
    assert_eq!(tree.delete(&5).unwrap(), 3);
    assert_eq!(tree.find(&5).unwrap(), None);
}

#[test]
fn persistence_round_trip() {
    // S4: degree 3, insert 1..=50, close, reopen, verify.
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree");

    {
        let tree = BTreeBuilder::new()
            .path(&path)
            .degree(3)
            .key_size_bytes(64)
            .build::<i64>()
            .unwrap();
        for v in 1..=50i64 {
            tree.add(v).unwrap();
        }
    }

    let reopened = BTreeBuilder::new()
        .path(&path)
        .build::<i64>()
        .unwrap();
    assert_eq!(
        reopened.iterate().collect::<Vec<_>>(),
        (1..=50).collect::<Vec<i64>>()
    );
    assert_eq!(reopened.find(&37).unwrap(), Some(37));
}

#[test]
fn cache_eviction_bounds_resident_count() {
    // S5: degree 3, cacheSize 2, insert 1..=100, iterate all.
    let dir = tempdir().unwrap();
    let tree = BTreeBuilder::new()
        .path(dir.path().join("tree"))
        .degree(3)
        .key_size_bytes(64)
        .cache_size(2)
        .build::<i64>()
        .unwrap();

    for v in 1..=100i64 {
        tree.add(v).unwrap();
        assert!(tree.cached_node_count() <= 2);
    }

    let collected: Vec<i64> = tree.iterate().collect();
    assert_eq!(collected, (1..=100).collect::<Vec<i64>>());
    assert!(tree.cached_node_count() <= 2);
}

#[test]
fn delete_is_a_mark_not_a_rebalance() {
    // S6: insert 1..=10, delete 5.
    let dir = tempdir().unwrap();
    let tree = BTreeBuilder::new()
        .path(dir.path().join("tree"))
        .degree(4)
        .key_size_bytes(64)
        .build::<i64>()
        .unwrap();

    for v in 1..=10i64 {
        tree.add(v).unwrap();
    }

    assert_eq!(tree.delete(&5).unwrap(), 1);
    assert_eq!(tree.find(&5).unwrap(), None);
    assert_eq!(
        tree.iterate().collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 6, 7, 8, 9, 10]
    );
}

#[test]
fn order_independence_of_the_stored_multiset() {
    // Invariant 5: insertion order does not change the in-order sequence.
    let dir_a = tempdir().unwrap();
    let tree_a = BTreeBuilder::new()
        .path(dir_a.path().join("tree"))
        .degree(5)
        .key_size_bytes(64)
        .build::<i64>()
        .unwrap();
    for v in [7, 3, 9, 1, 5, 2, 8, 4, 6, 0] {
        tree_a.add(v).unwrap();
    }

    let dir_b = tempdir().unwrap();
    let tree_b = BTreeBuilder::new()
        .path(dir_b.path().join("tree"))
        .degree(5)
        .key_size_bytes(64)
        .build::<i64>()
        .unwrap();
    for v in 0..10i64 {
        tree_b.add(v).unwrap();
    }

    assert_eq!(
        tree_a.iterate().collect::<Vec<_>>(),
        tree_b.iterate().collect::<Vec<_>>()
    );
}

#[test]
fn find_reflects_add_and_delete() {
    // Invariant 4: find(v).is_some() iff v was added and not deleted.
    let dir = tempdir().unwrap();
    let tree = BTreeBuilder::new()
        .path(dir.path().join("tree"))
        .degree(4)
        .key_size_bytes(64)
        .build::<i64>()
        .unwrap();

    assert_eq!(tree.find(&1).unwrap(), None);
    tree.add(1).unwrap();
    assert_eq!(tree.find(&1).unwrap(), Some(1));
    tree.delete(&1).unwrap();
    assert_eq!(tree.find(&1).unwrap(), None);
}
