// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::thread;

use reedtree::BTreeBuilder;
use tempfile::tempdir;

#[test]
fn concurrent_readers_observe_a_stable_prefix_during_writes() {
    // Invariant 8: concurrent readers never crash or see garbage while a
    // single writer inserts, and every value present before the run
    // started is still found afterward.
    let dir = tempdir().unwrap();
    let tree = Arc::new(
        BTreeBuilder::new()
            .path(dir.path().join("tree"))
            .degree(8)
            .key_size_bytes(64)
            .build::<i64>()
            .unwrap(),
    );

    for v in 0..50i64 {
        tree.add(v).unwrap();
    }

    let reader_trees: Vec<_> = (0..4).map(|_| tree.clone()).collect();
    let readers: Vec<_> = reader_trees
        .into_iter()
        .map(|t| {
            thread::spawn(move || {
                for _ in 0..200 {
                    let _ = t.find(&25);
                    let _: Vec<i64> = t.iterate().collect();
                }
            })
        })
        .collect();

    let writer_tree = tree.clone();
    let writer = thread::spawn(move || {
        for v in 50..150i64 {
            writer_tree.add(v).unwrap();
        }
    });

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    for v in 0..150i64 {
        assert_eq!(tree.find(&v).unwrap(), Some(v));
    }
    assert_eq!(
        tree.iterate().collect::<Vec<_>>(),
        (0..150).collect::<Vec<i64>>()
    );
}

#[test]
fn concurrent_add_and_delete_serialize_without_losing_counts() {
    let dir = tempdir().unwrap();
    let tree = Arc::new(
        BTreeBuilder::new()
            .path(dir.path().join("tree"))
            .degree(6)
            .key_size_bytes(64)
            .build::<i64>()
            .unwrap(),
    );

    for v in 0..20i64 {
        tree.add(v).unwrap();
    }

    let adder_tree = tree.clone();
    let adder = thread::spawn(move || {
        for v in 20..40i64 {
            adder_tree.add(v).unwrap();
        }
    });

    let deleter_tree = tree.clone();
    let deleter = thread::spawn(move || {
        for v in 0..10i64 {
            deleter_tree.delete(&v).unwrap();
        }
    });

    adder.join().unwrap();
    deleter.join().unwrap();

    let remaining = tree.iterate().collect::<Vec<_>>();
    assert_eq!(remaining, (10..40).collect::<Vec<i64>>());
}
