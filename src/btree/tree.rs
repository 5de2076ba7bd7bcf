// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Top-level coordinator: owns the root, serializes writers, runs the
//! flush queue, and persists metadata.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::btree::builder::BTreeBuilder;
use crate::btree::cache::NodeCache;
use crate::btree::iter::BTreeIter;
use crate::btree::key::Key;
use crate::btree::node::Node;
use crate::btree::noderef::NodeRef;
use crate::btree::storage::{self, MetadataFrame, Storage};
use crate::error::ReedResult;

/// A persistent, on-disk B-tree storing an ordered multiset of
/// comparable, serializable values.
///
/// `add`/`delete` serialize against each other through a single writer
/// monitor; `find`/`iterate` never acquire it and may observe a tree
/// that is being concurrently mutated (see the crate's concurrency
/// notes).
pub struct BTree<T> {
    degree: u32,
    key_size_bytes: usize,
    storage: Arc<Storage<T>>,
    cache: Arc<NodeCache<T>>,
    root: RwLock<Arc<NodeRef<T>>>,
    writer_monitor: Mutex<()>,
}

impl<T> BTree<T>
where
    T: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn open(builder: BTreeBuilder) -> ReedResult<Self> {
        let base_path = builder.require_path()?;
        let degree_hint = builder.degree;
        let cache = Arc::new(NodeCache::new(builder.cache_size));

        // A Storage needs its slot size before we know the adopted
        // degree, so probe metadata directly first.
        let probe_metadata_path = {
            let mut name = base_path.clone().into_os_string();
            name.push(".metadata");
            std::path::PathBuf::from(name)
        };
        let metadata = storage::read_metadata(&probe_metadata_path)?;

        let (degree, storage_file_number, root_position, key_size_bytes) = match metadata {
            Some(frame) => (
                frame.degree as u32,
                frame.storage_file_number as u64,
                Some(crate::btree::position::Position::new(
                    frame.root_file_number as u64,
                    frame.root_offset as u64,
                )),
                frame.key_size_bytes as usize,
            ),
            None => (degree_hint, 0, None, builder.key_size_bytes),
        };

        let slot_size = degree as usize * key_size_bytes;
        let storage = Arc::new(Storage::new(base_path, slot_size, storage_file_number));

        let root = match root_position {
            Some(position) => {
                let node_ref = cache.get_or_create(position, degree);
                node_ref.set_is_root(true);
                node_ref
            }
            None => Arc::new(NodeRef::new_fresh(Node::empty(degree), degree, true)),
        };

        let tree = Self {
            degree,
            key_size_bytes,
            storage,
            cache,
            root: RwLock::new(root),
            writer_monitor: Mutex::new(()),
        };

        if root_position.is_none() {
            let mut queue = VecDeque::new();
            queue.push_back(tree.root.read().unwrap().clone());
            tree.storage.save(&mut queue, &tree.cache)?;
            tree.write_metadata()?;
        }

        Ok(tree)
    }

    fn write_metadata(&self) -> ReedResult<()> {
        let root = self.root.read().unwrap();
        let position = root
            .position()
            .expect("root always has a position once the tree has been opened");
        let frame = MetadataFrame {
            storage_file_number: self.storage.current_file_number() as i64,
            root_file_number: position.file_number as i64,
            root_offset: position.offset as i64,
            degree: self.degree as i32,
            key_size_bytes: self.key_size_bytes as i64,
        };
        storage::write_metadata(&self.storage.metadata_path(), &frame)
    }

    /// Inserts `value`, splitting and promoting a new root as needed.
    /// Returns `self` so callers can chain further mutations.
    pub fn add(&self, value: T) -> ReedResult<&Self> {
        let _guard = self.writer_monitor.lock().unwrap();
        let mut save_queue = VecDeque::new();
        let root = self.root.read().unwrap().clone();
        let key = Key::new(value);

        let separator = self.insert_recursive(&root, key, &mut save_queue)?;

        let new_root = if let Some(separator) = separator {
            root.set_is_root(false);
            let mut new_root_node = Node::empty(self.degree);
            new_root_node.insert_separator(separator);
            let new_root_ref = Arc::new(NodeRef::new_fresh(new_root_node, self.degree, true));
            save_queue.push_back(new_root_ref.clone());
            new_root_ref
        } else {
            root
        };

        self.storage.save(&mut save_queue, &self.cache)?;
        *self.root.write().unwrap() = new_root;
        self.write_metadata()?;
        Ok(self)
    }

    /// Convenience for inserting many values in order; equivalent to
    /// calling [`BTree::add`] once per value.
    pub fn add_all<I: IntoIterator<Item = T>>(&self, values: I) -> ReedResult<&Self> {
        for value in values {
            self.add(value)?;
        }
        Ok(self)
    }

    fn insert_recursive(
        &self,
        node_ref: &Arc<NodeRef<T>>,
        key: Key<T>,
        save_queue: &mut VecDeque<Arc<NodeRef<T>>>,
    ) -> ReedResult<Option<Key<T>>> {
        let is_leaf = node_ref.with_node(&self.storage, &self.cache, |n| Ok(n.is_leaf()))?;

        if is_leaf {
            node_ref.with_node_mut(&self.storage, &self.cache, |n| {
                n.insert_leaf(key);
                Ok(())
            })?;
        } else {
            let child = node_ref.with_node(&self.storage, &self.cache, |n| Ok(n.route(key.value())))?;
            if let Some(separator) = self.insert_recursive(&child, key, save_queue)? {
                node_ref.with_node_mut(&self.storage, &self.cache, |n| {
                    n.insert_separator(separator);
                    Ok(())
                })?;
            }
        }

        save_queue.push_back(node_ref.clone());

        let needs_split =
            node_ref.with_node(&self.storage, &self.cache, |n| Ok(n.needs_split()))?;
        if needs_split {
            let (mut separator, right_node) =
                node_ref.with_node_mut(&self.storage, &self.cache, |n| Ok(n.split()))?;
            let right_ref = Arc::new(NodeRef::new_fresh(right_node, self.degree, false));
            save_queue.push_back(right_ref.clone());
            separator.set_left(node_ref.clone());
            separator.set_right(right_ref);
            return Ok(Some(separator));
        }
        Ok(None)
    }

    /// Point lookup; acquires no monitor and may run concurrently with
    /// a writer.
    pub fn find(&self, value: &T) -> ReedResult<Option<T>> {
        let root = self.root.read().unwrap().clone();
        self.find_recursive(&root, value)
    }

    fn find_recursive(&self, node_ref: &Arc<NodeRef<T>>, value: &T) -> ReedResult<Option<T>> {
        let is_leaf = node_ref.with_node(&self.storage, &self.cache, |n| Ok(n.is_leaf()))?;
        if is_leaf {
            node_ref.with_node(&self.storage, &self.cache, |n| Ok(n.find_local(value)))
        } else {
            let child = node_ref.with_node(&self.storage, &self.cache, |n| Ok(n.route(value)))?;
            self.find_recursive(&child, value)
        }
    }

    /// Marks every stored value equal to `value` as deleted and returns
    /// how many were newly marked. Does not rebalance.
    pub fn delete(&self, value: &T) -> ReedResult<usize> {
        let _guard = self.writer_monitor.lock().unwrap();
        let mut save_queue = VecDeque::new();
        let root = self.root.read().unwrap().clone();
        let count = self.delete_recursive(&root, value, &mut save_queue)?;
        if count > 0 {
            self.storage.save(&mut save_queue, &self.cache)?;
        }
        Ok(count)
    }

    fn delete_recursive(
        &self,
        node_ref: &Arc<NodeRef<T>>,
        value: &T,
        save_queue: &mut VecDeque<Arc<NodeRef<T>>>,
    ) -> ReedResult<usize> {
        let is_leaf = node_ref.with_node(&self.storage, &self.cache, |n| Ok(n.is_leaf()))?;
        if is_leaf {
            let count =
                node_ref.with_node_mut(&self.storage, &self.cache, |n| Ok(n.delete_local(value)))?;
            if count > 0 {
                save_queue.push_back(node_ref.clone());
            }
            Ok(count)
        } else {
            let child = node_ref.with_node(&self.storage, &self.cache, |n| Ok(n.route(value)))?;
            self.delete_recursive(&child, value, save_queue)
        }
    }

    /// In-order traversal skipping deleted keys. Captures the current
    /// root at call time; concurrent mutation of deeper subtrees may be
    /// observed (see the crate's concurrency notes).
    pub fn iterate(&self) -> BTreeIter<T> {
        let root = self.root.read().unwrap().clone();
        BTreeIter::new(self.storage.clone(), self.cache.clone(), root)
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    /// Current resident count of the node cache; exposed for tests
    /// that assert the cache never exceeds its configured bound.
    pub fn cached_node_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &tempfile::TempDir, degree: u32) -> BTree<i64> {
        BTreeBuilder::new()
            .path(dir.path().join("tree"))
            .degree(degree)
            .key_size_bytes(64)
            .build::<i64>()
            .unwrap()
    }

    #[test]
    fn root_split_builds_expected_shape() {
        // S1: degree 3, insert 1,2,3 -> root has one key 2 with leaf
        // children [1] and [3].
        let dir = tempdir().unwrap();
        let tree = open(&dir, 3);
        tree.add(1).unwrap();
        tree.add(2).unwrap();
        tree.add(3).unwrap();

        let root = tree.root.read().unwrap().clone();
        let (values, left_keys, right_keys) = root
            .with_node(&tree.storage, &tree.cache, |n| {
                assert_eq!(n.key_count(), 1);
                let key = &n.keys()[0];
                let left = key.left().unwrap().clone();
                let right = key.right().unwrap().clone();
                Ok((*key.value(), left, right))
            })
            .unwrap();
        assert_eq!(values, 2);
        let left_vals = left_keys
            .with_node(&tree.storage, &tree.cache, |n| {
                Ok(n.keys().iter().map(|k| *k.value()).collect::<Vec<_>>())
            })
            .unwrap();
        let right_vals = right_keys
            .with_node(&tree.storage, &tree.cache, |n| {
                Ok(n.keys().iter().map(|k| *k.value()).collect::<Vec<_>>())
            })
            .unwrap();
        assert_eq!(left_vals, vec![1]);
        assert_eq!(right_vals, vec![3]);
        assert_eq!(tree.iterate().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn deep_split_builds_three_levels() {
        // S3: degree 3, insert 1..=7 -> root key 4, subtrees 1..3 / 5..7.
        let dir = tempdir().unwrap();
        let tree = open(&dir, 3);
        for v in 1..=7i64 {
            tree.add(v).unwrap();
        }
        let root = tree.root.read().unwrap().clone();
        let root_value = root
            .with_node(&tree.storage, &tree.cache, |n| {
                assert_eq!(n.key_count(), 1);
                Ok(*n.keys()[0].value())
            })
            .unwrap();
        assert_eq!(root_value, 4);
        assert_eq!(
            tree.iterate().collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5, 6, 7]
        );
    }
}
