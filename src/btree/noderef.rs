// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Lazy handle to a [`Node`], identified by [`Position`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::btree::cache::NodeCache;
use crate::btree::node::Node;
use crate::btree::position::Position;
use crate::btree::storage::Storage;
use crate::error::{ReedError, ReedResult};

/// Mediates on-demand loading of a [`Node`] from [`Storage`], and
/// publishes its identity (`position`, `is_root`) independently of
/// whether the node content is currently resident.
///
/// Every access to the underlying `Node` goes through [`NodeRef::with_node`]
/// or [`NodeRef::with_node_mut`] so the cache observes the touch.
pub struct NodeRef<T> {
    position: RwLock<Option<Position>>,
    is_root: AtomicBool,
    degree: u32,
    resident: RwLock<Option<Node<T>>>,
}

impl<T> NodeRef<T>
where
    T: Clone + Ord + Serialize + DeserializeOwned,
{
    /// A freshly created node that has not been written to storage yet.
    pub fn new_fresh(node: Node<T>, degree: u32, is_root: bool) -> Self {
        Self {
            position: RwLock::new(None),
            is_root: AtomicBool::new(is_root),
            degree,
            resident: RwLock::new(Some(node)),
        }
    }

    /// A handle to a node known to exist at `position` but not yet
    /// loaded into memory.
    pub fn from_position(position: Position, degree: u32, is_root: bool) -> Self {
        Self {
            position: RwLock::new(Some(position)),
            is_root: AtomicBool::new(is_root),
            degree,
            resident: RwLock::new(None),
        }
    }

    pub fn position(&self) -> Option<Position> {
        *self.position.read().unwrap()
    }

    pub fn set_position(&self, position: Position) {
        *self.position.write().unwrap() = Some(position);
    }

    pub fn is_root(&self) -> bool {
        self.is_root.load(Ordering::SeqCst)
    }

    pub fn set_is_root(&self, is_root: bool) {
        self.is_root.store(is_root, Ordering::SeqCst);
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    /// Clears the resident node. The cache calls this on eviction;
    /// callers must not hold outstanding references to the node's keys
    /// afterward.
    pub fn unload(&self) {
        *self.resident.write().unwrap() = None;
    }

    /// Loads the node from `storage` and stores it as resident. Called
    /// only when a prior read found no resident value; a concurrent
    /// evictor may unload the node again before the caller re-checks, so
    /// callers must loop rather than assume residency afterward.
    fn load_once(&self, storage: &Storage<T>, cache: &NodeCache<T>) -> ReedResult<()> {
        let position = self.position().ok_or_else(|| ReedError::FormatError {
            reason: "node has neither a resident value nor a position".to_string(),
        })?;
        let (node, is_root) = storage.load(position, self.degree, cache)?;
        self.set_is_root(is_root);
        *self.resident.write().unwrap() = Some(node);
        Ok(())
    }

    /// Runs `f` against the resident node, loading it from `storage`
    /// first if necessary. Retries the load if a concurrent evictor
    /// unloads the node between the load and this call observing it, so
    /// this never panics even under a small, actively-evicting cache.
    pub fn with_node<R>(
        &self,
        storage: &Storage<T>,
        cache: &NodeCache<T>,
        f: impl FnOnce(&Node<T>) -> ReedResult<R>,
    ) -> ReedResult<R> {
        loop {
            {
                let guard = self.resident.read().unwrap();
                if let Some(node) = guard.as_ref() {
                    return f(node);
                }
            }
            self.load_once(storage, cache)?;
        }
    }

    /// Runs `f` against the resident node with mutable access, loading
    /// it from `storage` first if necessary. See [`NodeRef::with_node`]
    /// for the retry behavior under concurrent eviction.
    pub fn with_node_mut<R>(
        &self,
        storage: &Storage<T>,
        cache: &NodeCache<T>,
        f: impl FnOnce(&mut Node<T>) -> ReedResult<R>,
    ) -> ReedResult<R> {
        loop {
            {
                let mut guard = self.resident.write().unwrap();
                if guard.is_some() {
                    return f(guard.as_mut().unwrap());
                }
            }
            self.load_once(storage, cache)?;
        }
    }
}
