// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Bounded resident set of [`NodeRef`]s keyed by [`Position`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::btree::noderef::NodeRef;
use crate::btree::position::Position;

struct CacheState<T> {
    capacity: usize,
    map: HashMap<Position, Arc<NodeRef<T>>>,
    order: VecDeque<Position>,
}

/// A bounded, insertion-order-evicted mapping from [`Position`] to
/// [`NodeRef`].
///
/// The cache is the uniqueness oracle: as long as an entry is resident
/// here, repeated lookups of the same position return the same `NodeRef`
/// instance rather than a fresh shell. A `capacity` of zero disables
/// retention entirely; every lookup creates (and immediately forgets)
/// a new shell, which is safe because the single-writer model means no
/// two callers can diverge on the same position's content.
pub struct NodeCache<T> {
    state: Mutex<CacheState<T>>,
}

impl<T> NodeCache<T>
where
    T: Clone + Ord + Serialize + DeserializeOwned,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Returns the cached handle for `position`, creating and
    /// registering a fresh unloaded one on a miss.
    pub fn get_or_create(&self, position: Position, degree: u32) -> Arc<NodeRef<T>> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.map.get(&position) {
            return existing.clone();
        }
        let node_ref = Arc::new(NodeRef::from_position(position, degree, false));
        Self::insert_locked(&mut state, position, node_ref.clone());
        node_ref
    }

    /// Registers (or refreshes) a handle that has just been positioned
    /// by a flush.
    pub fn put(&self, position: Position, node_ref: Arc<NodeRef<T>>) {
        let mut state = self.state.lock().unwrap();
        Self::insert_locked(&mut state, position, node_ref);
    }

    fn insert_locked(state: &mut CacheState<T>, position: Position, node_ref: Arc<NodeRef<T>>) {
        if state.capacity == 0 {
            return;
        }
        if !state.map.contains_key(&position) {
            if state.map.len() >= state.capacity {
                if let Some(evicted_position) = state.order.pop_front() {
                    if let Some(evicted) = state.map.remove(&evicted_position) {
                        evicted.unload();
                    }
                }
            }
            state.order.push_back(position);
        }
        state.map.insert(position, node_ref);
    }

    /// Current resident count; used by tests to assert the bound holds.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::node::Node;

    #[test]
    fn eviction_respects_capacity() {
        let cache: NodeCache<i64> = NodeCache::new(2);
        let p0 = Position::new(0, 0);
        let p1 = Position::new(0, 8);
        let p2 = Position::new(0, 16);
        cache.put(p0, Arc::new(NodeRef::new_fresh(Node::empty(4), 4, false)));
        cache.put(p1, Arc::new(NodeRef::new_fresh(Node::empty(4), 4, false)));
        assert_eq!(cache.len(), 2);
        cache.put(p2, Arc::new(NodeRef::new_fresh(Node::empty(4), 4, false)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let cache: NodeCache<i64> = NodeCache::new(0);
        let p0 = Position::new(0, 0);
        cache.put(p0, Arc::new(NodeRef::new_fresh(Node::empty(4), 4, false)));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn get_or_create_returns_same_instance_on_hit() {
        let cache: NodeCache<i64> = NodeCache::new(4);
        let p0 = Position::new(0, 0);
        let a = cache.get_or_create(p0, 4);
        let b = cache.get_or_create(p0, 4);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
