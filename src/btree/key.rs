// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! A single value plus its child links inside a node's key chain.

use std::sync::Arc;

use crate::btree::noderef::NodeRef;

/// One entry in a [`crate::btree::node::Node`]'s ordered key chain.
///
/// A leaf key has both `left` and `right` absent. An internal key's
/// `left` covers values strictly less than `value`; `right` covers
/// values greater than or equal to it (equal values go right, mirroring
/// lookup). Key is a passive cell: it carries no traversal or split
/// logic of its own.
#[derive(Clone)]
pub struct Key<T> {
    pub(crate) value: T,
    pub(crate) left: Option<Arc<NodeRef<T>>>,
    pub(crate) right: Option<Arc<NodeRef<T>>>,
    pub(crate) deleted: bool,
}

impl<T> Key<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            left: None,
            right: None,
            deleted: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn left(&self) -> Option<&Arc<NodeRef<T>>> {
        self.left.as_ref()
    }

    pub fn right(&self) -> Option<&Arc<NodeRef<T>>> {
        self.right.as_ref()
    }

    pub fn set_left(&mut self, node_ref: Arc<NodeRef<T>>) {
        self.left = Some(node_ref);
    }

    pub fn set_right(&mut self, node_ref: Arc<NodeRef<T>>) {
        self.right = Some(node_ref);
    }

    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_leaf_key(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}
