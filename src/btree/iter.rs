// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Lazy in-order traversal over a tree's values.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::btree::cache::NodeCache;
use crate::btree::noderef::NodeRef;
use crate::btree::storage::Storage;

/// One node's traversal position: which child has been descended into
/// (or not yet), and which key is next to emit.
struct Frame<T> {
    node: Arc<NodeRef<T>>,
    index: usize,
    descended: bool,
}

/// In-order, depth-first iterator over a tree's non-deleted values.
///
/// Loads nodes lazily through the same `Storage`/`NodeCache` path as
/// `find`, one node at a time, rather than materializing the whole
/// tree up front. Mirrors the reader semantics in the crate's
/// concurrency notes: no monitor is held, so a node visited mid-walk
/// may reflect a concurrent writer's changes.
///
/// Any I/O or format error encountered mid-walk silently ends iteration
/// (there is no error-carrying variant in the public `Iterator` item
/// type); callers that need to distinguish "exhausted" from "failed"
/// should use `find`/`add`/`delete` directly instead.
pub struct BTreeIter<T> {
    storage: Arc<Storage<T>>,
    cache: Arc<NodeCache<T>>,
    stack: Vec<Frame<T>>,
    done: bool,
}

impl<T> BTreeIter<T>
where
    T: Clone + Ord + Serialize + DeserializeOwned,
{
    pub(crate) fn new(
        storage: Arc<Storage<T>>,
        cache: Arc<NodeCache<T>>,
        root: Arc<NodeRef<T>>,
    ) -> Self {
        Self {
            storage,
            cache,
            stack: vec![Frame {
                node: root,
                index: 0,
                descended: false,
            }],
            done: false,
        }
    }
}

impl<T> Iterator for BTreeIter<T>
where
    T: Clone + Ord + Serialize + DeserializeOwned,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        loop {
            let frame = self.stack.last_mut()?;
            let key_count = match frame
                .node
                .with_node(&self.storage, &self.cache, |n| Ok(n.key_count()))
            {
                Ok(count) => count,
                Err(_) => {
                    self.done = true;
                    return None;
                }
            };

            if frame.index >= key_count {
                // All keys emitted; descend into the final child once,
                // then this frame is exhausted.
                if !frame.descended {
                    frame.descended = true;
                    let last_child = frame
                        .node
                        .with_node(&self.storage, &self.cache, |n| {
                            Ok(n.keys().last().and_then(|k| k.right().cloned()))
                        })
                        .ok()
                        .flatten();
                    if let Some(child) = last_child {
                        self.stack.push(Frame {
                            node: child,
                            index: 0,
                            descended: false,
                        });
                    }
                    continue;
                }
                self.stack.pop();
                continue;
            }

            if !frame.descended {
                frame.descended = true;
                let child = frame
                    .node
                    .with_node(&self.storage, &self.cache, |n| {
                        Ok(n.keys().get(frame.index).and_then(|k| k.left().cloned()))
                    })
                    .ok()
                    .flatten();
                if let Some(child) = child {
                    self.stack.push(Frame {
                        node: child,
                        index: 0,
                        descended: false,
                    });
                    continue;
                }
                // Leaf key: no left child to descend into first.
            }

            let emitted = frame.node.with_node(&self.storage, &self.cache, |n| {
                let key = &n.keys()[frame.index];
                Ok((key.value().clone(), key.deleted()))
            });
            frame.index += 1;
            frame.descended = false;
            match emitted {
                Ok((value, deleted)) => {
                    if !deleted {
                        return Some(value);
                    }
                }
                Err(_) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}
