// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Fluent configuration façade for constructing a [`BTree`].

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::btree::tree::BTree;
use crate::error::{ReedError, ReedResult};

const DEFAULT_DEGREE: u32 = 100;
const DEFAULT_KEY_SIZE_BYTES: usize = 100;
const DEFAULT_CACHE_SIZE: usize = 100;

/// Builds a [`BTree`] with validated, defaulted configuration.
///
/// ```no_run
/// use reedtree::BTreeBuilder;
///
/// let tree = BTreeBuilder::new()
///     .path("/tmp/my-tree")
///     .degree(50)
///     .cache_size(256)
///     .build::<i64>()
///     .unwrap();
/// ```
pub struct BTreeBuilder {
    pub(crate) degree: u32,
    pub(crate) base_path: Option<PathBuf>,
    pub(crate) key_size_bytes: usize,
    pub(crate) cache_size: usize,
}

impl Default for BTreeBuilder {
    fn default() -> Self {
        Self {
            degree: DEFAULT_DEGREE,
            base_path: None,
            key_size_bytes: DEFAULT_KEY_SIZE_BYTES,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl BTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum keys in a node plus one. Must be at least 2. Ignored on
    /// reopen if the tree's metadata file already records a degree.
    pub fn degree(mut self, degree: u32) -> Self {
        self.degree = degree;
        self
    }

    /// Base file path; the engine derives `<path>` and `<path>.metadata`
    /// from it.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Slot width per key, in bytes. Must be positive; too small a
    /// value surfaces as `CapacityError` once a node's serialized size
    /// exceeds `degree * key_size_bytes`.
    pub fn key_size_bytes(mut self, key_size_bytes: usize) -> Self {
        self.key_size_bytes = key_size_bytes;
        self
    }

    /// Maximum number of resident nodes the cache retains. Zero
    /// disables retention (every dereference reloads from storage).
    pub fn cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub(crate) fn require_path(&self) -> ReedResult<PathBuf> {
        self.base_path.clone().ok_or_else(|| ReedError::ConfigError {
            reason: "a base path is required to build a tree".to_string(),
        })
    }

    fn validate(&self) -> ReedResult<()> {
        if self.degree < 2 {
            return Err(ReedError::ConfigError {
                reason: format!("degree must be at least 2, got {}", self.degree),
            });
        }
        if self.key_size_bytes == 0 {
            return Err(ReedError::ConfigError {
                reason: "key_size_bytes must be positive".to_string(),
            });
        }
        if self.base_path.is_none() {
            return Err(ReedError::ConfigError {
                reason: "a base path is required to build a tree".to_string(),
            });
        }
        Ok(())
    }

    /// Validates the configuration and opens (or creates) the tree.
    pub fn build<T>(self) -> ReedResult<BTree<T>>
    where
        T: Clone + Ord + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.validate()?;
        BTree::open(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degree_below_two() {
        let err = BTreeBuilder::new()
            .path("/tmp/reedtree-builder-test")
            .degree(1)
            .build::<i64>()
            .unwrap_err();
        assert!(matches!(err, ReedError::ConfigError { .. }));
    }

    #[test]
    fn rejects_zero_key_size() {
        let err = BTreeBuilder::new()
            .path("/tmp/reedtree-builder-test-2")
            .key_size_bytes(0)
            .build::<i64>()
            .unwrap_err();
        assert!(matches!(err, ReedError::ConfigError { .. }));
    }

    #[test]
    fn rejects_missing_path() {
        let err = BTreeBuilder::new().build::<i64>().unwrap_err();
        assert!(matches!(err, ReedError::ConfigError { .. }));
    }
}
