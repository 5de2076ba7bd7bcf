// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! A persistent, on-disk B-tree storing an ordered multiset of
//! comparable, serializable values.
//!
//! ```no_run
//! use reedtree::BTreeBuilder;
//!
//! let tree = BTreeBuilder::new()
//!     .path("/tmp/example-tree")
//!     .degree(100)
//!     .build::<i64>()
//!     .unwrap();
//!
//! tree.add(42).unwrap();
//! assert_eq!(tree.find(&42).unwrap(), Some(42));
//! ```

pub mod btree;
pub mod error;

pub use btree::{BTree, BTreeBuilder, BTreeIter};
pub use error::{ReedError, ReedResult};
