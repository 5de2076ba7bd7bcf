// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Opaque file-coordinate identifying one persisted node slot.

use serde::{Deserialize, Serialize};

/// A `(fileNumber, offset)` pair locating one fixed-size slot in storage.
///
/// Positions are immutable once assigned and ordered lexicographically,
/// which is what lets [`crate::btree::cache::NodeCache`] use them as map
/// keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub file_number: u64,
    pub offset: u64,
}

impl Position {
    pub fn new(file_number: u64, offset: u64) -> Self {
        Self {
            file_number,
            offset,
        }
    }
}
