// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Byte-level persistence: slot allocation, node (de)serialization, file
//! rolling, and the small metadata frame that anchors a tree on reopen.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::btree::cache::NodeCache;
use crate::btree::key::Key;
use crate::btree::node::Node;
use crate::btree::noderef::NodeRef;
use crate::btree::position::Position;
use crate::error::{ReedError, ReedResult};

/// Default threshold, in bytes, above which a storage file is rolled to
/// the next file number. Not part of the builder surface: §6 only
/// exposes `degree`, `keySizeBytes`, `cacheSize`, and the base path.
const DEFAULT_ROLL_THRESHOLD_BYTES: u64 = 64 * 1024 * 1024;

/// The first `count` bytes of the metadata file that carry meaning; the
/// rest is zero-padded.
const METADATA_RESERVED_BYTES: usize = 1000;

#[derive(Serialize, Deserialize)]
struct KeyFrame<T> {
    value: T,
    left_file_number: i64,
    left_offset: i64,
    right_file_number: i64,
    right_offset: i64,
    deleted: bool,
}

#[derive(Serialize, Deserialize)]
struct NodeFrame<T> {
    is_root: bool,
    can_delete: bool,
    count: i32,
    keys: Vec<KeyFrame<T>>,
}

const ABSENT_OFFSET: i64 = -1;

fn encode_child<T>(node_ref: Option<&Arc<NodeRef<T>>>) -> ReedResult<(i64, i64)> {
    match node_ref {
        None => Ok((0, ABSENT_OFFSET)),
        Some(node_ref) => match node_ref.position() {
            Some(position) => Ok((position.file_number as i64, position.offset as i64)),
            None => Err(ReedError::FormatError {
                reason: "child node has no position at flush time".to_string(),
            }),
        },
    }
}

fn build_frame<T>(node: &Node<T>, is_root: bool) -> ReedResult<NodeFrame<T>>
where
    T: Clone,
{
    let mut keys = Vec::with_capacity(node.keys.len());
    for key in &node.keys {
        let (left_file_number, left_offset) = encode_child(key.left())?;
        let (right_file_number, right_offset) = encode_child(key.right())?;
        keys.push(KeyFrame {
            value: key.value().clone(),
            left_file_number,
            left_offset,
            right_file_number,
            right_offset,
            deleted: key.deleted(),
        });
    }
    Ok(NodeFrame {
        is_root,
        can_delete: false,
        count: keys.len() as i32,
        keys,
    })
}

fn decode_child<T>(
    file_number: i64,
    offset: i64,
    cache: &NodeCache<T>,
    degree: u32,
) -> Option<Arc<NodeRef<T>>>
where
    T: Clone + Ord + Serialize + DeserializeOwned,
{
    if offset == ABSENT_OFFSET {
        None
    } else {
        Some(cache.get_or_create(Position::new(file_number as u64, offset as u64), degree))
    }
}

/// Metadata frame persisted to `<base>.metadata`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetadataFrame {
    pub storage_file_number: i64,
    pub root_file_number: i64,
    pub root_offset: i64,
    pub degree: i32,
    pub key_size_bytes: i64,
}

pub fn read_metadata(path: &Path) -> ReedResult<Option<MetadataFrame>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path).map_err(|e| ReedError::IoError {
        operation: "open_metadata".to_string(),
        reason: e.to_string(),
    })?;
    let mut buf = vec![0u8; METADATA_RESERVED_BYTES];
    file.read_exact(&mut buf).map_err(|e| ReedError::IoError {
        operation: "read_metadata".to_string(),
        reason: e.to_string(),
    })?;
    let frame = bincode::deserialize(&buf).map_err(|e| ReedError::FormatError {
        reason: format!("malformed metadata frame: {}", e),
    })?;
    Ok(Some(frame))
}

pub fn write_metadata(path: &Path, frame: &MetadataFrame) -> ReedResult<()> {
    let bytes = bincode::serialize(frame).map_err(|e| ReedError::FormatError {
        reason: format!("cannot encode metadata frame: {}", e),
    })?;
    if bytes.len() > METADATA_RESERVED_BYTES {
        return Err(ReedError::CapacityError {
            reason: "metadata frame exceeds its reserved 1000-byte region".to_string(),
        });
    }
    let mut buf = vec![0u8; METADATA_RESERVED_BYTES];
    buf[..bytes.len()].copy_from_slice(&bytes);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| ReedError::IoError {
            operation: "open_metadata".to_string(),
            reason: e.to_string(),
        })?;
    file.write_all(&buf).map_err(|e| ReedError::IoError {
        operation: "write_metadata".to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

struct StorageState {
    file_number: u64,
    next_offset: u64,
}

/// Byte-level persistence for one tree: fixed-size slot allocation,
/// node (de)serialization, and file rolling.
///
/// Each read or write opens its file handle, seeks, performs the
/// operation, and lets the handle drop; there is no long-lived open
/// file or memory map.
pub struct Storage<T> {
    base_path: PathBuf,
    slot_size: usize,
    roll_threshold: u64,
    state: Mutex<StorageState>,
    _marker: PhantomData<T>,
}

impl<T> Storage<T>
where
    T: Clone + Ord + Serialize + DeserializeOwned,
{
    pub fn new(base_path: PathBuf, slot_size: usize, initial_file_number: u64) -> Self {
        let next_offset = std::fs::metadata(Self::path_for(&base_path, initial_file_number))
            .map(|m| m.len())
            .unwrap_or(0);
        Self {
            base_path,
            slot_size,
            roll_threshold: DEFAULT_ROLL_THRESHOLD_BYTES,
            state: Mutex::new(StorageState {
                file_number: initial_file_number,
                next_offset,
            }),
            _marker: PhantomData,
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        let mut name: OsString = self.base_path.as_os_str().to_os_string();
        name.push(".metadata");
        PathBuf::from(name)
    }

    pub fn current_file_number(&self) -> u64 {
        self.state.lock().unwrap().file_number
    }

    fn path_for(base_path: &Path, file_number: u64) -> PathBuf {
        if file_number == 0 {
            base_path.to_path_buf()
        } else {
            let mut name: OsString = base_path.as_os_str().to_os_string();
            name.push(format!(".{}", file_number));
            PathBuf::from(name)
        }
    }

    fn allocate_position(&self) -> Position {
        let mut state = self.state.lock().unwrap();
        if state.next_offset > 0 && state.next_offset + self.slot_size as u64 > self.roll_threshold
        {
            state.file_number += 1;
            state.next_offset = 0;
        }
        let position = Position::new(state.file_number, state.next_offset);
        state.next_offset += self.slot_size as u64;
        position
    }

    fn write_slot(&self, position: Position, buf: &[u8]) -> ReedResult<()> {
        let path = Self::path_for(&self.base_path, position.file_number);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .open(&path)
            .map_err(|e| ReedError::IoError {
                operation: "open_storage_file_for_write".to_string(),
                reason: e.to_string(),
            })?;
        file.seek(SeekFrom::Start(position.offset))
            .map_err(|e| ReedError::IoError {
                operation: "seek_storage_file".to_string(),
                reason: e.to_string(),
            })?;
        file.write_all(buf).map_err(|e| ReedError::IoError {
            operation: "write_storage_slot".to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn read_slot(&self, position: Position) -> ReedResult<Vec<u8>> {
        let path = Self::path_for(&self.base_path, position.file_number);
        let mut file = File::open(&path).map_err(|e| ReedError::IoError {
            operation: "open_storage_file_for_read".to_string(),
            reason: e.to_string(),
        })?;
        file.seek(SeekFrom::Start(position.offset))
            .map_err(|e| ReedError::IoError {
                operation: "seek_storage_file".to_string(),
                reason: e.to_string(),
            })?;
        let mut buf = vec![0u8; self.slot_size];
        file.read_exact(&mut buf).map_err(|e| ReedError::IoError {
            operation: "read_storage_slot".to_string(),
            reason: e.to_string(),
        })?;
        Ok(buf)
    }

    /// Assigns positions to each queued `NodeRef` in pop order (reusing
    /// an existing position where the node already had one, so an
    /// unchanged-size rewrite stays in place), serializes and writes
    /// each node, and registers the now-positioned handle in `cache`.
    pub fn save(
        &self,
        queue: &mut VecDeque<Arc<NodeRef<T>>>,
        cache: &NodeCache<T>,
    ) -> ReedResult<()> {
        while let Some(node_ref) = queue.pop_front() {
            let is_root = node_ref.is_root();
            let frame = node_ref.with_node(self, cache, |node| build_frame(node, is_root))?;
            let position = node_ref.position().unwrap_or_else(|| self.allocate_position());
            let bytes = bincode::serialize(&frame).map_err(|e| ReedError::FormatError {
                reason: format!("cannot encode node frame: {}", e),
            })?;
            if bytes.len() > self.slot_size {
                return Err(ReedError::CapacityError {
                    reason: format!(
                        "node serialized to {} bytes but the slot only holds {} bytes; increase key_size_bytes",
                        bytes.len(),
                        self.slot_size
                    ),
                });
            }
            let mut buf = vec![0u8; self.slot_size];
            buf[..bytes.len()].copy_from_slice(&bytes);
            self.write_slot(position, &buf)?;
            node_ref.set_position(position);
            cache.put(position, node_ref.clone());
        }
        Ok(())
    }

    /// Loads the node at `position`, resolving child links through
    /// `cache` so that two keys sharing a child position share one
    /// `NodeRef` instance.
    pub fn load(
        &self,
        position: Position,
        degree: u32,
        cache: &NodeCache<T>,
    ) -> ReedResult<(Node<T>, bool)> {
        let buf = self.read_slot(position)?;
        let frame: NodeFrame<T> = bincode::deserialize(&buf).map_err(|e| ReedError::FormatError {
            reason: format!("malformed node frame at {:?}: {}", position, e),
        })?;
        if frame.count < 0 || frame.count as usize != frame.keys.len() {
            return Err(ReedError::FormatError {
                reason: format!("node frame at {:?} has an impossible key count", position),
            });
        }
        let keys = frame
            .keys
            .into_iter()
            .map(|kf| Key {
                value: kf.value,
                deleted: kf.deleted,
                left: decode_child(kf.left_file_number, kf.left_offset, cache, degree),
                right: decode_child(kf.right_file_number, kf.right_offset, cache, degree),
            })
            .collect();
        Ok((Node { keys, degree }, frame.is_root))
    }
}
