// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the B-tree engine.

use std::fmt;

/// Result alias used throughout the crate.
pub type ReedResult<T> = Result<T, ReedError>;

/// Fatal error kinds the engine can surface.
///
/// `find` returning "absent" for a missing value is not an error; it is
/// represented as `Ok(None)`.
#[derive(Debug, Clone)]
pub enum ReedError {
    /// Raised at build time: an invalid or missing builder setting.
    ConfigError { reason: String },
    /// A storage read/write or path operation failed.
    IoError { operation: String, reason: String },
    /// Deserialization encountered an impossible frame.
    FormatError { reason: String },
    /// A serialized node did not fit in its fixed slot.
    CapacityError { reason: String },
}

impl fmt::Display for ReedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReedError::ConfigError { reason } => write!(f, "config error: {}", reason),
            ReedError::IoError { operation, reason } => {
                write!(f, "io error during {}: {}", operation, reason)
            }
            ReedError::FormatError { reason } => write!(f, "format error: {}", reason),
            ReedError::CapacityError { reason } => write!(f, "capacity error: {}", reason),
        }
    }
}

impl std::error::Error for ReedError {}

impl From<std::io::Error> for ReedError {
    fn from(err: std::io::Error) -> Self {
        ReedError::IoError {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}
