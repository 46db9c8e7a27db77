// Copyright 2024
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the shuffle.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for shuffle operations.
///
/// Every error here is fatal to a run; there is no retry or checkpoint logic.
#[derive(Debug, Error)]
pub enum ShuffleError {
    /// An I/O error occurred on the input, the output, or a spill file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An environment variable held a value that cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The arena allocation failed.
    #[error("failed to allocate the {bytes}-byte arena; lower MEMORY or free some memory")]
    ArenaAlloc {
        /// Requested arena size in bytes.
        bytes: usize,
    },

    /// A single record is longer than the arena and cannot be shuffled.
    #[error("record longer than the {capacity}-byte arena, starts with: {preview}...")]
    OversizeRecord {
        /// Arena capacity in bytes.
        capacity: usize,
        /// The first bytes of the offending record, lossily decoded.
        preview: String,
    },

    /// A spill file could not be created under the spill directory.
    #[error("failed to create a spill file in {dir}: {source}")]
    SpillCreate {
        /// The configured spill directory.
        dir: PathBuf,
        /// The underlying error from the filesystem.
        source: io::Error,
    },

    /// A general error occurred.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for shuffle operations.
pub type Result<T> = std::result::Result<T, ShuffleError>;
