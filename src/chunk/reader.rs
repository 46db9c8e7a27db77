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

//! Fills the arena from the input stream and indexes record boundaries.

use std::io::Read;
use std::mem;

use log::info;
use memchr::memchr_iter;

use crate::constants::{BYTES_PER_GIB, RECORDS_BEFORE_OVERHEAD_ESTIMATE};
use crate::error::{Result, ShuffleError};

/// Number of bytes of an oversized record echoed in the diagnostic.
const OVERSIZE_PREVIEW_BYTES: usize = 50;

/// Result of one [`ChunkReader::fill_and_index`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The arena holds a chunk of indexed records.
    Chunk {
        /// Length of the arena prefix covered by the index; everything in
        /// `arena[0..valid_len)` is complete, delimiter-terminated records.
        valid_len: usize,
        /// Whether the input returned EOF during this fill. A full arena
        /// leaves this false even when no input remains; the next call then
        /// reports [`FillOutcome::Exhausted`].
        reached_eof: bool,
    },

    /// The input yielded no bytes at all; pass 1 is complete.
    Exhausted,
}

/// Streams the input into the arena one chunk at a time.
///
/// The only state carried between calls is the trailing partial record of the
/// previous chunk: the bytes between the last delimiter and the fill boundary.
/// On the next call those bytes are relocated to the start of the arena before
/// any reading happens, so no record is ever split across chunks.
pub struct ChunkReader {
    sep: u8,

    /// Total bytes the previous call left in the arena.
    fill_len: usize,

    /// Prefix of `fill_len` covered by the previous index; the difference is
    /// the carryover.
    valid_len: usize,

    /// One-shot guard for the memory-overhead estimate.
    overhead_logged: bool,
}

impl ChunkReader {
    pub fn new(sep: u8) -> Self {
        Self {
            sep,
            fill_len: 0,
            valid_len: 0,
            overhead_logged: false,
        }
    }

    /// Fills the arena from `input` and rebuilds `indexes` with the start
    /// offset of every record in the valid prefix.
    ///
    /// Reads until the arena is full or the input reports EOF. When EOF
    /// arrives and the final record lacks its delimiter, one delimiter byte
    /// is appended so the record is emitted rather than silently dropped.
    ///
    /// # Errors
    ///
    /// [`ShuffleError::OversizeRecord`] when the arena filled up without a
    /// single delimiter: such a record cannot be shuffled. I/O errors from
    /// `input` are propagated.
    pub fn fill_and_index<R: Read>(
        &mut self,
        input: &mut R,
        arena: &mut [u8],
        indexes: &mut Vec<usize>,
    ) -> Result<FillOutcome> {
        // Relocate the partial record left by the previous call.
        let mut pos = self.fill_len - self.valid_len;
        if pos > 0 {
            arena.copy_within(self.valid_len..self.fill_len, 0);
        }

        while pos < arena.len() {
            let n = input.read(&mut arena[pos..])?;
            if n == 0 {
                break;
            }
            pos += n;
        }

        if pos == 0 {
            self.fill_len = 0;
            self.valid_len = 0;
            return Ok(FillOutcome::Exhausted);
        }

        // A partially filled arena means EOF. Terminate a trailing partial
        // record so it survives the shuffle.
        let reached_eof = pos < arena.len();
        if reached_eof && arena[pos - 1] != self.sep {
            arena[pos] = self.sep;
            pos += 1;
        }

        indexes.clear();
        let mut record_start = 0;
        let mut valid_len = 0;
        for sep_pos in memchr_iter(self.sep, &arena[..pos]) {
            indexes.push(record_start);
            record_start = sep_pos + 1;
            valid_len = sep_pos + 1;
            if !self.overhead_logged && indexes.len() >= RECORDS_BEFORE_OVERHEAD_ESTIMATE {
                self.overhead_logged = true;
                log_overhead_estimate(sep_pos, indexes.len(), arena.len());
            }
        }

        if indexes.is_empty() {
            let preview = &arena[..pos.min(OVERSIZE_PREVIEW_BYTES)];
            return Err(ShuffleError::OversizeRecord {
                capacity: arena.len(),
                preview: String::from_utf8_lossy(preview).into_owned(),
            });
        }

        self.fill_len = pos;
        self.valid_len = valid_len;

        Ok(FillOutcome::Chunk {
            valid_len,
            reached_eof,
        })
    }
}

/// Logs how much memory the record index adds on top of the arena, and the
/// `MEMORY` value that would bound real usage to the configured figure.
fn log_overhead_estimate(scanned: usize, records: usize, arena_bytes: usize) {
    let mean_record = scanned as f64 / records as f64;
    let overhead = mem::size_of::<usize>() as f64 / mean_record + 1.0;
    let memory_gib = arena_bytes as f64 / BYTES_PER_GIB;
    info!(
        "mean record length is {:.2} bytes; with the index, estimated memory use is {:.2} * {:.2} GiB = {:.2} GiB",
        mean_record - 1.0,
        overhead,
        memory_gib,
        overhead * memory_gib
    );
    info!(
        "tip: MEMORY={:.4} keeps total memory use near {:.2} GiB",
        memory_gib / overhead,
        memory_gib
    );
}
