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

//! Permutes a chunk's record index and emits the records.

use std::io::Write;

use memchr::memchr;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{Result, ShuffleError};

/// Shuffles `indexes` uniformly and writes the records in the permuted order.
///
/// `arena` must be the valid prefix produced by
/// [`ChunkReader::fill_and_index`](crate::chunk::ChunkReader::fill_and_index),
/// which guarantees that every record start is followed by a delimiter within
/// the slice. Each record is written including its trailing delimiter.
///
/// Returns the number of bytes written. Every permutation of the chunk's
/// records is produced with equal probability, conditional on the RNG stream.
///
/// # Errors
///
/// Short writes and other sink failures surface as the underlying
/// `io::Error`; the sink is assumed unbounded, so running out of space is
/// unrecoverable.
pub fn shuffle_and_flush<W: Write>(
    arena: &[u8],
    indexes: &mut [usize],
    sep: u8,
    rng: &mut StdRng,
    sink: &mut W,
) -> Result<u64> {
    indexes.shuffle(rng);

    let mut bytes_written = 0u64;
    for &start in indexes.iter() {
        let len = match memchr(sep, &arena[start..]) {
            Some(sep_pos) => sep_pos + 1,
            None => {
                return Err(ShuffleError::Other(format!(
                    "record at arena offset {start} has no delimiter"
                )))
            }
        };
        sink.write_all(&arena[start..start + len])?;
        bytes_written += len as u64;
    }

    Ok(bytes_written)
}
