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

//! The single large byte buffer that backs both passes.

use crate::error::{Result, ShuffleError};

/// One contiguous byte region, allocated once and never resized.
///
/// During pass 1 the arena holds the records of the current chunk; during
/// pass 2 it holds one record at a time on its way from a spill file to the
/// output.
pub struct Arena {
    buf: Vec<u8>,
}

impl Arena {
    /// Allocates an arena of exactly `bytes` bytes.
    ///
    /// The allocation is fallible: a refused reservation surfaces as
    /// [`ShuffleError::ArenaAlloc`] instead of aborting the process.
    pub fn new(bytes: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes)
            .map_err(|_| ShuffleError::ArenaAlloc { bytes })?;
        buf.resize(bytes, 0);
        Ok(Self { buf })
    }

    /// Arena size in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_matches_request() {
        let arena = Arena::new(4096).unwrap();
        assert_eq!(arena.capacity(), 4096);
        assert_eq!(arena.as_slice().len(), 4096);
    }

    #[test]
    fn test_impossible_allocation_is_an_error() {
        let result = Arena::new(usize::MAX);
        assert!(matches!(
            result,
            Err(ShuffleError::ArenaAlloc { bytes: usize::MAX })
        ));
    }
}
