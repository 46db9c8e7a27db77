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

//! Spill files: locally-shuffled chunks parked on disk between the passes.
//!
//! Each spill is written once during pass 1 and read back sequentially during
//! pass 2 through a small fixed-size buffer. Ownership of the on-disk path
//! follows the [`SpillFile`]: dropping one unlinks its file, so spills are
//! released on every exit path, and [`SpillFile::finish`] unlinks eagerly the
//! moment a spill drains.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use memchr::memchr;
use tempfile::{Builder, NamedTempFile};

use crate::constants::{SPILL_NAME_PREFIX, SPILL_NAME_RAND_CHARS, SPILL_READ_BUF_BYTES};
use crate::error::{Result, ShuffleError};

/// One temporary file holding a locally-shuffled chunk.
pub struct SpillFile {
    /// The open handle and its path. `None` once the spill has been finished.
    handle: Option<NamedTempFile>,

    /// Number of records written into this spill.
    records: u64,

    /// Pass-2 read state: a small buffer refilled by bulk reads.
    buf: Vec<u8>,
    buf_pos: usize,
    buf_len: usize,
    eof: bool,
}

impl SpillFile {
    /// Creates a uniquely named spill file under `dir`, opened read/write.
    ///
    /// Names match `terashuftmpXXXXXX` with six random characters; collisions
    /// with concurrent runs are retried, mkstemp-style.
    pub fn create(dir: &Path) -> Result<Self> {
        let handle = Builder::new()
            .prefix(SPILL_NAME_PREFIX)
            .suffix("")
            .rand_bytes(SPILL_NAME_RAND_CHARS)
            .tempfile_in(dir)
            .map_err(|source| ShuffleError::SpillCreate {
                dir: dir.to_path_buf(),
                source,
            })?;
        Ok(Self {
            handle: Some(handle),
            records: 0,
            buf: Vec::new(),
            buf_pos: 0,
            buf_len: 0,
            eof: false,
        })
    }

    /// The on-disk path, while the spill is still live.
    pub fn path(&self) -> Option<&Path> {
        self.handle.as_ref().map(|h| h.path())
    }

    /// Number of records recorded for this spill.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn set_records(&mut self, records: u64) {
        self.records = records;
    }

    /// A buffered writer over the spill for the pass-1 flush. The caller must
    /// flush it before the borrow ends.
    pub fn writer(&mut self) -> Result<BufWriter<&mut File>> {
        Ok(BufWriter::new(self.file_mut()?))
    }

    /// Seeks back to the start and arms the read buffer for the merge pass.
    pub fn rewind_for_merge(&mut self) -> Result<()> {
        self.file_mut()?.seek(SeekFrom::Start(0))?;
        if self.buf.is_empty() {
            self.buf = vec![0u8; SPILL_READ_BUF_BYTES];
        }
        self.buf_pos = 0;
        self.buf_len = 0;
        self.eof = false;
        Ok(())
    }

    /// Copies the next record, delimiter included, into the front of `out`.
    ///
    /// Returns the number of bytes copied, or 0 once the spill is exhausted.
    /// The caller draws each spill exactly [`records`](Self::records) times,
    /// so a well-formed spill never returns 0 early.
    pub fn read_record(&mut self, sep: u8, out: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        loop {
            if self.buf_pos == self.buf_len {
                if self.eof {
                    return Ok(written);
                }
                let n = match self.handle.as_mut() {
                    Some(handle) => handle.as_file_mut().read(&mut self.buf)?,
                    None => return Err(used_after_close()),
                };
                if n == 0 {
                    self.eof = true;
                    continue;
                }
                self.buf_pos = 0;
                self.buf_len = n;
            }

            let pending = &self.buf[self.buf_pos..self.buf_len];
            let (take, complete) = match memchr(sep, pending) {
                Some(sep_pos) => (sep_pos + 1, true),
                None => (pending.len(), false),
            };
            if written + take > out.len() {
                return Err(ShuffleError::Other(format!(
                    "spill record exceeds the {}-byte arena",
                    out.len()
                )));
            }
            out[written..written + take].copy_from_slice(&pending[..take]);
            written += take;
            self.buf_pos += take;
            if complete {
                return Ok(written);
            }
        }
    }

    /// Streams the whole spill from the start into `out`.
    ///
    /// Used when pass 1 produced a single spill: its content is already a
    /// valid shuffle of the entire input, so no merge is needed.
    pub fn stream_into<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(io::copy(file, out)?)
    }

    /// Closes the handle and unlinks the path now. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.close()?;
        }
        Ok(())
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        match self.handle.as_mut() {
            Some(handle) => Ok(handle.as_file_mut()),
            None => Err(used_after_close()),
        }
    }
}

fn used_after_close() -> ShuffleError {
    ShuffleError::Other("spill file used after close".to_string())
}

/// The ordered collection of spills produced by pass 1.
///
/// Spills drain in place during pass 2: their counts reach zero and their
/// files are unlinked, but entries keep their position so the weight tree's
/// leaf indices stay valid.
#[derive(Default)]
pub struct SpillSet {
    spills: Vec<SpillFile>,
}

impl SpillSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, spill: SpillFile) {
        self.spills.push(spill);
    }

    pub fn len(&self) -> usize {
        self.spills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spills.is_empty()
    }

    /// Per-spill record counts, in spill order; the weight tree is built from
    /// these.
    pub fn record_counts(&self) -> Vec<u64> {
        self.spills.iter().map(|s| s.records()).collect()
    }

    /// Total records across all spills.
    pub fn total_records(&self) -> u64 {
        self.spills.iter().map(|s| s.records()).sum()
    }

    pub fn spill_mut(&mut self, k: usize) -> &mut SpillFile {
        &mut self.spills[k]
    }

    /// Rewinds every spill and arms its read buffer for the merge pass.
    pub fn rewind_all_for_merge(&mut self) -> Result<()> {
        for spill in &mut self.spills {
            spill.rewind_for_merge()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_uses_the_template_name() {
        let dir = tempdir().unwrap();
        let spill = SpillFile::create(dir.path()).unwrap();

        let path = spill.path().unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(SPILL_NAME_PREFIX));
        assert_eq!(name.len(), SPILL_NAME_PREFIX.len() + SPILL_NAME_RAND_CHARS);
    }

    #[test]
    fn test_create_in_missing_dir_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            SpillFile::create(&missing),
            Err(ShuffleError::SpillCreate { .. })
        ));
    }

    #[test]
    fn test_write_rewind_read_roundtrip() {
        let dir = tempdir().unwrap();
        let mut spill = SpillFile::create(dir.path()).unwrap();

        {
            let mut writer = spill.writer().unwrap();
            writer.write_all(b"a\nbb\nccc\n").unwrap();
            writer.flush().unwrap();
        }
        spill.set_records(3);
        spill.rewind_for_merge().unwrap();

        let mut out = vec![0u8; 16];
        let n = spill.read_record(b'\n', &mut out).unwrap();
        assert_eq!(&out[..n], b"a\n");
        let n = spill.read_record(b'\n', &mut out).unwrap();
        assert_eq!(&out[..n], b"bb\n");
        let n = spill.read_record(b'\n', &mut out).unwrap();
        assert_eq!(&out[..n], b"ccc\n");
        let n = spill.read_record(b'\n', &mut out).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_record_spanning_buffer_refills() {
        let dir = tempdir().unwrap();
        let mut spill = SpillFile::create(dir.path()).unwrap();

        // One record larger than the read buffer, then a short one.
        let long = vec![b'x'; SPILL_READ_BUF_BYTES + 1000];
        {
            let mut writer = spill.writer().unwrap();
            writer.write_all(&long).unwrap();
            writer.write_all(b"\ny\n").unwrap();
            writer.flush().unwrap();
        }
        spill.rewind_for_merge().unwrap();

        let mut out = vec![0u8; SPILL_READ_BUF_BYTES + 2000];
        let n = spill.read_record(b'\n', &mut out).unwrap();
        assert_eq!(n, long.len() + 1);
        assert_eq!(&out[..n - 1], &long[..]);
        assert_eq!(out[n - 1], b'\n');

        let n = spill.read_record(b'\n', &mut out).unwrap();
        assert_eq!(&out[..n], b"y\n");
    }

    #[test]
    fn test_record_too_large_for_out_is_an_error() {
        let dir = tempdir().unwrap();
        let mut spill = SpillFile::create(dir.path()).unwrap();
        {
            let mut writer = spill.writer().unwrap();
            writer.write_all(b"abcdefgh\n").unwrap();
            writer.flush().unwrap();
        }
        spill.rewind_for_merge().unwrap();

        let mut out = vec![0u8; 4];
        assert!(matches!(
            spill.read_record(b'\n', &mut out),
            Err(ShuffleError::Other(_))
        ));
    }

    #[test]
    fn test_finish_unlinks_the_path() {
        let dir = tempdir().unwrap();
        let mut spill = SpillFile::create(dir.path()).unwrap();
        let path = spill.path().unwrap().to_path_buf();
        assert!(path.exists());

        spill.finish().unwrap();
        assert!(!path.exists());
        assert!(spill.path().is_none());

        // Idempotent.
        spill.finish().unwrap();
    }

    #[test]
    fn test_drop_unlinks_the_path() {
        let dir = tempdir().unwrap();
        let path = {
            let spill = SpillFile::create(dir.path()).unwrap();
            spill.path().unwrap().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_stream_into_replays_everything() {
        let dir = tempdir().unwrap();
        let mut spill = SpillFile::create(dir.path()).unwrap();
        {
            let mut writer = spill.writer().unwrap();
            writer.write_all(b"x\ny\nz\n").unwrap();
            writer.flush().unwrap();
        }

        let mut out = Vec::new();
        let n = spill.stream_into(&mut out).unwrap();
        assert_eq!(n, 6);
        assert_eq!(out, b"x\ny\nz\n");
    }
}
