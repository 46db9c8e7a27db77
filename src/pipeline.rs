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

//! Orchestrates the two shuffle passes over a pair of byte streams.
//!
//! The pipeline owns the arena, the RNG, and the spill set. Output order is a
//! deterministic function of the input bytes and the configuration: two runs
//! with the same input, arena size, delimiter, seed, and skip count produce
//! identical output.

use std::io::{self, Read, Write};

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arena::Arena;
use crate::chunk::{shuffle_and_flush, ChunkReader, FillOutcome};
use crate::config::Config;
use crate::error::{Result, ShuffleError};
use crate::spill::{SpillFile, SpillSet};
use crate::weights::WeightTree;

/// What a completed run did, for reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShuffleSummary {
    /// Records shuffled (the skip prefix is not counted).
    pub records: u64,
    /// Bytes of shuffled records emitted, delimiters included.
    pub bytes: u64,
    /// Spill files created during pass 1.
    pub spills: usize,
}

/// The two-pass external shuffle over an input and an output stream.
///
/// Generic over the stream types so tests can drive it with in-memory
/// buffers; the binary instantiates it with locked stdin and stdout.
pub struct ShufflePipeline<R: Read, W: Write> {
    config: Config,
    input: R,
    output: W,
    rng: StdRng,
}

impl<R: Read, W: Write> ShufflePipeline<R, W> {
    pub fn new(config: Config, input: R, output: W) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            input,
            output,
            rng,
        }
    }

    /// Runs the shuffle to completion and flushes the output.
    ///
    /// # Errors
    ///
    /// Any failure is fatal and leaves partial output behind: I/O errors on
    /// either stream or a spill, an oversized record, or a spill-file
    /// creation failure. Spill files that were already open are unlinked as
    /// the pipeline unwinds.
    pub fn run(mut self) -> Result<ShuffleSummary> {
        info!(
            "using seed {}, arena of {} bytes, spill dir {}",
            self.config.seed,
            self.config.arena_bytes,
            self.config.spill_dir.display()
        );
        let mut arena = Arena::new(self.config.arena_bytes)?;

        if !self.copy_skip_prefix()? {
            // Input ended inside the skip prefix; nothing left to shuffle.
            self.output.flush()?;
            return Ok(ShuffleSummary {
                records: 0,
                bytes: 0,
                spills: 0,
            });
        }
        if self.config.skip > 0 {
            info!("copied {} leading records verbatim", self.config.skip);
        }

        // Pass 1: chunked shuffle, spilling whenever the input outgrows the
        // arena.
        let mut reader = ChunkReader::new(self.config.sep);
        let mut indexes: Vec<usize> = Vec::new();
        let mut spills = SpillSet::new();
        let mut records = 0u64;
        let mut bytes = 0u64;
        let mut shuffled_direct = false;

        loop {
            let (valid_len, reached_eof) =
                match reader.fill_and_index(&mut self.input, arena.as_mut_slice(), &mut indexes)? {
                    FillOutcome::Exhausted => break,
                    FillOutcome::Chunk {
                        valid_len,
                        reached_eof,
                    } => (valid_len, reached_eof),
                };

            let chunk = &arena.as_slice()[..valid_len];
            let chunk_bytes = if reached_eof && spills.is_empty() {
                // The whole input fit in one chunk: shuffle straight to the
                // output, no spill needed.
                let n = shuffle_and_flush(
                    chunk,
                    &mut indexes,
                    self.config.sep,
                    &mut self.rng,
                    &mut self.output,
                )?;
                shuffled_direct = true;
                n
            } else {
                let mut spill = SpillFile::create(&self.config.spill_dir)?;
                let n = {
                    let mut sink = spill.writer()?;
                    let n = shuffle_and_flush(
                        chunk,
                        &mut indexes,
                        self.config.sep,
                        &mut self.rng,
                        &mut sink,
                    )?;
                    sink.flush()?;
                    n
                };
                spill.set_records(indexes.len() as u64);
                spills.push(spill);
                n
            };

            records += indexes.len() as u64;
            bytes += chunk_bytes;
            report_progress("records read", records, bytes)?;

            if reached_eof {
                break;
            }
        }

        if records > 0 {
            end_progress_line()?;
        }
        info!(
            "pass 1: {} records, {} bytes, {} spill file(s)",
            records,
            bytes,
            spills.len()
        );

        let summary = ShuffleSummary {
            records,
            bytes,
            spills: spills.len(),
        };

        if shuffled_direct || spills.is_empty() {
            if shuffled_direct {
                info!("input fit in a single chunk, shuffled directly to the output");
            }
            self.output.flush()?;
            return Ok(summary);
        }

        if spills.len() == 1 {
            // The input only barely overflowed pass 1's direct path. The lone
            // spill already holds a full shuffle, so replay it verbatim.
            info!("single spill already holds a full shuffle, streaming it out");
            let spill = spills.spill_mut(0);
            spill.stream_into(&mut self.output)?;
            spill.finish()?;
            self.output.flush()?;
            return Ok(summary);
        }

        self.merge_spills(&mut arena, &mut spills, records)?;
        self.output.flush()?;
        Ok(summary)
    }

    /// Copies exactly `skip` delimiter-terminated records from the input to
    /// the output, byte by byte. Returns false when EOF arrives first.
    fn copy_skip_prefix(&mut self) -> Result<bool> {
        let mut copied = 0u64;
        let mut byte = [0u8; 1];
        while copied < self.config.skip {
            if self.input.read(&mut byte)? == 0 {
                return Ok(false);
            }
            self.output.write_all(&byte)?;
            if byte[0] == self.config.sep {
                copied += 1;
            }
        }
        Ok(true)
    }

    /// Pass 2: weighted multiway merge of the spills.
    ///
    /// Each step draws a spill with probability proportional to its remaining
    /// record count and emits that spill's next record; a spill is unlinked
    /// the moment it drains.
    fn merge_spills(
        &mut self,
        arena: &mut Arena,
        spills: &mut SpillSet,
        total_records: u64,
    ) -> Result<()> {
        spills.rewind_all_for_merge()?;
        let mut tree = WeightTree::new(&spills.record_counts());
        let mut remaining = tree.total();

        info!("pass 2: merging {} spills", spills.len());

        let report_every = arena.capacity() as u64;
        let record_buf = arena.as_mut_slice();
        let mut bytes_written = 0u64;
        let mut bytes_since_report = 0u64;

        while remaining > 0 {
            let p = self.rng.gen_range(0..remaining);
            let k = tree.draw_and_decrement(p);
            remaining -= 1;

            let spill = spills.spill_mut(k);
            let n = spill.read_record(self.config.sep, record_buf)?;
            if n == 0 {
                return Err(ShuffleError::Other(format!(
                    "spill {k} ran dry before its record count"
                )));
            }
            self.output.write_all(&record_buf[..n])?;
            if tree.count_at(k) == 0 {
                spill.finish()?;
            }

            bytes_written += n as u64;
            bytes_since_report += n as u64;
            if bytes_since_report >= report_every || remaining == 0 {
                report_progress("records written", total_records - remaining, bytes_written)?;
                bytes_since_report = 0;
            }
        }

        end_progress_line()?;
        info!("done");
        Ok(())
    }
}

/// Rewrites the carriage-returned progress line on stderr.
///
/// Progress is advisory and bypasses the logger so the line can update in
/// place.
fn report_progress(label: &str, records: u64, bytes: u64) -> Result<()> {
    let mut stderr = io::stderr();
    write!(stderr, "\r{label}: {records}, GiB: {}", bytes >> 30)?;
    stderr.flush()?;
    Ok(())
}

/// Terminates the progress line before regular log output resumes.
fn end_progress_line() -> Result<()> {
    let mut stderr = io::stderr();
    writeln!(stderr)?;
    Ok(())
}
