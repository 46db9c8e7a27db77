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

//! Statistical check that the shuffle is uniform over permutations.
//!
//! Four distinct records have 24 orderings. Shuffling the same input under
//! many seeds and binning the observed orderings should give an empirical
//! distribution close to uniform; the chi-squared statistic against the
//! uniform expectation has 23 degrees of freedom, so values far above ~50
//! would indicate a biased shuffle rather than sampling noise.

use std::io::Cursor;
use std::path::Path;

use tempfile::tempdir;

use terashuffle::config::Config;
use terashuffle::pipeline::ShufflePipeline;

const RECORDS: [&[u8]; 4] = [b"a", b"b", b"c", b"d"];
const FACTORIAL: usize = 24;
const RUNS: u64 = 2400;

// ~8 sigma above the chi-squared mean for 23 degrees of freedom; loose
// enough to never trip on sampling noise, tight enough to catch real bias.
const CHI_SQUARED_LIMIT: f64 = 80.0;

fn shuffle_once(seed: u64, arena_bytes: usize, spill_dir: &Path) -> Vec<u8> {
    let config = Config {
        sep: b'\n',
        arena_bytes,
        seed,
        skip: 0,
        spill_dir: spill_dir.to_path_buf(),
    };
    let input: Vec<u8> = RECORDS.iter().flat_map(|r| [r[0], b'\n']).collect();
    let mut output = Vec::new();
    ShufflePipeline::new(config, Cursor::new(input), &mut output)
        .run()
        .expect("shuffle failed");
    output
}

/// Maps an output ordering of the four records to its rank in 0..24.
fn permutation_rank(output: &[u8]) -> usize {
    let perm: Vec<usize> = output
        .split(|&b| b == b'\n')
        .filter(|r| !r.is_empty())
        .map(|r| RECORDS.iter().position(|x| *x == r).expect("alien record"))
        .collect();
    assert_eq!(perm.len(), RECORDS.len());

    let mut rank = 0;
    for i in 0..perm.len() {
        let smaller = perm[i + 1..].iter().filter(|&&x| x < perm[i]).count();
        rank = rank * (perm.len() - i) + smaller;
    }
    rank
}

fn chi_squared(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    let expected = total as f64 / counts.len() as f64;
    counts
        .iter()
        .map(|&c| {
            let d = c as f64 - expected;
            d * d / expected
        })
        .sum()
}

/// In-memory fast path: everything fits in one chunk.
#[test]
fn test_single_chunk_shuffle_is_uniform() {
    let dir = tempdir().unwrap();
    let mut counts = [0u64; FACTORIAL];
    for seed in 0..RUNS {
        let output = shuffle_once(seed, 1024, dir.path());
        counts[permutation_rank(&output)] += 1;
    }

    let statistic = chi_squared(&counts);
    assert!(
        statistic < CHI_SQUARED_LIMIT,
        "chi-squared {statistic:.1} over 23 degrees of freedom; counts {counts:?}"
    );
}

/// Spilling path: a 6-byte arena forces multiple spills and the weighted
/// merge, which must preserve uniformity end to end.
#[test]
fn test_spilled_shuffle_is_uniform() {
    let dir = tempdir().unwrap();
    let mut counts = [0u64; FACTORIAL];
    for seed in 0..RUNS {
        let output = shuffle_once(seed, 6, dir.path());
        counts[permutation_rank(&output)] += 1;
    }

    let statistic = chi_squared(&counts);
    assert!(
        statistic < CHI_SQUARED_LIMIT,
        "chi-squared {statistic:.1} over 23 degrees of freedom; counts {counts:?}"
    );
}
