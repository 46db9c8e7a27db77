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

//! Run configuration resolved from environment variables.
//!
//! All settings are optional; an unset or empty variable means its default:
//!
//! | Variable | Meaning                                      | Default              |
//! |----------|----------------------------------------------|----------------------|
//! | `MEMORY` | Arena size in GiB, decimal float             | `4`                  |
//! | `SEP`    | Delimiter; the first byte of the value       | newline (`0x0A`)     |
//! | `SEED`   | 64-bit PRNG seed                             | wall-clock seconds   |
//! | `SKIP`   | Leading records copied verbatim              | `0`                  |
//! | `TMPDIR` | Directory for spill files                    | `/tmp`               |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{BYTES_PER_GIB, DEFAULT_MEMORY_GIB, DEFAULT_SEP, DEFAULT_SPILL_DIR};
use crate::error::{Result, ShuffleError};

/// Immutable settings for one shuffle run.
#[derive(Debug, Clone)]
pub struct Config {
    /// The record delimiter byte.
    pub sep: u8,

    /// Arena size in bytes.
    pub arena_bytes: usize,

    /// Seed for the pseudorandom generator.
    pub seed: u64,

    /// Number of leading records copied verbatim before shuffling begins.
    pub skip: u64,

    /// Directory that receives spill files.
    pub spill_dir: PathBuf,
}

impl Config {
    /// Resolves the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ShuffleError::Config`] when a variable holds a value that
    /// cannot be parsed, or when `MEMORY` yields an arena of zero bytes.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolves the configuration through a variable lookup function.
    ///
    /// Factored out of [`Config::from_env`] so tests can exercise parsing
    /// without touching process-global environment state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sep = match nonempty(lookup("SEP")) {
            Some(value) => value.as_bytes()[0],
            None => DEFAULT_SEP,
        };

        let memory_gib = parse_var::<f64>("MEMORY", lookup("MEMORY"))?.unwrap_or(DEFAULT_MEMORY_GIB);
        if !memory_gib.is_finite() || memory_gib < 0.0 {
            return Err(ShuffleError::Config(format!(
                "MEMORY must be a non-negative number of GiB, got {memory_gib}"
            )));
        }
        let arena_bytes = (memory_gib * BYTES_PER_GIB) as usize;
        if arena_bytes == 0 {
            return Err(ShuffleError::Config(format!(
                "MEMORY={memory_gib} yields a zero-byte arena, which cannot hold any record"
            )));
        }

        let seed = match parse_var::<u64>("SEED", lookup("SEED"))? {
            Some(seed) => seed,
            None => wall_clock_seconds(),
        };

        let skip = parse_var::<u64>("SKIP", lookup("SKIP"))?.unwrap_or(0);

        let spill_dir = match nonempty(lookup("TMPDIR")) {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(DEFAULT_SPILL_DIR),
        };

        Ok(Self {
            sep,
            arena_bytes,
            seed,
            skip,
            spill_dir,
        })
    }
}

/// Treats an empty value the same as an unset one.
fn nonempty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parses a non-empty variable, reporting the variable name on failure.
fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    match nonempty(value) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            ShuffleError::Config(format!("{name} holds an unparseable value: {raw:?}"))
        }),
    }
}

fn wall_clock_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&[]).unwrap();
        assert_eq!(config.sep, b'\n');
        assert_eq!(config.arena_bytes, 4 * (1 << 30));
        assert_eq!(config.skip, 0);
        assert_eq!(config.spill_dir, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_empty_values_mean_defaults() {
        let config = resolve(&[
            ("SEP", ""),
            ("MEMORY", ""),
            ("SEED", ""),
            ("SKIP", ""),
            ("TMPDIR", ""),
        ])
        .unwrap();
        assert_eq!(config.sep, b'\n');
        assert_eq!(config.arena_bytes, 4 * (1 << 30));
        assert_eq!(config.skip, 0);
        assert_eq!(config.spill_dir, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_sep_takes_first_byte() {
        let config = resolve(&[("SEP", "|therest")]).unwrap();
        assert_eq!(config.sep, b'|');
    }

    #[test]
    fn test_memory_is_fractional_gib() {
        let config = resolve(&[("MEMORY", "0.5")]).unwrap();
        assert_eq!(config.arena_bytes, 1 << 29);

        // Truncation, not rounding.
        let config = resolve(&[("MEMORY", "0.000001")]).unwrap();
        assert_eq!(config.arena_bytes, 1073);
    }

    #[test]
    fn test_seed_and_skip_parse_as_integers() {
        let config = resolve(&[("SEED", "12345"), ("SKIP", "7")]).unwrap();
        assert_eq!(config.seed, 12345);
        assert_eq!(config.skip, 7);
    }

    #[test]
    fn test_unset_seed_uses_wall_clock() {
        let before = wall_clock_seconds();
        let config = resolve(&[]).unwrap();
        let after = wall_clock_seconds();
        assert!(config.seed >= before && config.seed <= after);
    }

    #[test]
    fn test_garbage_values_are_rejected() {
        assert!(matches!(
            resolve(&[("MEMORY", "lots")]),
            Err(ShuffleError::Config(_))
        ));
        assert!(matches!(
            resolve(&[("SEED", "0x10")]),
            Err(ShuffleError::Config(_))
        ));
        assert!(matches!(
            resolve(&[("SKIP", "-1")]),
            Err(ShuffleError::Config(_))
        ));
    }

    #[test]
    fn test_degenerate_memory_is_rejected() {
        assert!(matches!(
            resolve(&[("MEMORY", "0")]),
            Err(ShuffleError::Config(_))
        ));
        assert!(matches!(
            resolve(&[("MEMORY", "-2")]),
            Err(ShuffleError::Config(_))
        ));
        assert!(matches!(
            resolve(&[("MEMORY", "inf")]),
            Err(ShuffleError::Config(_))
        ));
    }

    #[test]
    fn test_tmpdir_overrides_spill_dir() {
        let config = resolve(&[("TMPDIR", "/var/spool/shuf")]).unwrap();
        assert_eq!(config.spill_dir, PathBuf::from("/var/spool/shuf"));
    }
}
