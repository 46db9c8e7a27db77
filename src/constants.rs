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

/// Size of each spill file's read buffer during the merge pass.
pub const SPILL_READ_BUF_BYTES: usize = 64 * 1024;

/// Prefix of spill file names; six random characters follow.
pub const SPILL_NAME_PREFIX: &str = "terashuftmp";

/// Number of random characters appended to [`SPILL_NAME_PREFIX`].
pub const SPILL_NAME_RAND_CHARS: usize = 6;

/// Indexed-record count at which the one-shot memory-overhead estimate is
/// logged.
pub const RECORDS_BEFORE_OVERHEAD_ESTIMATE: usize = 1_000_000;

/// Default delimiter when `SEP` is unset or empty.
pub const DEFAULT_SEP: u8 = b'\n';

/// Default arena size in GiB when `MEMORY` is unset or empty.
pub const DEFAULT_MEMORY_GIB: f64 = 4.0;

/// Default spill directory when `TMPDIR` is unset or empty.
pub const DEFAULT_SPILL_DIR: &str = "/tmp";

/// Bytes per GiB, as a float for the `MEMORY` conversion.
pub const BYTES_PER_GIB: f64 = (1u64 << 30) as f64;
