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

//! Terashuffle performs a uniform random permutation of the records of a byte
//! stream whose total size may far exceed available memory.
//!
//! Records are maximal byte runs not containing a one-byte delimiter, each
//! followed by that delimiter. The shuffle runs in two passes around a single
//! fixed-size in-memory arena: pass 1 reads arena-sized chunks, permutes each
//! chunk and spills it to a temporary file; pass 2 merges the spills, drawing
//! each output record from a spill chosen with probability proportional to its
//! remaining record count.

pub mod arena;
pub mod chunk;
pub mod config;
pub mod constants;
pub mod error;
pub mod pipeline;
pub mod spill;
pub mod weights;
