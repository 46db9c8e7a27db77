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

//! Pass-1 chunk handling: filling the arena and shuffling its records.
//!
//! A chunk is the batch of records currently resident in the arena. The
//! [`reader::ChunkReader`] fills the arena from the input stream and indexes
//! record start offsets; [`shuffler::shuffle_and_flush`] permutes that index
//! and emits the records to a sink.

pub mod reader;
pub mod shuffler;

pub use reader::{ChunkReader, FillOutcome};
pub use shuffler::shuffle_and_flush;
