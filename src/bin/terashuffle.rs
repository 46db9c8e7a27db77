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

//! Shuffles the records on stdin uniformly onto stdout.
//!
//! Takes no arguments; configuration is read from the `MEMORY`, `SEP`,
//! `SEED`, `SKIP`, and `TMPDIR` environment variables.

use std::io::{self, BufWriter};
use std::process;

use env_logger::Env;

use terashuffle::config::Config;
use terashuffle::pipeline::ShufflePipeline;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("terashuffle: {e}");
            process::exit(1);
        }
    };

    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    if let Err(e) = ShufflePipeline::new(config, stdin, stdout).run() {
        eprintln!("\nterashuffle: {e}");
        process::exit(1);
    }
}
