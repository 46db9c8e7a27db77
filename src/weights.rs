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

//! Weighted random selection over per-spill remaining record counts.
//!
//! A Fenwick-style sum heap: a complete binary tree whose leaves hold the
//! remaining count of each spill and whose internal nodes hold the sum of
//! their children. Selecting a spill proportionally to its weight and
//! decrementing that weight is a single root-to-leaf walk, so the merge pass
//! stays O(log S) per record even with thousands of spills.

/// Sum heap over per-spill remaining record counts.
pub struct WeightTree {
    /// `2 * leaf_base` nodes; node 1 is the root, leaf `i` lives at
    /// `leaf_base + i`, and node `v` sums its children `2v` and `2v + 1`.
    nodes: Vec<u64>,

    /// Number of leaves: the weight count rounded up to a power of two.
    /// Surplus leaves stay zero and are never reached by a draw.
    leaf_base: usize,
}

impl WeightTree {
    /// Builds the tree from initial weights in O(n).
    pub fn new(weights: &[u64]) -> Self {
        let leaf_base = weights.len().next_power_of_two().max(1);
        let mut nodes = vec![0u64; 2 * leaf_base];
        nodes[leaf_base..leaf_base + weights.len()].copy_from_slice(weights);
        for v in (1..leaf_base).rev() {
            nodes[v] = nodes[2 * v] + nodes[2 * v + 1];
        }
        Self { nodes, leaf_base }
    }

    /// Total remaining weight; the root of the heap.
    pub fn total(&self) -> u64 {
        self.nodes[1]
    }

    /// Selects the leaf whose cumulative-weight interval contains `p` and
    /// decrements its weight by one, returning the leaf index.
    ///
    /// `p` must be uniform in `[0, total())`; the draw is then uniform over
    /// the remaining units of weight. The decrement happens lazily on the
    /// walk down, so one O(log n) descent both selects and updates.
    pub fn draw_and_decrement(&mut self, mut p: u64) -> usize {
        debug_assert!(p < self.total());
        let mut v = 1;
        loop {
            self.nodes[v] -= 1;
            if v >= self.leaf_base {
                return v - self.leaf_base;
            }
            v *= 2;
            let left = self.nodes[v];
            if p >= left {
                p -= left;
                v += 1;
            }
        }
    }

    /// Remaining weight of leaf `k`.
    pub fn count_at(&self, k: usize) -> u64 {
        self.nodes[self.leaf_base + k]
    }
}
