// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Key Compactor: for a single grouping column, if the
//! observed key range is narrow relative to the row count, rewrite keys
//! into a dense range and flag the result-id-cache bit so the Group Map
//! can skip the hash table entirely.

use crate::key::builder::ColumnKeyStats;
use crate::key::{GroupKey, RESULT_ID_CACHE_BIT};

/// Whether compaction applies, and if so the rewritten keys. Returns
/// `false` (skip) and leaves `per_chunk` untouched when the range is not
/// dense enough; the caller is expected to treat `min`/`max` as `0` in
/// that case so downstream code knows no compaction happened.
pub fn try_compact(
    per_chunk: &mut [Vec<GroupKey>],
    stats: ColumnKeyStats,
    row_count: usize,
    threshold_ratio: f64,
) -> bool {
    if row_count == 0 || stats.min > stats.max {
        return false;
    }
    let range = stats.max - stats.min;
    if (range as f64) >= threshold_ratio * (row_count as f64) {
        return false;
    }

    for chunk in per_chunk.iter_mut() {
        for key in chunk.iter_mut() {
            let entry = key.first_entry();
            if entry == 0 {
                // NULL stays NULL; it is still its own distinct group and
                // is handled by the Group Map like any other key.
                continue;
            }
            // 0-based: the Group Map's cache-bit fast path treats the
            // masked value directly as a `result_id`, which must start at
            // 0 to line up with the NULL group's id (assigned separately,
            // through the ordinary hash path, from the same 0-based
            // counter). An off-by-one here strands slot 0 and fabricates
            // a phantom empty group.
            let dense = entry - stats.min;
            key.set_first_entry(dense | RESULT_ID_CACHE_BIT);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_compaction_for_wide_range() {
        let mut per_chunk = vec![vec![GroupKey::Single(1), GroupKey::Single(1_000_000)]];
        let stats = ColumnKeyStats {
            min: 1,
            max: 1_000_000,
        };
        assert!(!try_compact(&mut per_chunk, stats, 2, 1.2));
        assert_eq!(per_chunk[0][0], GroupKey::Single(1));
    }

    #[test]
    fn compacts_dense_range_and_sets_cache_bit() {
        let mut per_chunk = vec![vec![
            GroupKey::Single(10),
            GroupKey::Single(11),
            GroupKey::Single(10),
            GroupKey::Single(0), // NULL
        ]];
        let stats = ColumnKeyStats { min: 10, max: 11 };
        assert!(try_compact(&mut per_chunk, stats, 4, 1.2));
        assert_eq!(
            per_chunk[0][0].first_entry(),
            0 | RESULT_ID_CACHE_BIT
        );
        assert_eq!(
            per_chunk[0][1].first_entry(),
            1 | RESULT_ID_CACHE_BIT
        );
        assert_eq!(per_chunk[0][2].first_entry(), 0 | RESULT_ID_CACHE_BIT);
        assert_eq!(per_chunk[0][3].first_entry(), 0);
    }
}
