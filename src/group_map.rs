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

//! The Group Map: a hash map from `GroupKey` to `result_id`, with a
//! dense-index fast path for single-column compacted keys.
//!
//! Modeled on `GroupedHashAggregateStream2`: a `RawTable` storing only
//! `(hash, result_id)` pairs (never the key itself), verified on hash
//! collision against a side table of canonical keys indexed by
//! `result_id`. One `GroupMap` is built per operator invocation and shared
//! across every aggregate kernel.

use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use hashbrown::raw::RawTable;

use crate::key::{GroupKey, GroupKeyShape, KeyEntry, RESULT_ID_CACHE_BIT};
use crate::types::RowId;

pub type ResultId = u32;

pub struct GroupMap {
    map: RawTable<(u64, ResultId)>,
    hasher: RandomState,
    /// Canonical key for each assigned `result_id`, used only to verify a
    /// hash match in `map`. Entries created via the cache-bit fast path
    /// are never looked up through `map` and are left as the zeroed key.
    keys_by_result_id: Vec<GroupKey>,
    /// `row_id` of the first row seen for each `result_id`; `RowId::INVALID`
    /// until a row is seen.
    representative_row_ids: Vec<RowId>,
    shape: GroupKeyShape,
    /// True when K=1 and the Key Compactor ran: the top bit of a key's
    /// entry already holds its `result_id`, so lookups bypass `map`.
    cache_result_ids: bool,
    is_k0: bool,
}

impl GroupMap {
    pub fn new(shape: GroupKeyShape, cache_result_ids: bool) -> Self {
        let is_k0 = matches!(shape, GroupKeyShape::Empty);
        GroupMap {
            map: RawTable::new(),
            hasher: RandomState::new(),
            keys_by_result_id: Vec::new(),
            representative_row_ids: Vec::new(),
            shape,
            cache_result_ids,
            is_k0,
        }
    }

    pub fn result_count(&self) -> usize {
        self.representative_row_ids.len()
    }

    pub fn representative_row_id(&self, result_id: ResultId) -> RowId {
        self.representative_row_ids[result_id as usize]
    }

    pub fn representative_row_ids(&self) -> &[RowId] {
        &self.representative_row_ids
    }

    /// `result_id`s that belong in the assembled output. Dense-range sizing
    /// (the Key Compactor, or `ensure_len` growing past the highest id a
    /// chunk actually assigned) can leave slots whose `representative_row_id`
    /// is still `RowId::INVALID` with no row ever having mapped to them;
    /// those are gaps, not groups, and are excluded here. The one exception
    /// is `K=0`: its single forced slot has no representative row by
    /// construction (there may be zero input rows) but must still appear in
    /// the output, so every slot is kept.
    pub fn live_result_ids(&self) -> Vec<ResultId> {
        let ids = 0..self.representative_row_ids.len() as ResultId;
        if self.is_k0 {
            ids.collect()
        } else {
            ids.filter(|&id| self.representative_row_ids[id as usize].is_valid())
                .collect()
        }
    }

    /// Returns the group's `result_id`, inserting a new group on first
    /// sight. When
    /// `cache_result_ids` is set, also writes the assigned id back into
    /// `key`'s top bit so the next row carrying the same (cloned) key can
    /// skip the hash table entirely.
    pub fn get_or_add_result(&mut self, key: &mut GroupKey, row_id: RowId) -> ResultId {
        if self.is_k0 {
            if self.representative_row_ids.is_empty() {
                self.representative_row_ids.push(RowId::INVALID);
            }
            self.record_row_id(0, row_id);
            return 0;
        }

        if self.cache_result_ids && key.is_result_id_cached() {
            let result_id = key.cached_result_id();
            self.ensure_len(result_id as usize + 1);
            self.record_row_id(result_id, row_id);
            return result_id;
        }

        let hash = hash_entries(&self.hasher, key.entries());
        let map = &mut self.map;
        let keys_by_result_id = &self.keys_by_result_id;
        let found = map.get(hash, |&(h, rid)| {
            h == hash && keys_by_result_id[rid as usize] == *key
        });

        let result_id = match found {
            Some(&(_, rid)) => rid,
            None => {
                let rid = self.keys_by_result_id.len() as ResultId;
                self.keys_by_result_id.push(key.clone());
                self.representative_row_ids.push(RowId::INVALID);
                self.map.insert(hash, (hash, rid), |&(h, _)| h);
                rid
            }
        };

        self.record_row_id(result_id, row_id);

        if self.cache_result_ids {
            key.set_first_entry((result_id as KeyEntry) | RESULT_ID_CACHE_BIT);
        }

        result_id
    }

    fn record_row_id(&mut self, result_id: ResultId, row_id: RowId) {
        if !self.representative_row_ids[result_id as usize].is_valid() {
            self.representative_row_ids[result_id as usize] = row_id;
        }
    }

    fn ensure_len(&mut self, len: usize) {
        if self.representative_row_ids.len() < len {
            self.representative_row_ids.resize(len, RowId::INVALID);
            self.keys_by_result_id.resize(len, self.shape.zeroed());
        }
    }
}

fn hash_entries(hasher: &RandomState, entries: &[KeyEntry]) -> u64 {
    let mut h = hasher.build_hasher();
    entries.hash(&mut h);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_stable_ids_to_equal_keys() {
        let mut map = GroupMap::new(GroupKeyShape::Single, false);
        let mut a = GroupKey::Single(7);
        let mut b = GroupKey::Single(7);
        let mut c = GroupKey::Single(8);

        let id_a = map.get_or_add_result(&mut a, RowId::new(0, 0));
        let id_b = map.get_or_add_result(&mut b, RowId::new(0, 1));
        let id_c = map.get_or_add_result(&mut c, RowId::new(0, 2));

        assert_eq!(id_a, id_b);
        assert_ne!(id_a, id_c);
        assert_eq!(map.representative_row_id(id_a), RowId::new(0, 0));
    }

    #[test]
    fn cached_ids_bypass_the_map() {
        let mut map = GroupMap::new(GroupKeyShape::Single, true);
        let mut key = GroupKey::Single(3 | RESULT_ID_CACHE_BIT);
        let id = map.get_or_add_result(&mut key, RowId::new(0, 0));
        assert_eq!(id, 3);
        assert_eq!(map.result_count(), 4);
    }

    #[test]
    fn k0_always_returns_the_same_slot() {
        let mut map = GroupMap::new(GroupKeyShape::Empty, false);
        let mut k1 = GroupKey::Empty;
        let mut k2 = GroupKey::Empty;
        assert_eq!(map.get_or_add_result(&mut k1, RowId::new(0, 0)), 0);
        assert_eq!(map.get_or_add_result(&mut k2, RowId::new(1, 5)), 0);
        assert_eq!(map.representative_row_id(0), RowId::new(0, 0));
    }
}
