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

//! `GroupKey`, the four-shape per-row group identifier, and the 64-bit
//! `KeyEntry` it is built from.

pub mod builder;
pub mod compactor;

use smallvec::SmallVec;

/// One 64-bit component of a `GroupKey`. `0` is reserved for SQL NULL; the
/// top bit (`RESULT_ID_CACHE_BIT`) flags that the lower 63 bits already
/// hold a `result_id` (set by the Key Compactor).
pub type KeyEntry = u64;

pub const RESULT_ID_CACHE_BIT: u64 = 1 << 63;
pub const KEY_ENTRY_VALUE_MASK: u64 = RESULT_ID_CACHE_BIT - 1;

/// The per-row group identifier. The shape is fixed for an entire operator
/// invocation, chosen once from the number of grouping columns `K`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// K=0: a single global group.
    Empty,
    /// K=1.
    Single(KeyEntry),
    /// K=2.
    Pair([KeyEntry; 2]),
    /// K>2, heap-backed but small (no allocation for common K thanks to
    /// the inline capacity).
    Many(SmallVec<[KeyEntry; 4]>),
}

impl GroupKey {
    pub fn entries(&self) -> &[KeyEntry] {
        match self {
            GroupKey::Empty => &[],
            GroupKey::Single(e) => std::slice::from_ref(e),
            GroupKey::Pair(e) => e.as_slice(),
            GroupKey::Many(e) => e.as_slice(),
        }
    }

    /// The first (and, for K=1, only) `KeyEntry`. Used by the Group Map's
    /// result-id cache fast path, which only ever applies when K=1.
    pub fn first_entry(&self) -> KeyEntry {
        match self {
            GroupKey::Empty => 0,
            GroupKey::Single(e) => *e,
            GroupKey::Pair(e) => e[0],
            GroupKey::Many(e) => e[0],
        }
    }

    pub fn set_first_entry(&mut self, value: KeyEntry) {
        match self {
            GroupKey::Empty => {}
            GroupKey::Single(e) => *e = value,
            GroupKey::Pair(e) => e[0] = value,
            GroupKey::Many(e) => e[0] = value,
        }
    }

    /// Whether the top bit of the first entry is set, i.e. a `result_id`
    /// is already cached directly in the key. Only meaningful when the
    /// caller knows compaction was applied (K=1 and the range was dense
    /// enough); checking it unconditionally on an uncompacted K=1 key is
    /// safe too since real grouping values never reach the top bit (Case A
    /// and Case B id allocation both start well below `1 << 63`).
    pub fn is_result_id_cached(&self) -> bool {
        self.first_entry() & RESULT_ID_CACHE_BIT != 0
    }

    pub fn cached_result_id(&self) -> u32 {
        (self.first_entry() & KEY_ENTRY_VALUE_MASK) as u32
    }
}

/// The shape of `GroupKey` for this operator invocation, fixed by the
/// number of grouping columns.
#[derive(Debug, Clone, Copy)]
pub enum GroupKeyShape {
    Empty,
    Single,
    Pair,
    Many(usize),
}

impl GroupKeyShape {
    pub fn from_num_columns(k: usize) -> Self {
        match k {
            0 => GroupKeyShape::Empty,
            1 => GroupKeyShape::Single,
            2 => GroupKeyShape::Pair,
            k => GroupKeyShape::Many(k),
        }
    }

    pub fn zeroed(&self) -> GroupKey {
        match self {
            GroupKeyShape::Empty => GroupKey::Empty,
            GroupKeyShape::Single => GroupKey::Single(0),
            GroupKeyShape::Pair => GroupKey::Pair([0, 0]),
            GroupKeyShape::Many(k) => GroupKey::Many(SmallVec::from_elem(0, *k)),
        }
    }
}
