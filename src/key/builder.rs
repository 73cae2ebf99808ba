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

//! Key Builder: for each grouping column and each chunk, produce a dense
//! per-row `KeyEntry`. One task runs per grouping column;
//! each task owns its column's entries end to end (a `Vec<Vec<KeyEntry>>`,
//! one inner vector per chunk), so there is no shared mutable state beyond
//! the single result slot a task reports into.

use std::collections::HashMap;
use std::sync::Mutex;

use ahash::RandomState;
use ordered_float::OrderedFloat;

use crate::error::{AggregateError, Result};
use crate::key::{GroupKey, GroupKeyShape, KeyEntry};
use crate::scheduler::{Scheduler, Task};
use crate::storage::{Column, Table};
use crate::types::ColumnId;

/// Observed range of a single grouping column's emitted entries. Only
/// meaningful (and only consulted by the Key Compactor) when there is
/// exactly one grouping column.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnKeyStats {
    pub min: u64,
    pub max: u64,
}

/// Per-chunk, per-row group keys plus (for the K=1 case) the value range
/// observed while building them.
pub struct KeyBuildOutput {
    pub per_chunk: Vec<Vec<GroupKey>>,
    pub single_column_stats: Option<ColumnKeyStats>,
}

/// Builds `GroupKey`s for every row of `table`, dispatching one scheduler
/// task per entry of `group_by`.
pub fn build_group_keys(
    table: &Table,
    group_by: &[ColumnId],
    scheduler: &dyn Scheduler,
) -> Result<KeyBuildOutput> {
    let shape = GroupKeyShape::from_num_columns(group_by.len());
    let chunk_count = table.chunk_count();

    if group_by.is_empty() {
        let per_chunk = (0..chunk_count)
            .map(|c| vec![GroupKey::Empty; table.get_chunk(c as u32).map_or(0, |c| c.size())])
            .collect();
        return Ok(KeyBuildOutput {
            per_chunk,
            single_column_stats: None,
        });
    }

    // Each task writes exactly once into its own slot; the Mutex exists
    // only to satisfy `Send`/interior mutability, not for real contention
    // (tasks never touch each other's slot).
    let results: Mutex<Vec<Option<Result<(Vec<Vec<KeyEntry>>, ColumnKeyStats)>>>> =
        Mutex::new((0..group_by.len()).map(|_| None).collect());

    let tasks: Vec<Task<'_>> = group_by
        .iter()
        .enumerate()
        .map(|(slot, &column_id)| {
            let results = &results;
            Box::new(move || {
                let outcome = build_column(table, column_id);
                results.lock().unwrap()[slot] = Some(outcome);
            }) as Task<'_>
        })
        .collect();

    scheduler.schedule_and_wait_for_tasks(tasks);

    let mut per_column_entries: Vec<Vec<Vec<KeyEntry>>> = Vec::with_capacity(group_by.len());
    let mut per_column_stats: Vec<ColumnKeyStats> = Vec::with_capacity(group_by.len());
    for slot in results.into_inner().unwrap() {
        let (entries, stats) = slot.expect("every task reports exactly one result")?;
        per_column_entries.push(entries);
        per_column_stats.push(stats);
    }

    let single_column_stats = if group_by.len() == 1 {
        Some(per_column_stats[0])
    } else {
        None
    };

    let per_chunk = assemble_rows(&shape, per_column_entries, chunk_count);

    Ok(KeyBuildOutput {
        per_chunk,
        single_column_stats,
    })
}

/// Merge the per-column entry vectors (column-major) into per-row
/// `GroupKey`s (row-major). For K=1 this degenerates into a cheap wrap
/// with no transpose.
fn assemble_rows(
    shape: &GroupKeyShape,
    mut per_column_entries: Vec<Vec<Vec<KeyEntry>>>,
    chunk_count: usize,
) -> Vec<Vec<GroupKey>> {
    match shape {
        GroupKeyShape::Single => {
            let column = per_column_entries.pop().unwrap();
            column
                .into_iter()
                .map(|entries| entries.into_iter().map(GroupKey::Single).collect())
                .collect()
        }
        GroupKeyShape::Pair => {
            let second = per_column_entries.pop().unwrap();
            let first = per_column_entries.pop().unwrap();
            (0..chunk_count)
                .map(|c| {
                    first[c]
                        .iter()
                        .zip(second[c].iter())
                        .map(|(&a, &b)| GroupKey::Pair([a, b]))
                        .collect()
                })
                .collect()
        }
        GroupKeyShape::Many(k) => (0..chunk_count)
            .map(|c| {
                let rows = per_column_entries[0][c].len();
                (0..rows)
                    .map(|r| {
                        let mut key = smallvec::SmallVec::with_capacity(*k);
                        for col in per_column_entries.iter() {
                            key.push(col[c][r]);
                        }
                        GroupKey::Many(key)
                    })
                    .collect()
            })
            .collect(),
        GroupKeyShape::Empty => unreachable!("K=0 is handled before scheduling any tasks"),
    }
}

/// Builds one column's entries across every chunk of `table`, dispatching
/// on the column's data type.
fn build_column(
    table: &Table,
    column_id: ColumnId,
) -> Result<(Vec<Vec<KeyEntry>>, ColumnKeyStats)> {
    if column_id as usize >= table.column_count() {
        return Err(AggregateError::GroupByOutOfBounds {
            column_id,
            column_count: table.column_count() as u32,
        });
    }

    match table.column_data_type(column_id) {
        crate::types::ColumnDataType::Int32 => build_int32(table, column_id),
        crate::types::ColumnDataType::Int64 => build_with_id_map(table, column_id, 1, |col, row| {
            int64_value(col, row)
        }),
        crate::types::ColumnDataType::Float64 => {
            build_with_id_map(table, column_id, 1, |col, row| float64_value(col, row))
        }
        crate::types::ColumnDataType::Utf8 => build_utf8(table, column_id),
    }
}

/// Case A: 32-bit signed integers need no id map. Every value maps into a
/// disjoint positive 64-bit integer: `(i64(v) - i32::MIN) + 1`.
fn build_int32(table: &Table, column_id: ColumnId) -> Result<(Vec<Vec<KeyEntry>>, ColumnKeyStats)> {
    let mut per_chunk = Vec::with_capacity(table.chunk_count());
    let mut stats = ColumnKeyStats {
        min: u64::MAX,
        max: 0,
    };

    for chunk_id in 0..table.chunk_count() as u32 {
        let chunk = table.get_chunk(chunk_id).expect("dense chunk ids");
        let segment = chunk.get_segment(column_id);
        let Column::Int32(values) = segment else {
            return Err(AggregateError::internal(
                "column data type mismatch between schema and segment",
            ));
        };

        let mut entries = Vec::with_capacity(values.len());
        for v in values {
            let entry = match v {
                None => 0,
                Some(v) => {
                    let shifted = (*v as i64) - (i32::MIN as i64);
                    if shifted < 0 {
                        return Err(AggregateError::internal(
                            "int32 key shift produced a negative value",
                        ));
                    }
                    (shifted as u64) + 1
                }
            };
            if entry != 0 {
                stats.min = stats.min.min(entry);
                stats.max = stats.max.max(entry);
            }
            entries.push(entry);
        }
        per_chunk.push(entries);
    }

    if stats.min > stats.max {
        stats = ColumnKeyStats { min: 0, max: 0 };
    }
    Ok((per_chunk, stats))
}

fn int64_value(col: &Column, row: usize) -> Option<i64> {
    match col {
        Column::Int64(v) => v[row],
        _ => None,
    }
}

fn float64_value(col: &Column, row: usize) -> Option<OrderedFloat<f64>> {
    match col {
        Column::Float64(v) => v[row].map(OrderedFloat),
        _ => None,
    }
}

/// Case B: 64-bit integers and floats share the same id-map strategy,
/// differing only in the key type and in the accessor used to pull a
/// value out of the column.
fn build_with_id_map<K, F>(
    table: &Table,
    column_id: ColumnId,
    first_id: u64,
    accessor: F,
) -> Result<(Vec<Vec<KeyEntry>>, ColumnKeyStats)>
where
    K: std::hash::Hash + Eq,
    F: Fn(&Column, usize) -> Option<K>,
{
    let mut id_map: HashMap<K, u64, RandomState> = HashMap::default();
    let mut next_id = first_id;
    let mut per_chunk = Vec::with_capacity(table.chunk_count());
    let mut stats = ColumnKeyStats {
        min: u64::MAX,
        max: 0,
    };

    for chunk_id in 0..table.chunk_count() as u32 {
        let chunk = table.get_chunk(chunk_id).expect("dense chunk ids");
        let segment = chunk.get_segment(column_id);
        let mut entries = Vec::with_capacity(segment.len());
        for row in 0..segment.len() {
            let entry = match accessor(segment, row) {
                None => 0,
                Some(value) => *id_map.entry(value).or_insert_with(|| {
                    let id = next_id;
                    next_id += 1;
                    id
                }),
            };
            if entry != 0 {
                stats.min = stats.min.min(entry);
                stats.max = stats.max.max(entry);
            }
            entries.push(entry);
        }
        per_chunk.push(entries);
    }

    if stats.min > stats.max {
        stats = ColumnKeyStats { min: 0, max: 0 };
    }
    Ok((per_chunk, stats))
}

/// Case B, string sub-optimization: strings of length 0..=4 are encoded
/// directly from their bytes with no id-map lookup; longer strings fall
/// back to an id map whose ids start at 5,000,000,000, disjoint from the
/// short-string range.
const LONG_STRING_FIRST_ID: u64 = 5_000_000_000;

fn short_string_id(bytes: &[u8]) -> Option<u64> {
    Some(match bytes.len() {
        0 => 1,
        1 => 2 + bytes[0] as u64,
        2 => 258 + ((bytes[1] as u64) << 8) + bytes[0] as u64,
        3 => 65_794 + ((bytes[2] as u64) << 16) + ((bytes[1] as u64) << 8) + bytes[0] as u64,
        4 => {
            16_843_010
                + ((bytes[3] as u64) << 24)
                + ((bytes[2] as u64) << 16)
                + ((bytes[1] as u64) << 8)
                + bytes[0] as u64
        }
        _ => return None,
    })
}

fn build_utf8(table: &Table, column_id: ColumnId) -> Result<(Vec<Vec<KeyEntry>>, ColumnKeyStats)> {
    let mut id_map: HashMap<String, u64, RandomState> = HashMap::default();
    let mut next_id = LONG_STRING_FIRST_ID;
    let mut per_chunk = Vec::with_capacity(table.chunk_count());
    let mut stats = ColumnKeyStats {
        min: u64::MAX,
        max: 0,
    };

    for chunk_id in 0..table.chunk_count() as u32 {
        let chunk = table.get_chunk(chunk_id).expect("dense chunk ids");
        let segment = chunk.get_segment(column_id);
        let Column::Utf8(values) = segment else {
            return Err(AggregateError::internal(
                "column data type mismatch between schema and segment",
            ));
        };

        let mut entries = Vec::with_capacity(values.len());
        for v in values {
            let entry = match v {
                None => 0,
                Some(s) => match short_string_id(s.as_bytes()) {
                    Some(id) => id,
                    None => *id_map.entry(s.clone()).or_insert_with(|| {
                        let id = next_id;
                        next_id += 1;
                        id
                    }),
                },
            };
            if entry != 0 {
                stats.min = stats.min.min(entry);
                stats.max = stats.max.max(entry);
            }
            entries.push(entry);
        }
        per_chunk.push(entries);
    }

    if stats.min > stats.max {
        stats = ColumnKeyStats { min: 0, max: 0 };
    }
    Ok((per_chunk, stats))
}
