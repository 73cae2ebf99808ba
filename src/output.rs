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

//! Output Assembler: gathers the grouping columns and `ANY` pseudo-aggregates
//! from each live group's representative row, pairs them with the finished
//! aggregate kernel columns compacted to the same set of live result ids,
//! and slices the result into `Config::batch_size`-sized chunks.
//!
//! Split into two entry points (rather than one `assemble` call) so the
//! operator can time "gathering passthrough columns" and "slicing into
//! output chunks" as two separate steps.

use crate::storage::{Chunk, Column, Table};
use crate::types::{ColumnId, RowId, SegmentValue};

/// Gather one column's values at a `PosList` of row ids, in order. The
/// caller is responsible for having already dropped any sentinel/gap
/// `RowId::INVALID` entries it does not want represented in the output; a
/// `RowId::INVALID` that does reach here (the forced `K=0` slot) produces a
/// `NULL` value, since there is no row to read from.
pub fn gather_column(table: &Table, column_id: ColumnId, row_ids: &[RowId]) -> Column {
    let mut read = |row_id: &RowId| -> Option<SegmentValue<'_>> {
        if !row_id.is_valid() {
            return None;
        }
        table
            .get_chunk(row_id.chunk_id)
            .map(|chunk| chunk.get_segment(column_id))
            .and_then(|segment| segment.value_at(row_id.chunk_offset))
    };

    match table.column_data_type(column_id) {
        crate::types::ColumnDataType::Int32 => Column::from_i32(
            row_ids
                .iter()
                .map(|r| match read(r) {
                    Some(SegmentValue::Int32(v)) => Some(v),
                    _ => None,
                })
                .collect(),
        ),
        crate::types::ColumnDataType::Int64 => Column::from_i64(
            row_ids
                .iter()
                .map(|r| match read(r) {
                    Some(SegmentValue::Int64(v)) => Some(v),
                    _ => None,
                })
                .collect(),
        ),
        crate::types::ColumnDataType::Float64 => Column::from_f64(
            row_ids
                .iter()
                .map(|r| match read(r) {
                    Some(SegmentValue::Float64(v)) => Some(v),
                    _ => None,
                })
                .collect(),
        ),
        crate::types::ColumnDataType::Utf8 => Column::Utf8(
            row_ids
                .iter()
                .map(|r| match read(r) {
                    Some(SegmentValue::Utf8(s)) => Some(s.to_owned()),
                    _ => None,
                })
                .collect(),
        ),
    }
}

/// Gather every grouping column (and, by the caller passing them in the
/// same list, every `ANY` pseudo-aggregate column) from the groups'
/// representative rows.
pub fn gather_passthrough_columns(
    table: &Table,
    passthrough_columns: &[ColumnId],
    representative_row_ids: &[RowId],
) -> Vec<Column> {
    passthrough_columns
        .iter()
        .map(|&column_id| gather_column(table, column_id, representative_row_ids))
        .collect()
}

/// Select a subset of rows, in order, from an already-materialized kernel
/// output column. `indices` are `result_id`s into `column`; used to drop the
/// gap slots a dense-range `result_id` space can leave unassigned before an
/// aggregate column is joined with the gathered grouping columns.
pub fn compact_column(column: Column, indices: &[u32]) -> Column {
    match column {
        Column::Int32(v) => Column::Int32(indices.iter().map(|&i| v[i as usize]).collect()),
        Column::Int64(v) => Column::Int64(indices.iter().map(|&i| v[i as usize]).collect()),
        Column::Float64(v) => Column::Float64(indices.iter().map(|&i| v[i as usize]).collect()),
        Column::Utf8(v) => {
            Column::Utf8(indices.iter().map(|&i| v[i as usize].clone()).collect())
        }
    }
}

fn slice_column(column: &Column, start: usize, end: usize) -> Column {
    match column {
        Column::Int32(v) => Column::Int32(v[start..end].to_vec()),
        Column::Int64(v) => Column::Int64(v[start..end].to_vec()),
        Column::Float64(v) => Column::Float64(v[start..end].to_vec()),
        Column::Utf8(v) => Column::Utf8(v[start..end].to_vec()),
    }
}

/// Slice the fully assembled result columns into `batch_size`-row chunks.
/// The empty-result rule (`K=0` emits exactly one row on empty input;
/// `K>0` emits zero rows) falls out for free: it's encoded in how many
/// rows `columns` holds, not in anything special-cased here.
pub fn slice_into_chunks(columns: Vec<Column>, batch_size: usize) -> Vec<Chunk> {
    let result_count = columns.first().map(Column::len).unwrap_or(0);
    if result_count == 0 {
        return Vec::new();
    }

    let batch_size = batch_size.max(1);
    let mut chunks = Vec::with_capacity((result_count + batch_size - 1) / batch_size);
    let mut start = 0;
    while start < result_count {
        let end = (start + batch_size).min(result_count);
        let sliced = columns.iter().map(|col| slice_column(col, start, end)).collect();
        chunks.push(Chunk::new(sliced));
        start = end;
    }
    chunks
}
