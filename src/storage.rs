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

//! Reference storage implementation: chunked columnar iteration and random
//! access by `RowId`.
//!
//! The real storage/segment layer is an external collaborator; this module
//! is the concrete stand-in the operator is tested against, and the seam
//! an embedder with its own column store would adapt.

use crate::types::{ChunkOffset, ColumnDataType, ColumnId, SegmentValue};

/// One column's data within a chunk. Values are stored densely; a `None`
/// marks SQL NULL.
#[derive(Debug, Clone)]
pub enum Column {
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
}

impl Column {
    pub fn data_type(&self) -> ColumnDataType {
        match self {
            Column::Int32(_) => ColumnDataType::Int32,
            Column::Int64(_) => ColumnDataType::Int64,
            Column::Float64(_) => ColumnDataType::Float64,
            Column::Utf8(_) => ColumnDataType::Utf8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int32(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Utf8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Random access by offset. Returns `None` if the value is SQL NULL.
    pub fn value_at(&self, offset: ChunkOffset) -> Option<SegmentValue<'_>> {
        let offset = offset as usize;
        match self {
            Column::Int32(v) => v[offset].map(SegmentValue::Int32),
            Column::Int64(v) => v[offset].map(SegmentValue::Int64),
            Column::Float64(v) => v[offset].map(SegmentValue::Float64),
            Column::Utf8(v) => v[offset].as_deref().map(SegmentValue::Utf8),
        }
    }

    /// Visits every position in offset order, yielding `(offset, is_null,
    /// value)`. `value` is a default placeholder when `is_null` is true.
    pub fn visit(&self, mut f: impl FnMut(ChunkOffset, bool, SegmentValue<'_>)) {
        match self {
            Column::Int32(v) => {
                for (i, x) in v.iter().enumerate() {
                    f(i as ChunkOffset, x.is_none(), SegmentValue::Int32(x.unwrap_or_default()));
                }
            }
            Column::Int64(v) => {
                for (i, x) in v.iter().enumerate() {
                    f(i as ChunkOffset, x.is_none(), SegmentValue::Int64(x.unwrap_or_default()));
                }
            }
            Column::Float64(v) => {
                for (i, x) in v.iter().enumerate() {
                    f(i as ChunkOffset, x.is_none(), SegmentValue::Float64(x.unwrap_or_default()));
                }
            }
            Column::Utf8(v) => {
                for (i, x) in v.iter().enumerate() {
                    f(i as ChunkOffset, x.is_none(), SegmentValue::Utf8(x.as_deref().unwrap_or("")));
                }
            }
        }
    }

    pub fn from_i32(values: Vec<Option<i32>>) -> Self {
        Column::Int32(values)
    }

    pub fn from_i64(values: Vec<Option<i64>>) -> Self {
        Column::Int64(values)
    }

    pub fn from_f64(values: Vec<Option<f64>>) -> Self {
        Column::Float64(values)
    }

    pub fn from_str(values: Vec<Option<&str>>) -> Self {
        Column::Utf8(values.into_iter().map(|v| v.map(str::to_owned)).collect())
    }
}

/// An immutable horizontal partition of a table: one segment per column,
/// all sliced to the same row count.
#[derive(Debug, Clone)]
pub struct Chunk {
    columns: Vec<Column>,
}

impl Chunk {
    pub fn new(columns: Vec<Column>) -> Self {
        debug_assert!(
            columns.windows(2).all(|w| w[0].len() == w[1].len()),
            "all segments in a chunk must have the same row count"
        );
        Chunk { columns }
    }

    /// Number of rows in this chunk.
    pub fn size(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn get_segment(&self, column_id: ColumnId) -> &Column {
        &self.columns[column_id as usize]
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: ColumnDataType,
    pub nullable: bool,
}

/// A chunked columnar table: the operator's sole input.
#[derive(Debug, Clone, Default)]
pub struct Table {
    schema: Vec<ColumnMeta>,
    chunks: Vec<Chunk>,
}

impl Table {
    pub fn new(schema: Vec<ColumnMeta>, chunks: Vec<Chunk>) -> Self {
        Table { schema, chunks }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Missing chunks are skipped by the caller; the reference
    /// implementation never actually has gaps, but the signature mirrors
    /// the storage contract (§6) where `get_chunk` is nullable.
    pub fn get_chunk(&self, id: crate::types::ChunkId) -> Option<&Chunk> {
        self.chunks.get(id as usize)
    }

    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(Chunk::size).sum()
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    pub fn column_data_type(&self, column_id: ColumnId) -> ColumnDataType {
        self.schema[column_id as usize].data_type
    }

    pub fn column_is_nullable(&self, column_id: ColumnId) -> bool {
        self.schema[column_id as usize].nullable
    }

    pub fn column_name(&self, column_id: ColumnId) -> &str {
        &self.schema[column_id as usize].name
    }

    pub fn schema(&self) -> &[ColumnMeta] {
        &self.schema
    }
}
