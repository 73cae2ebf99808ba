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

//! Column data types, aggregate functions, and the row-identity types
//! shared across the operator.

use std::fmt;

/// Dense chunk identifier, starting at 0.
pub type ChunkId = u32;
/// Offset of a row within its chunk.
pub type ChunkOffset = u32;

pub const INVALID_CHUNK_ID: ChunkId = ChunkId::MAX;
pub const INVALID_CHUNK_OFFSET: ChunkOffset = ChunkOffset::MAX;

/// A reference to a single input row. The sentinel value (both fields
/// `INVALID`) marks an unused result slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowId {
    pub chunk_id: ChunkId,
    pub chunk_offset: ChunkOffset,
}

impl RowId {
    pub const INVALID: RowId = RowId {
        chunk_id: INVALID_CHUNK_ID,
        chunk_offset: INVALID_CHUNK_OFFSET,
    };

    pub fn new(chunk_id: ChunkId, chunk_offset: ChunkOffset) -> Self {
        RowId {
            chunk_id,
            chunk_offset,
        }
    }

    pub fn is_valid(&self) -> bool {
        *self != RowId::INVALID
    }
}

impl Default for RowId {
    fn default() -> Self {
        RowId::INVALID
    }
}

/// Index of a column within a table.
pub type ColumnId = u32;
pub const INVALID_COLUMN_ID: ColumnId = ColumnId::MAX;

/// The data types the Key Builder and the aggregator kernels know how to
/// specialize over: the scalar types that have explicit Key Builder
/// encoding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnDataType {
    Int32,
    Int64,
    Float64,
    Utf8,
}

impl fmt::Display for ColumnDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnDataType::Int32 => "int32",
            ColumnDataType::Int64 => "int64",
            ColumnDataType::Float64 => "float64",
            ColumnDataType::Utf8 => "utf8",
        };
        f.write_str(s)
    }
}

impl ColumnDataType {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            ColumnDataType::Int32 | ColumnDataType::Int64 | ColumnDataType::Float64
        )
    }
}

/// The aggregate functions the kernel dispatch table supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Min,
    Max,
    Sum,
    Avg,
    Count,
    CountDistinct,
    StddevSamp,
    /// Pseudo-aggregate: the column is functionally dependent on the
    /// grouping columns and is carried through verbatim from the
    /// representative row.
    Any,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::CountDistinct => "COUNT DISTINCT",
            AggregateFunction::StddevSamp => "STDDEV_SAMP",
            AggregateFunction::Any => "ANY",
        };
        f.write_str(s)
    }
}

impl AggregateFunction {
    /// Whether this function ever needs arithmetic (widened accumulation,
    /// division) and is thus restricted to arithmetic column types.
    pub fn requires_arithmetic(&self) -> bool {
        matches!(self, AggregateFunction::Avg | AggregateFunction::StddevSamp)
    }

    /// Whether this function's output is never NULL (COUNT family).
    pub fn never_null(&self) -> bool {
        matches!(self, AggregateFunction::Count | AggregateFunction::CountDistinct)
    }
}

/// One typed value read out of a segment, borrowed for the duration of a
/// single kernel call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentValue<'a> {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(&'a str),
}

impl<'a> SegmentValue<'a> {
    pub fn data_type(&self) -> ColumnDataType {
        match self {
            SegmentValue::Int32(_) => ColumnDataType::Int32,
            SegmentValue::Int64(_) => ColumnDataType::Int64,
            SegmentValue::Float64(_) => ColumnDataType::Float64,
            SegmentValue::Utf8(_) => ColumnDataType::Utf8,
        }
    }
}
