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

//! Error type for the aggregate operator.
//!
//! None of these are recovered locally; construction or execution aborts
//! and the caller gets a typed reason back.

use crate::types::{AggregateFunction, ColumnDataType};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AggregateError>;

#[derive(Debug, Error)]
pub enum AggregateError {
    /// AVG/STDDEV requested on a non-arithmetic type, or SUM requested on
    /// `Utf8`.
    #[error("aggregate {function:?} is not valid for column type {data_type:?}")]
    InvalidAggregate {
        function: AggregateFunction,
        data_type: ColumnDataType,
    },

    /// A non-`COUNT` aggregate (or `ANY`) was given the invalid-column-id
    /// sentinel instead of a real input column. Only `COUNT(*)` may omit
    /// its input column.
    #[error("aggregate {function:?} requires an input column")]
    MissingInputColumn { function: AggregateFunction },

    /// A grouping column id named a column that does not exist in the
    /// input table.
    #[error("group-by column id {column_id} is out of bounds (table has {column_count} columns)")]
    GroupByOutOfBounds { column_id: u32, column_count: u32 },

    /// An aggregate's input column id named a column that does not exist
    /// in the input table.
    #[error(
        "aggregate input column id {column_id} is out of bounds (table has {column_count} columns)"
    )]
    AggregateColumnOutOfBounds { column_id: u32, column_count: u32 },

    /// A type-conversion or bookkeeping invariant was violated: a sentinel
    /// key collided with a real group, an accessor returned `None` for a
    /// non-nullable column, or an arithmetic widening overflowed in a way
    /// that should be structurally impossible.
    #[error("internal error in hash aggregate: {0}")]
    Internal(String),
}

impl AggregateError {
    pub fn internal(msg: impl Into<String>) -> Self {
        AggregateError::Internal(msg.into())
    }
}
