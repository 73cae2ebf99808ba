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

//! Aggregator kernels: one per (aggregate expression, column data type)
//! pair, monomorphized and boxed once at operator entry so the per-row hot
//! path never re-dispatches.

pub mod kernels;

use crate::error::{AggregateError, Result};
use crate::group_map::ResultId;
use crate::storage::Column;
use crate::types::{AggregateFunction, ColumnDataType, SegmentValue};

/// A type-specialized running aggregate, indexed by `result_id`.
///
/// Implementations grow lazily: `ensure_len` is called once per chunk,
/// after the Group Map has assigned ids for every row in that chunk, so
/// the kernel's internal vectors always cover every `result_id` seen so
/// far before `update` is called for any of them.
pub trait AggregateKernel: Send {
    fn ensure_len(&mut self, len: usize);

    /// Fold one input value into the running state for `result_id`.
    /// `value` is `None` for SQL NULL, which leaves the running value
    /// unchanged for every function except `COUNT(*)` (handled via
    /// [`AggregateKernel::add_rows`] instead, since it never looks at the
    /// input column at all).
    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>);

    /// `COUNT(*)` bulk path: every row counts, independent of nullness.
    /// The default per-row implementation is correct for every kernel;
    /// `CountKernel` overrides it to add `n` in one step for the `K=0`
    /// fast path.
    fn add_rows(&mut self, result_id: ResultId, n: u64) {
        for _ in 0..n {
            self.update(result_id, Some(SegmentValue::Int32(0)));
        }
    }

    /// Materialize the final output column. Implementations apply their
    /// own null policy (never-null for COUNT/COUNT DISTINCT, null when
    /// count is too low for MIN/MAX/SUM/AVG/STDDEV).
    fn finish(self: Box<Self>) -> Column;
}

/// Build the kernel for one (function, column type) pair. Chosen once per
/// aggregate expression at operator entry; `AggregateFunction::Any` is
/// handled entirely by the Output Assembler (it never touches a kernel)
/// and is rejected here.
pub fn build_kernel(
    function: AggregateFunction,
    data_type: ColumnDataType,
) -> Result<Box<dyn AggregateKernel>> {
    use AggregateFunction::*;
    use ColumnDataType::*;

    if function.requires_arithmetic() && !data_type.is_arithmetic() {
        return Err(AggregateError::InvalidAggregate { function, data_type });
    }

    Ok(match (function, data_type) {
        (Min, Int32) => Box::new(kernels::MinMaxKernel::<i32, false>::new()),
        (Min, Int64) => Box::new(kernels::MinMaxKernel::<i64, false>::new()),
        (Min, Float64) => Box::new(kernels::MinMaxKernel::<kernels::F64Key, false>::new()),
        (Min, Utf8) => Box::new(kernels::MinMaxStringKernel::<false>::new()),

        (Max, Int32) => Box::new(kernels::MinMaxKernel::<i32, true>::new()),
        (Max, Int64) => Box::new(kernels::MinMaxKernel::<i64, true>::new()),
        (Max, Float64) => Box::new(kernels::MinMaxKernel::<kernels::F64Key, true>::new()),
        (Max, Utf8) => Box::new(kernels::MinMaxStringKernel::<true>::new()),

        (Sum, Int32) => Box::new(kernels::SumIntKernel::new()),
        (Sum, Int64) => Box::new(kernels::SumIntKernel::new()),
        (Sum, Float64) => Box::new(kernels::SumFloatKernel::new()),
        (Sum, Utf8) => return Err(AggregateError::InvalidAggregate { function, data_type }),

        (Avg, Int32 | Int64 | Float64) => Box::new(kernels::AvgKernel::new()),
        (Avg, Utf8) => unreachable!("guarded by requires_arithmetic above"),

        (Count, _) => Box::new(kernels::CountKernel::new()),

        (CountDistinct, Int32) => Box::new(kernels::CountDistinctKernel::<i32>::new()),
        (CountDistinct, Int64) => Box::new(kernels::CountDistinctKernel::<i64>::new()),
        (CountDistinct, Float64) => {
            Box::new(kernels::CountDistinctKernel::<kernels::F64Key>::new())
        }
        (CountDistinct, Utf8) => Box::new(kernels::CountDistinctStringKernel::new()),

        (StddevSamp, Int32 | Int64 | Float64) => Box::new(kernels::StddevSampKernel::new()),
        (StddevSamp, Utf8) => unreachable!("guarded by requires_arithmetic above"),

        (Any, _) => {
            return Err(AggregateError::internal(
                "ANY is a pseudo-aggregate materialized by the output assembler, not a kernel",
            ))
        }
    })
}
