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

//! Concrete `AggregateKernel` implementations, one struct per function
//! family. Each is monomorphized over the input column's scalar type so
//! the per-row loop never matches on a type tag.

use std::collections::HashSet;
use std::hash::Hash;

use ahash::RandomState;
use ordered_float::OrderedFloat;

use super::AggregateKernel;
use crate::group_map::ResultId;
use crate::storage::Column;
use crate::types::SegmentValue;

/// Float64 values are only ever used as a hash/ord key here (`MIN`/`MAX`
/// over NaN-free columns, or `COUNT DISTINCT` bucketing), never arithmetic,
/// so `OrderedFloat` is the right representation rather than a raw `f64`.
pub type F64Key = OrderedFloat<f64>;

/// A scalar a kernel can hold one-per-result-id and hand back as a
/// [`Column`]. Implemented for every type the grouping/aggregation paths
/// pull out of a [`SegmentValue`].
pub trait AggScalar: Copy + PartialOrd + Send + 'static {
    fn from_segment(value: SegmentValue<'_>) -> Option<Self>;
    fn into_column(values: Vec<Option<Self>>) -> Column;
}

impl AggScalar for i32 {
    fn from_segment(value: SegmentValue<'_>) -> Option<Self> {
        match value {
            SegmentValue::Int32(v) => Some(v),
            _ => None,
        }
    }
    fn into_column(values: Vec<Option<Self>>) -> Column {
        Column::from_i32(values)
    }
}

impl AggScalar for i64 {
    fn from_segment(value: SegmentValue<'_>) -> Option<Self> {
        match value {
            SegmentValue::Int64(v) => Some(v),
            _ => None,
        }
    }
    fn into_column(values: Vec<Option<Self>>) -> Column {
        Column::from_i64(values)
    }
}

impl AggScalar for F64Key {
    fn from_segment(value: SegmentValue<'_>) -> Option<Self> {
        match value {
            SegmentValue::Float64(v) => Some(OrderedFloat(v)),
            _ => None,
        }
    }
    fn into_column(values: Vec<Option<Self>>) -> Column {
        Column::from_f64(values.into_iter().map(|v| v.map(|o| o.0)).collect())
    }
}

/// Numeric widening shared by AVG and STDDEV_SAMP: any arithmetic input
/// column collapses to `f64` for the running computation.
fn numeric_to_f64(value: SegmentValue<'_>) -> Option<f64> {
    match value {
        SegmentValue::Int32(v) => Some(v as f64),
        SegmentValue::Int64(v) => Some(v as f64),
        SegmentValue::Float64(v) => Some(v),
        SegmentValue::Utf8(_) => None,
    }
}

fn ensure_vec_len<T: Clone>(values: &mut Vec<T>, len: usize, fill: T) {
    if values.len() < len {
        values.resize(len, fill);
    }
}

/// MIN / MAX over an arithmetic column. `IS_MAX = false` is MIN, `true` is
/// MAX; both share the same comparison-and-replace loop, gated by the
/// const generic rather than a runtime branch, the same way
/// `PrimitiveGroupValueBuilder<T, NULLABLE>` gates nullability.
pub struct MinMaxKernel<T: AggScalar, const IS_MAX: bool> {
    values: Vec<Option<T>>,
}

impl<T: AggScalar, const IS_MAX: bool> MinMaxKernel<T, IS_MAX> {
    pub fn new() -> Self {
        MinMaxKernel { values: Vec::new() }
    }
}

impl<T: AggScalar, const IS_MAX: bool> AggregateKernel for MinMaxKernel<T, IS_MAX> {
    fn ensure_len(&mut self, len: usize) {
        ensure_vec_len(&mut self.values, len, None);
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        let Some(value) = value.and_then(T::from_segment) else {
            return;
        };
        let slot = &mut self.values[result_id as usize];
        let better = match slot {
            None => true,
            Some(current) => {
                if IS_MAX {
                    value > *current
                } else {
                    value < *current
                }
            }
        };
        if better {
            *slot = Some(value);
        }
    }

    fn finish(self: Box<Self>) -> Column {
        T::into_column(self.values)
    }
}

/// MIN / MAX over `Utf8`, lexicographic by `str` ordering. Kept separate
/// from [`MinMaxKernel`] since `String` isn't `Copy`.
pub struct MinMaxStringKernel<const IS_MAX: bool> {
    values: Vec<Option<String>>,
}

impl<const IS_MAX: bool> MinMaxStringKernel<IS_MAX> {
    pub fn new() -> Self {
        MinMaxStringKernel { values: Vec::new() }
    }
}

impl<const IS_MAX: bool> AggregateKernel for MinMaxStringKernel<IS_MAX> {
    fn ensure_len(&mut self, len: usize) {
        ensure_vec_len(&mut self.values, len, None);
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        let Some(SegmentValue::Utf8(s)) = value else {
            return;
        };
        let slot = &mut self.values[result_id as usize];
        let better = match slot {
            None => true,
            Some(current) => {
                if IS_MAX {
                    s > current.as_str()
                } else {
                    s < current.as_str()
                }
            }
        };
        if better {
            *slot = Some(s.to_owned());
        }
    }

    fn finish(self: Box<Self>) -> Column {
        Column::Utf8(self.values)
    }
}

/// SUM over `Int32`/`Int64`, widened into an `i64` accumulator to avoid
/// overflow across a large group.
pub struct SumIntKernel {
    sums: Vec<Option<i64>>,
}

impl SumIntKernel {
    pub fn new() -> Self {
        SumIntKernel { sums: Vec::new() }
    }
}

impl AggregateKernel for SumIntKernel {
    fn ensure_len(&mut self, len: usize) {
        ensure_vec_len(&mut self.sums, len, None);
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        let v = match value {
            Some(SegmentValue::Int32(v)) => v as i64,
            Some(SegmentValue::Int64(v)) => v,
            _ => return,
        };
        let slot = &mut self.sums[result_id as usize];
        *slot = Some(slot.unwrap_or(0) + v);
    }

    fn finish(self: Box<Self>) -> Column {
        Column::from_i64(self.sums)
    }
}

/// SUM over `Float64`.
pub struct SumFloatKernel {
    sums: Vec<Option<f64>>,
}

impl SumFloatKernel {
    pub fn new() -> Self {
        SumFloatKernel { sums: Vec::new() }
    }
}

impl AggregateKernel for SumFloatKernel {
    fn ensure_len(&mut self, len: usize) {
        ensure_vec_len(&mut self.sums, len, None);
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        let Some(SegmentValue::Float64(v)) = value else {
            return;
        };
        let slot = &mut self.sums[result_id as usize];
        *slot = Some(slot.unwrap_or(0.0) + v);
    }

    fn finish(self: Box<Self>) -> Column {
        Column::from_f64(self.sums)
    }
}

/// AVG: always produces `Float64`, regardless of the input's arithmetic
/// type.
pub struct AvgKernel {
    sums: Vec<f64>,
    counts: Vec<u64>,
}

impl AvgKernel {
    pub fn new() -> Self {
        AvgKernel {
            sums: Vec::new(),
            counts: Vec::new(),
        }
    }
}

impl AggregateKernel for AvgKernel {
    fn ensure_len(&mut self, len: usize) {
        ensure_vec_len(&mut self.sums, len, 0.0);
        ensure_vec_len(&mut self.counts, len, 0);
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        let Some(v) = value.and_then(numeric_to_f64) else {
            return;
        };
        let i = result_id as usize;
        self.sums[i] += v;
        self.counts[i] += 1;
    }

    fn finish(self: Box<Self>) -> Column {
        let values = self
            .sums
            .into_iter()
            .zip(self.counts)
            .map(|(sum, n)| if n == 0 { None } else { Some(sum / n as f64) })
            .collect();
        Column::from_f64(values)
    }
}

/// COUNT, including `COUNT(*)`. Never null. `update` is
/// the regular `COUNT(col)` path (non-null rows only); `add_rows` is used
/// by the operator both for the per-row `COUNT(*)` path (`n = 1`, every
/// row regardless of nullness) and the `K=0` `COUNT(*)` bulk shortcut
/// (`n = chunk.size()`, added once per chunk with no per-row loop at all).
pub struct CountKernel {
    counts: Vec<u64>,
}

impl CountKernel {
    pub fn new() -> Self {
        CountKernel { counts: Vec::new() }
    }
}

impl AggregateKernel for CountKernel {
    fn ensure_len(&mut self, len: usize) {
        ensure_vec_len(&mut self.counts, len, 0);
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        if value.is_some() {
            self.counts[result_id as usize] += 1;
        }
    }

    fn add_rows(&mut self, result_id: ResultId, n: u64) {
        self.counts[result_id as usize] += n;
    }

    fn finish(self: Box<Self>) -> Column {
        Column::from_i64(self.counts.into_iter().map(|c| Some(c as i64)).collect())
    }
}

/// A scalar that can live in a `HashSet` for `COUNT DISTINCT`.
pub trait DistinctScalar: Eq + Hash + Clone + Send + 'static {
    fn from_segment(value: SegmentValue<'_>) -> Option<Self>;
}

impl DistinctScalar for i32 {
    fn from_segment(value: SegmentValue<'_>) -> Option<Self> {
        match value {
            SegmentValue::Int32(v) => Some(v),
            _ => None,
        }
    }
}

impl DistinctScalar for i64 {
    fn from_segment(value: SegmentValue<'_>) -> Option<Self> {
        match value {
            SegmentValue::Int64(v) => Some(v),
            _ => None,
        }
    }
}

impl DistinctScalar for F64Key {
    fn from_segment(value: SegmentValue<'_>) -> Option<Self> {
        match value {
            SegmentValue::Float64(v) => Some(OrderedFloat(v)),
            _ => None,
        }
    }
}

/// COUNT DISTINCT over an arithmetic column: one hash set of seen values
/// per `result_id`. Never null.
pub struct CountDistinctKernel<T: DistinctScalar> {
    seen: Vec<HashSet<T, RandomState>>,
}

impl<T: DistinctScalar> CountDistinctKernel<T> {
    pub fn new() -> Self {
        CountDistinctKernel { seen: Vec::new() }
    }
}

impl<T: DistinctScalar> AggregateKernel for CountDistinctKernel<T> {
    fn ensure_len(&mut self, len: usize) {
        while self.seen.len() < len {
            self.seen.push(HashSet::default());
        }
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        let Some(v) = value.and_then(T::from_segment) else {
            return;
        };
        self.seen[result_id as usize].insert(v);
    }

    fn finish(self: Box<Self>) -> Column {
        Column::from_i64(self.seen.iter().map(|s| Some(s.len() as i64)).collect())
    }
}

/// COUNT DISTINCT over `Utf8`.
pub struct CountDistinctStringKernel {
    seen: Vec<HashSet<String, RandomState>>,
}

impl CountDistinctStringKernel {
    pub fn new() -> Self {
        CountDistinctStringKernel { seen: Vec::new() }
    }
}

impl AggregateKernel for CountDistinctStringKernel {
    fn ensure_len(&mut self, len: usize) {
        while self.seen.len() < len {
            self.seen.push(HashSet::default());
        }
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        let Some(SegmentValue::Utf8(s)) = value else {
            return;
        };
        if !self.seen[result_id as usize].contains(s) {
            self.seen[result_id as usize].insert(s.to_owned());
        }
    }

    fn finish(self: Box<Self>) -> Column {
        Column::from_i64(self.seen.iter().map(|s| Some(s.len() as i64)).collect())
    }
}

/// STDDEV_SAMP via Welford's online algorithm: `n`, running `mean`, and
/// `m2` (sum of squared deviations) per `result_id`. Null until at least
/// two non-null values have been seen
/// (sample standard deviation is undefined for `n < 2`).
#[derive(Clone, Copy, Default)]
struct Welford {
    n: u64,
    mean: f64,
    m2: f64,
}

pub struct StddevSampKernel {
    state: Vec<Welford>,
}

impl StddevSampKernel {
    pub fn new() -> Self {
        StddevSampKernel { state: Vec::new() }
    }
}

impl AggregateKernel for StddevSampKernel {
    fn ensure_len(&mut self, len: usize) {
        ensure_vec_len(&mut self.state, len, Welford::default());
    }

    fn update(&mut self, result_id: ResultId, value: Option<SegmentValue<'_>>) {
        let Some(x) = value.and_then(numeric_to_f64) else {
            return;
        };
        let w = &mut self.state[result_id as usize];
        w.n += 1;
        let delta = x - w.mean;
        w.mean += delta / w.n as f64;
        let delta2 = x - w.mean;
        w.m2 += delta * delta2;
    }

    fn finish(self: Box<Self>) -> Column {
        let values = self
            .state
            .into_iter()
            .map(|w| {
                if w.n < 2 {
                    None
                } else {
                    Some((w.m2 / (w.n - 1) as f64).sqrt())
                }
            })
            .collect();
        Column::from_f64(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_ignore_nulls() {
        let mut kernel = MinMaxKernel::<i32, false>::new();
        kernel.ensure_len(1);
        kernel.update(0, None);
        kernel.update(0, Some(SegmentValue::Int32(5)));
        kernel.update(0, Some(SegmentValue::Int32(2)));
        match Box::new(kernel).finish() {
            Column::Int32(v) => assert_eq!(v, vec![Some(2)]),
            _ => panic!("expected Int32 column"),
        }
    }

    #[test]
    fn sum_int_widens_and_stays_null_without_rows() {
        let mut kernel = SumIntKernel::new();
        kernel.ensure_len(2);
        kernel.update(0, Some(SegmentValue::Int32(3)));
        kernel.update(0, Some(SegmentValue::Int32(4)));
        match Box::new(kernel).finish() {
            Column::Int64(v) => assert_eq!(v, vec![Some(7), None]),
            _ => panic!("expected Int64 column"),
        }
    }

    #[test]
    fn avg_widens_to_float() {
        let mut kernel = AvgKernel::new();
        kernel.ensure_len(1);
        kernel.update(0, Some(SegmentValue::Int32(2)));
        kernel.update(0, Some(SegmentValue::Int32(4)));
        match Box::new(kernel).finish() {
            Column::Float64(v) => assert_eq!(v, vec![Some(3.0)]),
            _ => panic!("expected Float64 column"),
        }
    }

    #[test]
    fn count_star_bulk_add_matches_per_row() {
        let mut bulk = CountKernel::new();
        bulk.ensure_len(1);
        bulk.add_rows(0, 3);

        let mut per_row = CountKernel::new();
        per_row.ensure_len(1);
        for _ in 0..3 {
            per_row.add_rows(0, 1);
        }

        assert_eq!(
            matches!(Box::new(bulk).finish(), Column::Int64(v) if v == vec![Some(3)]),
            matches!(Box::new(per_row).finish(), Column::Int64(v) if v == vec![Some(3)])
        );
    }

    #[test]
    fn count_distinct_counts_unique_values_only() {
        let mut kernel = CountDistinctKernel::<i32>::new();
        kernel.ensure_len(1);
        kernel.update(0, Some(SegmentValue::Int32(1)));
        kernel.update(0, Some(SegmentValue::Int32(1)));
        kernel.update(0, Some(SegmentValue::Int32(2)));
        kernel.update(0, None);
        match Box::new(kernel).finish() {
            Column::Int64(v) => assert_eq!(v, vec![Some(2)]),
            _ => panic!("expected Int64 column"),
        }
    }

    #[test]
    fn stddev_samp_needs_two_values() {
        let mut kernel = StddevSampKernel::new();
        kernel.ensure_len(1);
        kernel.update(0, Some(SegmentValue::Int32(10)));
        let single = Box::new(StddevSampKernel {
            state: kernel.state.clone(),
        })
        .finish();
        assert!(matches!(single, Column::Float64(v) if v == vec![None]));

        kernel.update(0, Some(SegmentValue::Int32(20)));
        match Box::new(kernel).finish() {
            Column::Float64(v) => {
                let got = v[0].unwrap();
                assert!((got - std::f64::consts::SQRT_2 * 5.0).abs() < 1e-9);
            }
            _ => panic!("expected Float64 column"),
        }
    }
}
