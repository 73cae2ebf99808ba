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

//! `GroupByHashOperator`: wires the Key Builder, Key Compactor, Group Map,
//! aggregate kernels and Output Assembler into a single hash-based grouped
//! aggregation pipeline.

use std::time::Instant;

use crate::aggregate::{build_kernel, kernels::CountKernel, AggregateKernel};
use crate::config::Config;
use crate::error::{AggregateError, Result};
use crate::group_map::GroupMap;
use crate::key::{builder, compactor, GroupKey, GroupKeyShape};
use crate::output;
use crate::scheduler::{RayonScheduler, SameThreadScheduler, Scheduler};
use crate::storage::{Chunk, Table};
use crate::types::{AggregateFunction, ColumnId, RowId, INVALID_COLUMN_ID};

/// One requested aggregate: which column to read (or the invalid-id
/// sentinel for `COUNT(*)`), which function to apply, and the name of the
/// output column it produces.
pub struct AggregateSpec {
    pub input_column: ColumnId,
    pub function: AggregateFunction,
    pub output_name: String,
}

impl AggregateSpec {
    pub fn new(
        input_column: ColumnId,
        function: AggregateFunction,
        output_name: impl Into<String>,
    ) -> Self {
        AggregateSpec {
            input_column,
            function,
            output_name: output_name.into(),
        }
    }

    /// `COUNT(*)`: counts every row of a group, NULLs included.
    pub fn count_star(output_name: impl Into<String>) -> Self {
        AggregateSpec {
            input_column: INVALID_COLUMN_ID,
            function: AggregateFunction::Count,
            output_name: output_name.into(),
        }
    }
}

/// A resolved aggregate ready to run: either a boxed kernel fed per-row
/// (and, for `COUNT(*)`, sometimes in per-chunk bulk), or `Any`, which
/// never touches a kernel and is materialized straight from the group's
/// representative row by the Output Assembler.
enum Resolved {
    Kernel {
        input_column: ColumnId,
        is_count_star: bool,
        kernel: Box<dyn AggregateKernel>,
    },
    Any {
        input_column: ColumnId,
    },
}

/// The hash-based grouped aggregation operator. Constructed once per query
/// execution against a borrowed `Table`; `execute` runs the whole pipeline
/// and returns the result as a fresh `Vec<Chunk>`.
pub struct GroupByHashOperator<'a> {
    table: &'a Table,
    group_by: Vec<ColumnId>,
    aggregates: Vec<AggregateSpec>,
    config: Config,
    scheduler: Box<dyn Scheduler>,
}

impl<'a> GroupByHashOperator<'a> {
    /// Builds an operator over `table`. Fewer than two grouping columns
    /// degenerate to a same-thread scheduler since the Key Builder's
    /// per-column fan-out would not parallelize anything; two or more
    /// columns use the `rayon`-backed scheduler.
    pub fn new(
        table: &'a Table,
        group_by: Vec<ColumnId>,
        aggregates: Vec<AggregateSpec>,
        config: Config,
    ) -> Self {
        let scheduler: Box<dyn Scheduler> = if group_by.len() >= 2 {
            Box::new(RayonScheduler::new())
        } else {
            Box::new(SameThreadScheduler::new())
        };
        GroupByHashOperator {
            table,
            group_by,
            aggregates,
            config,
            scheduler,
        }
    }

    fn validate(&self) -> Result<()> {
        let column_count = self.table.column_count() as u32;
        for &column_id in &self.group_by {
            if column_id >= column_count {
                return Err(AggregateError::GroupByOutOfBounds {
                    column_id,
                    column_count,
                });
            }
        }
        for spec in &self.aggregates {
            if spec.input_column == INVALID_COLUMN_ID {
                if spec.function != AggregateFunction::Count {
                    return Err(AggregateError::MissingInputColumn {
                        function: spec.function,
                    });
                }
                continue;
            }
            if spec.input_column >= column_count {
                return Err(AggregateError::AggregateColumnOutOfBounds {
                    column_id: spec.input_column,
                    column_count,
                });
            }
        }
        Ok(())
    }

    fn resolve_aggregates(&self) -> Result<Vec<Resolved>> {
        self.aggregates
            .iter()
            .map(|spec| {
                if spec.function == AggregateFunction::Any {
                    return Ok(Resolved::Any {
                        input_column: spec.input_column,
                    });
                }
                let is_count_star = spec.input_column == INVALID_COLUMN_ID;
                let kernel: Box<dyn AggregateKernel> = if is_count_star {
                    Box::new(CountKernel::new())
                } else {
                    build_kernel(spec.function, self.table.column_data_type(spec.input_column))?
                };
                Ok(Resolved::Kernel {
                    input_column: spec.input_column,
                    is_count_star,
                    kernel,
                })
            })
            .collect()
    }

    /// Runs the full pipeline and returns the result as a fresh table.
    pub fn execute(&self) -> Result<Vec<Chunk>> {
        self.validate()?;
        let mut resolved = self.resolve_aggregates()?;

        let key_partitioning_start = Instant::now();
        let mut key_output = builder::build_group_keys(self.table, &self.group_by, self.scheduler.as_ref())?;
        let cache_result_ids = if self.group_by.len() == 1 {
            let stats = key_output
                .single_column_stats
                .expect("single_column_stats is populated when group_by.len() == 1");
            compactor::try_compact(
                &mut key_output.per_chunk,
                stats,
                self.table.row_count(),
                self.config.compaction_threshold_ratio,
            )
        } else {
            false
        };
        log::debug!(
            "GroupByKeyPartitioning took {:?}",
            key_partitioning_start.elapsed()
        );

        let shape = GroupKeyShape::from_num_columns(self.group_by.len());
        let mut group_map = GroupMap::new(shape, cache_result_ids);

        let aggregating_start = Instant::now();
        for chunk_id in 0..self.table.chunk_count() as u32 {
            let chunk = self
                .table
                .get_chunk(chunk_id)
                .expect("chunk ids are dense from 0..chunk_count");
            let row_count = chunk.size();

            let mut result_ids = Vec::with_capacity(row_count);
            for row in 0..row_count as u32 {
                let key = &mut key_output.per_chunk[chunk_id as usize][row as usize];
                let row_id = RowId::new(chunk_id, row);
                result_ids.push(group_map.get_or_add_result(key, row_id));
            }

            let total_groups = group_map.result_count();
            for r in resolved.iter_mut() {
                if let Resolved::Kernel { kernel, .. } = r {
                    kernel.ensure_len(total_groups);
                }
            }

            for r in resolved.iter_mut() {
                let Resolved::Kernel {
                    input_column,
                    is_count_star,
                    kernel,
                } = r
                else {
                    continue;
                };

                if *is_count_star {
                    if self.group_by.is_empty() {
                        kernel.add_rows(0, row_count as u64);
                    } else {
                        for &result_id in &result_ids {
                            kernel.add_rows(result_id, 1);
                        }
                    }
                    continue;
                }

                let segment = chunk.get_segment(*input_column);
                for (row, &result_id) in result_ids.iter().enumerate() {
                    let value = segment.value_at(row as u32);
                    kernel.update(result_id, value);
                }
            }
        }

        // Empty-result rule: K=0 always emits exactly one row, even over
        // zero input rows where the loop above never ran.
        if self.group_by.is_empty() {
            let mut k = GroupKey::Empty;
            group_map.get_or_add_result(&mut k, RowId::INVALID);
        }
        let total_groups = group_map.result_count();
        for r in resolved.iter_mut() {
            if let Resolved::Kernel { kernel, .. } = r {
                kernel.ensure_len(total_groups);
            }
        }
        log::debug!("Aggregating took {:?}", aggregating_start.elapsed());

        // Dense-range `result_id` sizing (the Key Compactor, or `ensure_len`
        // growing past the highest id a chunk assigned) can leave slots no
        // row ever mapped to. Those are gaps, not groups, and must not reach
        // the output; `live_result_ids` is every slot actually worth
        // emitting, in result-id order.
        let live_result_ids = group_map.live_result_ids();
        let live_row_ids: Vec<RowId> = live_result_ids
            .iter()
            .map(|&id| group_map.representative_row_id(id))
            .collect();

        let group_columns_start = Instant::now();
        let group_by_columns =
            output::gather_passthrough_columns(self.table, &self.group_by, &live_row_ids);
        log::debug!(
            "GroupByColumnsWriting took {:?}",
            group_columns_start.elapsed()
        );

        let aggregate_columns_start = Instant::now();
        let mut aggregate_columns = Vec::with_capacity(resolved.len());
        for r in resolved.into_iter() {
            let column = match r {
                Resolved::Any { input_column } => {
                    output::gather_column(self.table, input_column, &live_row_ids)
                }
                Resolved::Kernel { kernel, .. } => {
                    output::compact_column(kernel.finish(), &live_result_ids)
                }
            };
            aggregate_columns.push(column);
        }
        log::debug!(
            "AggregateColumnsWriting took {:?}",
            aggregate_columns_start.elapsed()
        );

        let output_writing_start = Instant::now();
        let mut all_columns = group_by_columns;
        all_columns.extend(aggregate_columns);
        let result = output::slice_into_chunks(all_columns, self.config.batch_size);
        log::debug!("OutputWriting took {:?}", output_writing_start.elapsed());

        Ok(result)
    }

    /// Names of the output table's columns, in order: grouping columns
    /// first (named as in the input table), then each aggregate's
    /// declared output name.
    pub fn output_column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .group_by
            .iter()
            .map(|&id| self.table.column_name(id).to_owned())
            .collect();
        names.extend(self.aggregates.iter().map(|spec| spec.output_name.clone()));
        names
    }
}
