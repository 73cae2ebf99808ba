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

//! Hash-based grouped aggregation.
//!
//! This crate implements the operator behind
//! `SELECT g1, .., gK, f1(c1), .., fM(cM) FROM t GROUP BY g1, .., gK`
//! for a columnar, chunked input table: a parallel key-construction phase
//! followed by a hash/dense-index group map and a set of type-specialized
//! aggregator kernels.
//!
//! The storage and scheduling layers are modeled as small concrete types
//! ([`storage`], [`scheduler`]) rather than a real segment store or task
//! system; an embedder with its own columnar store adapts at those two
//! seams.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod group_map;
pub mod key;
pub mod operator;
pub mod output;
pub mod scheduler;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{AggregateError, Result};
pub use operator::{AggregateSpec, GroupByHashOperator};
pub use types::{AggregateFunction, ColumnDataType};
