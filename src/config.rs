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

//! Operator tunables.
//!
//! There is no outer configuration system here (no file, no env vars),
//! just the two knobs the source hard-codes, made explicit so tests can
//! exercise both sides of the compaction decision.

/// Default output batch size, matching the default `batch_size` used by
/// comparable columnar executors for slicing final output.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// The source's literal compaction threshold: compact when
/// `max - min < ratio * row_count`.
pub const DEFAULT_COMPACTION_THRESHOLD_RATIO: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Maximum number of rows per output chunk produced by the Output
    /// Assembler.
    pub batch_size: usize,
    /// Key Compactor applies when `max - min < ratio * row_count` for a
    /// single grouping column. Only consulted when there is exactly one
    /// grouping column.
    pub compaction_threshold_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            batch_size: DEFAULT_BATCH_SIZE,
            compaction_threshold_ratio: DEFAULT_COMPACTION_THRESHOLD_RATIO,
        }
    }
}
