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

//! The task scheduler is an external collaborator: the
//! operator only needs `schedule_and_wait_for_tasks` over a batch of
//! fire-and-forget closures. This module provides the minimal trait plus
//! two implementations: a real work-stealing pool for production use and a
//! same-thread pool for the K<2 degenerate case and for deterministic
//! tests.

/// One unit of work submitted to the scheduler. Closures communicate their
/// results by writing into state they capture by reference (typically one
/// slot of a `Mutex<Vec<Option<T>>>` indexed by task position) rather than
/// through a return channel, mirroring the source's `JobTask` model.
/// Borrowed rather than `'static` so tasks can close over the input table
/// without it needing to be an `Arc`.
pub type Task<'a> = Box<dyn FnOnce() + Send + 'a>;

pub trait Scheduler: Send + Sync {
    /// Enqueue `tasks` and block until every one of them has completed. If
    /// a task panics, the remaining tasks are still allowed to finish
    /// (they are short-running key-construction work); the caller is
    /// expected to treat a panic here as an `InternalError`.
    fn schedule_and_wait_for_tasks<'a>(&self, tasks: Vec<Task<'a>>);
}

/// Runs every task concurrently on a `rayon` work-stealing pool. This is
/// the idiomatic fire-and-forget fan-out primitive for CPU-bound
/// per-column work in a columnar engine: `rayon::scope` gives exactly the
/// "submit a batch, block until all complete" contract the operator
/// needs, without requiring an async runtime.
#[derive(Debug, Default)]
pub struct RayonScheduler;

impl RayonScheduler {
    pub fn new() -> Self {
        RayonScheduler
    }
}

impl Scheduler for RayonScheduler {
    fn schedule_and_wait_for_tasks<'a>(&self, tasks: Vec<Task<'a>>) {
        rayon::scope(|scope| {
            for task in tasks {
                scope.spawn(move |_| task());
            }
        });
    }
}

/// Runs every task sequentially on the calling thread, in submission
/// order. Used for the K<2 grouping-column case, where the parallel
/// fan-out would not have degenerated into anything useful anyway, and
/// for tests that want deterministic ordering.
#[derive(Debug, Default)]
pub struct SameThreadScheduler;

impl SameThreadScheduler {
    pub fn new() -> Self {
        SameThreadScheduler
    }
}

impl Scheduler for SameThreadScheduler {
    fn schedule_and_wait_for_tasks<'a>(&self, tasks: Vec<Task<'a>>) {
        for task in tasks {
            task();
        }
    }
}
