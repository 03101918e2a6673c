//! Knobs recognized by the fan-out stages. [`WalkOptions`] drives [`crate::stream::Stream::walk`]
//! and everything built on it, [`MapReduceOptions`] drives the mapper pool of a
//! [`crate::mapreduce`] run.

use tokio_util::sync::CancellationToken;

/// Number of concurrent workers used when the caller does not ask for a specific count.
pub const DEFAULT_WORKERS: usize = 16;

/// Worker counts below this are clamped up to it.
pub const MIN_WORKERS: usize = 1;

/// tokio channels need at least one slot, a single slot is the closest we get to a rendezvous
/// channel between two stages.
pub const PIPE_CAPACITY: usize = 1;

/// Options for the concurrent stages of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    pub(crate) workers: usize,
    pub(crate) unlimited_workers: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            workers: DEFAULT_WORKERS,
            unlimited_workers: false,
        }
    }
}

impl WalkOptions {
    /// Sets the number of concurrent workers, clamped to [`MIN_WORKERS`].
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(MIN_WORKERS);
        self
    }

    /// Spawns a task per item without gating. The output channel is still sized by the worker
    /// count, so a slow consumer still applies backpressure.
    pub fn unlimited_workers(mut self) -> Self {
        self.unlimited_workers = true;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_unlimited(&self) -> bool {
        self.unlimited_workers
    }
}

/// Options for a single map-reduce run.
#[derive(Debug, Clone)]
pub struct MapReduceOptions {
    pub(crate) workers: usize,
    pub(crate) cancel_token: Option<CancellationToken>,
}

impl Default for MapReduceOptions {
    fn default() -> Self {
        MapReduceOptions {
            workers: DEFAULT_WORKERS,
            cancel_token: None,
        }
    }
}

impl MapReduceOptions {
    /// Sets the number of concurrent mappers, clamped to [`MIN_WORKERS`].
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(MIN_WORKERS);
        self
    }

    /// Ties the run to a parent token; cancelling the parent cancels the run with
    /// [`crate::Error::Cancelled`].
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}
