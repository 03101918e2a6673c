//! Rivulet is a small toolkit for concurrent, lazily evaluated data processing on top of tokio.
//!
//! It has two halves:
//! - [`Stream`], a pipeline of stages connected by bounded channels. Every item flows through
//!   the stages as soon as it is produced; stages like [`Stream::map`] run their callback on a
//!   bounded pool of workers, stages like [`Stream::sort`] have to see the whole input first.
//! - [`mapreduce`], a generate / map / reduce run where the first reported error cancels the
//!   whole run and every task, including the generator, is let to finish instead of leaking.
//!
//! A panic inside user code never takes down the runtime; it is caught where the task is
//! spawned and logged through `tracing`.

/// Worker limits and per-run options.
pub mod config;

/// Errors reported by a MapReduce run or by a reducer.
pub mod error;

/// Generate / map / reduce with first-error cancellation.
pub mod mapreduce;

/// Task helpers and containers shared by the stream stages and MapReduce.
pub mod shared;

/// Lazy, concurrent, channel backed streams.
pub mod stream;

pub use crate::config::{MapReduceOptions, WalkOptions};
pub use crate::error::{Error, Result};
pub use crate::mapreduce::{
    Canceller, Writer, finish, map_reduce, map_reduce_chan, map_reduce_void, map_reduce_with,
};
pub use crate::shared::task::{RoutineGroup, parallel, spawn_safe};
pub use crate::stream::{Stream, concat};
