/// Panic-contained task spawning, routine groups and channel draining.
pub mod task;

/// Bounded ring that retains the most recent items.
pub mod ring;
