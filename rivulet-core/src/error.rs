use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The run was cancelled without a cause, either through `cancel(None)` or because the
    /// parent cancellation token fired.
    #[error("Cancelled - run was cancelled without an error")]
    Cancelled,

    #[error("Reduce Error - reducer finished without writing a value")]
    NoOutput,

    #[error("Task Error - {0}")]
    Task(String),

    #[error("Panicked - {0}")]
    Panicked(String),
}

impl Error {
    /// Convenience for building a [`Error::Task`] out of anything displayable.
    pub fn task(reason: impl std::fmt::Display) -> Self {
        Error::Task(reason.to_string())
    }
}
