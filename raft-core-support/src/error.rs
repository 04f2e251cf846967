use std::fmt;

/// Errors surfaced by the raft core and its collaborators.
///
/// The transition engine itself never panics (§7 of the design): capability
/// failures from the log store or the replicated state machine come back as
/// values that the driver decides how to handle (retry, abort, crash).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A `LogStore` operation failed (read, append, or truncate).
    #[error("log store error: {0}")]
    LogStore(String),

    /// `Rsm::apply_command` returned an error applying a committed entry.
    /// Since application is deterministic, this is reproducible on replay
    /// and indicates a bug in the host command set rather than a transient
    /// condition.
    #[error("state machine error: {0}")]
    StateMachine(String),

    /// A log index that was expected to exist could not be found.
    #[error("missing log entry at index {0}")]
    MissingEntry(u64),

    /// An internal invariant was violated; should never happen in practice.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn log_store(msg: impl fmt::Display) -> Self {
        Error::LogStore(msg.to_string())
    }

    pub fn state_machine(msg: impl fmt::Display) -> Self {
        Error::StateMachine(msg.to_string())
    }

    pub fn invariant(msg: impl fmt::Display) -> Self {
        Error::Invariant(msg.to_string())
    }
}
