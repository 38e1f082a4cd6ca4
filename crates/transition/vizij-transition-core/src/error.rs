use thiserror::Error;

/// Errors produced while joining a new item sequence against the tracked set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// The key accessor produced the same key for two items of one sequence.
    #[error("duplicate key '{key}' at item positions {first} and {second}")]
    KeyCollision {
        key: String,
        first: usize,
        second: usize,
    },
}
