//! Common error types for the pattern recommender

use thiserror::Error;

/// Common result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the engine and its hosting service
#[derive(Error, Debug)]
pub enum Error {
    /// Taxonomy data violates the rooted-tree invariant
    /// (missing child reference, cycle, duplicate id, dangling parent)
    #[error("Malformed taxonomy: {0}")]
    MalformedTree(String),

    /// Score requested for a leaf whose ancestor chain is not fully answered
    #[error("Incomplete answers for {0}")]
    IncompleteAnswer(String),

    /// Operation invoked in a quiz state that forbids it
    #[error("Cannot {operation} while quiz is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    /// Node id not present in the taxonomy
    #[error("Unknown taxonomy node: {0}")]
    UnknownNode(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
