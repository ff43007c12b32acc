//! Error types for spicedev-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The matrix element allocator ran out of room for a new entry.
    #[error("matrix element allocation failed: {requested} entries requested, capacity {capacity}")]
    OutOfMemory { requested: usize, capacity: usize },

    #[error("node {0} is outside the matrix")]
    UnknownNode(u32),

    #[error("state slots {base}..{end} exceed the history length {len}")]
    StateOverflow { base: usize, end: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
