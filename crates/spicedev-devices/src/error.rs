//! Error types for device operations.

use thiserror::Error;

/// Errors raised by device models.
///
/// Non-convergence and implausible geometry are not errors: the first is a
/// [`ConvergenceResult`](crate::stamp::ConvergenceResult), the second a logged
/// warning.
#[derive(Debug, Error)]
pub enum Error {
    /// An introspection key is unknown, read-only, or given a value of the wrong kind.
    #[error("bad parameter {id} for {device}")]
    BadParameter { device: String, id: u32 },

    /// A parameter name is not known for this device family.
    #[error("unknown parameter '{name}' for {device}")]
    UnknownParameter { device: String, name: String },

    /// AC stamping was requested before the instance had a DC operating point.
    #[error("{device}: small-signal stamp requested before a DC load")]
    NotLoaded { device: String },

    /// An operation needs setup (internal nodes, state slots or handles) first.
    #[error("{device}: {step} has not been run")]
    NotPrepared { device: String, step: &'static str },

    /// Failure reported by the simulator-side collaborators (e.g. matrix allocation).
    #[error("simulator error: {0}")]
    Core(#[from] spicedev_core::Error),
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, Error>;
