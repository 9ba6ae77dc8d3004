//! Error types for the ray tracing kernel.

use thiserror::Error;

/// Errors that can occur while configuring or running the kernel.
///
/// Geometric "misses" are never errors: a ray that does not hit a shape, a
/// ray absorbed by a material and a sun aligned with a tracker's axis all have
/// well-defined non-error results.
#[derive(Error, Debug)]
pub enum KernelError {
    /// A shape, material, tracker or table was given unusable parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A ray or vector handed to the kernel is degenerate or non-finite.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// User-editable text (e.g. a persisted transform) could not be parsed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The tracing worker pool stopped before a batch finished.
    #[error("worker pool failure: {0}")]
    WorkerPool(String),

    /// Reading or writing a simulation file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A simulation file is not valid JSON for the expected layout.
    #[error("malformed simulation file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
