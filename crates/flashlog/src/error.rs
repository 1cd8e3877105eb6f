//! Error types for engine construction and shutdown.

use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Total buffer capacity was zero.
    #[error("buffer capacity must be greater than zero")]
    ZeroCapacity,

    /// The flush interval was zero.
    #[error("flush interval must be greater than zero")]
    ZeroInterval,

    /// The sink path was empty.
    #[error("sink path must not be empty")]
    EmptyPath,

    /// A strategy identifier did not match any known variant.
    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),
}

/// Errors surfaced by the engine.
///
/// Only construction and shutdown are fallible; `log` is best-effort and all
/// steady-state failure modes are visible through the statistics snapshot
/// instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The sink could not be opened.
    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),

    /// The flush consumer task could not be joined during shutdown.
    #[error("shutdown failed: {0}")]
    Shutdown(String),
}
