//! Error types for the engine.
//!
//! Most failure paths described by the design (unknown column id, unknown
//! operator, persistence failure, plugin name collision) are logged and
//! absorbed rather than surfaced as `Err` — see the module docs on
//! [`crate::facade`]. `EngineError` only carries the handful of conditions
//! that a caller must actually react to.

use thiserror::Error;

/// Errors returned from the public engine API.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A facade operation was invoked after [`crate::facade::Engine::destroy`].
    #[error("engine has been destroyed")]
    Destroyed,

    /// Construction-time option validation failed.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// A filter was constructed with a value whose shape doesn't match the
    /// operator's arity (e.g. `between` without a `[lo, hi]` pair).
    #[error("filter value does not match operator arity: {0}")]
    InvalidFilter(String),

    /// The remote data source returned a non-success status or the
    /// transport itself failed.
    #[error("remote data source request failed: {0}")]
    Transport(String),

    /// A snapshot loaded from the state store was malformed (unknown tag,
    /// missing field, type mismatch).
    #[error("state snapshot could not be decoded: {0}")]
    Persistence(String),
}
