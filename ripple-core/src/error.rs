//! Error types for the reactive core.
//!
//! Only API misuse that the caller can act on is an error. Developer
//! diagnostics such as writes through a locked read-only view are
//! [`Warning`](crate::Warning)s and never fail the operation.

use thiserror::Error;

use crate::value::Shape;

/// Errors returned by the observation layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// A collection method was called on a container that does not have it.
    #[error("{shape} has no `{op}` method")]
    Unsupported { op: &'static str, shape: Shape },

    /// Weak collections only accept containers as keys.
    #[error("invalid value used as weak collection key")]
    InvalidWeakKey,

    /// A value could not be converted to or from JSON.
    #[error("json conversion failed: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, ReactiveError>;
