//! Errors raised by core primitives.

use thiserror::Error;

/// An identifier failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier: {0}")]
pub struct InvalidId(pub String);

impl InvalidId {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
