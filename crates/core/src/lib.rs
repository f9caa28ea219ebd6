//! `nursegate-core`: shared building blocks for the authentication core.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::InvalidId;
pub use id::UserId;
