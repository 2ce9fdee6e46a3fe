//! Synchronous mutation surface consumed by the HTTP layer.
//!
//! Everything here validates eagerly and returns taxonomy errors directly;
//! retry behavior belongs to background dispatch, not to these calls.

pub mod checkins;
pub mod goals;
pub mod settings;
