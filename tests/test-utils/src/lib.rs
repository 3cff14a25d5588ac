//! Shared fixtures and helpers for exposure engine tests
//!
//! - Deterministic chain fixtures with hand-checkable numbers
//! - Randomised chain and tape factories
//! - Exposure-specific assertions
//! - Logging and temp-file helpers

pub mod assertions;
pub mod factories;
pub mod fixtures;
pub mod helpers;

pub use assertions::*;
pub use factories::*;
pub use fixtures::*;
pub use helpers::*;
