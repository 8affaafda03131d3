//! Integration test infrastructure for the CXL fabric manager
//!
//! Provides:
//! - An in-memory fabric simulator behind the `Transport` seam
//! - Builders for common fabric layouts
//! - Port and link verification helpers

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
