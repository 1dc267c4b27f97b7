//! Common Radio Types Library
//!
//! This crate provides shared types used across the MAC scheduler and its driver.

pub mod interval;
pub mod slot_point;
pub mod types;

// Re-export commonly used items
pub use interval::*;
pub use slot_point::SlotPoint;
pub use types::*;
