//! PUCCH Scheduling
//!
//! Allocation of uplink control channel resources for HARQ-ACK and SR.

pub mod allocator;
pub mod default_resource;
pub mod resource_manager;

pub use allocator::{PucchAllocator, PucchHarqAckGrant, PucchResAllocCfg};
pub use resource_manager::{PucchResourceManager, SlotResourceCounter};
