//! MAC Uplink Control Channel Scheduler Library
//!
//! This crate implements the PUCCH resource allocation core of the 5G NR MAC
//! scheduler according to 3GPP TS 38.211, 38.213 and 38.331.

pub mod config;
pub mod pdcch;
pub mod pucch;
pub mod resource_grid;
pub mod sched_result;

use thiserror::Error;

pub use config::{
    default_cell_config, default_ue_config, BwpConfiguration, CellConfiguration, PucchConfig,
    PucchConfigCommon, PucchFormat, PucchFormatParams, PucchGroupHopping, PucchResource,
    SchedulingRequestResourceConfig, UeCellConfiguration,
};
pub use pdcch::{CceLocation, CoresetConfiguration, DciDlContextInformation, PdcchDlInformation};
pub use pucch::{PucchAllocator, PucchHarqAckGrant, PucchResAllocCfg, PucchResourceManager};
pub use resource_grid::{CellResourceAllocator, CellSlotResourceAllocator, GrantInfo, UlResourceGrid};
pub use sched_result::{PucchInfo, PucchList, SrNofBits};

/// Errors reported by the scheduler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("PUCCH {0} is not supported by this allocation path")]
    UnsupportedPucchFormat(PucchFormat),
}
