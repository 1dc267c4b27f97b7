//! PDCCH context consumed by the PUCCH allocator
//!
//! The common PUCCH resource of a HARQ-ACK depends on where the DCI that
//! scheduled the PDSCH was placed in its CORESET.

use crate::SchedError;

/// Number of REGs per CCE (TS 38.211, Section 7.3.2.2)
pub const NOF_REGS_PER_CCE: u32 = 6;

/// CORESET frequency and time extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoresetConfiguration {
    /// Number of resource blocks
    pub num_rbs: u32,
    /// Number of symbols
    pub num_symbols: u32,
    /// RB offset from point A
    pub rb_offset: u32,
}

impl CoresetConfiguration {
    /// Get CORESET#0 configuration from table index
    /// Based on 3GPP TS 38.213 Table 13-1 for {15, 15} kHz SCS
    pub fn from_coreset0_index(index: u8) -> Result<Self, SchedError> {
        let (num_rbs, num_symbols, rb_offset) = match index {
            0 => (24, 2, 0),
            1 => (24, 2, 2),
            2 => (24, 2, 4),
            3 => (24, 3, 0),
            4 => (24, 3, 2),
            5 => (24, 3, 4),
            6 => (48, 1, 12),
            7 => (48, 1, 16),
            8 => (48, 2, 12),
            9 => (48, 2, 16),
            10 => (48, 3, 12),
            11 => (48, 3, 16),
            12 => (96, 1, 38),
            13 => (96, 2, 38),
            14 => (96, 3, 38),
            _ => {
                return Err(SchedError::InvalidConfiguration(format!(
                    "Invalid CORESET#0 index: {}",
                    index
                )))
            }
        };
        Ok(Self {
            num_rbs,
            num_symbols,
            rb_offset,
        })
    }

    /// Number of CCEs, N_CCE, in the CORESET
    pub fn nof_cces(&self) -> u32 {
        self.num_rbs * self.num_symbols / NOF_REGS_PER_CCE
    }
}

/// Location of the DCI within the CORESET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CceLocation {
    /// First CCE index, n_CCE,0
    pub ncce: u32,
    /// Aggregation level
    pub aggr_lvl: u8,
}

/// DCI context relevant to the uplink feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DciDlContextInformation {
    pub coreset_cfg: CoresetConfiguration,
    pub cces: CceLocation,
}

/// DL PDCCH allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdcchDlInformation {
    pub ctx: DciDlContextInformation,
}
