//! PUCCH resources before dedicated configuration
//!
//! Implements TS 38.213, Section 9.2.1: the default PUCCH resource set of
//! Table 9.2.1-1 and the derivation of the resource index, PRBs and cyclic
//! shift from the DCI scheduling the PDSCH.

use crate::config::PucchFormat;
use crate::SchedError;

/// Number of rows in TS 38.213 Table 9.2.1-1
pub const NOF_PUCCH_DEFAULT_RESOURCES: u8 = 16;

/// Number of values of the 3-bit PUCCH resource indicator used in the search
pub const MAX_D_PRI: u32 = 7;

const CS_SET_2: &[u8] = &[0, 3];
const CS_SET_3: &[u8] = &[0, 4, 8];
const CS_SET_2_WIDE: &[u8] = &[0, 6];
const CS_SET_4: &[u8] = &[0, 3, 6, 9];

/// One row of TS 38.213 Table 9.2.1-1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PucchDefaultResource {
    /// PUCCH format
    pub format: PucchFormat,
    /// First symbol
    pub first_symbol_index: u32,
    /// Number of symbols
    pub nof_symbols: u32,
    /// PRB offset RB_BWP^offset
    pub rb_bwp_offset: u32,
    /// Set of initial cyclic shift indexes
    pub cs_indexes: &'static [u8],
}

impl PucchDefaultResource {
    /// Get the default resource for `pucch-ResourceCommon` and the initial UL BWP size
    pub fn from_index(index: u8, size_ul_bwp: u32) -> Result<Self, SchedError> {
        let (format, first_symbol_index, nof_symbols, rb_bwp_offset, cs_indexes) = match index {
            0 => (PucchFormat::Format0, 12, 2, 0, CS_SET_2),
            1 => (PucchFormat::Format0, 12, 2, 0, CS_SET_3),
            2 => (PucchFormat::Format0, 12, 2, 3, CS_SET_3),
            3 => (PucchFormat::Format1, 10, 4, 0, CS_SET_2_WIDE),
            4 => (PucchFormat::Format1, 10, 4, 0, CS_SET_4),
            5 => (PucchFormat::Format1, 10, 4, 2, CS_SET_4),
            6 => (PucchFormat::Format1, 10, 4, 4, CS_SET_4),
            7 => (PucchFormat::Format1, 4, 10, 0, CS_SET_2_WIDE),
            8 => (PucchFormat::Format1, 4, 10, 0, CS_SET_4),
            9 => (PucchFormat::Format1, 4, 10, 2, CS_SET_4),
            10 => (PucchFormat::Format1, 4, 10, 4, CS_SET_4),
            11 => (PucchFormat::Format1, 0, 14, 0, CS_SET_2_WIDE),
            12 => (PucchFormat::Format1, 0, 14, 0, CS_SET_4),
            13 => (PucchFormat::Format1, 0, 14, 2, CS_SET_4),
            14 => (PucchFormat::Format1, 0, 14, 4, CS_SET_4),
            15 => (PucchFormat::Format1, 0, 14, size_ul_bwp / 4, CS_SET_4),
            _ => {
                return Err(SchedError::InvalidConfiguration(format!(
                    "Invalid PUCCH common resource index: {}",
                    index
                )))
            }
        };

        // Both hops of the largest resource index must fit in the BWP without crossing.
        let max_prb_shift = (2 * MAX_D_PRI + 1 - 8) / cs_indexes.len() as u32;
        if size_ul_bwp <= 2 * (rb_bwp_offset + max_prb_shift) {
            return Err(SchedError::InvalidConfiguration(format!(
                "Initial UL BWP of {} PRBs too small for PUCCH common resource {}",
                size_ul_bwp, index
            )));
        }

        Ok(Self {
            format,
            first_symbol_index,
            nof_symbols,
            rb_bwp_offset,
            cs_indexes,
        })
    }

    pub fn nof_cs(&self) -> u32 {
        self.cs_indexes.len() as u32
    }

    /// Initial cyclic shift for resource index `r_pucch`
    pub fn cyclic_shift(&self, r_pucch: u32) -> u8 {
        let r = if r_pucch < 8 { r_pucch } else { r_pucch - 8 };
        self.cs_indexes[(r % self.nof_cs()) as usize]
    }
}

/// r_PUCCH = floor(2 * n_CCE,0 / N_CCE) + 2 * Delta_PRI
pub fn get_pucch_default_resource_index(start_cce_idx: u32, nof_coreset_cces: u32, d_pri: u32) -> u32 {
    assert!(nof_coreset_cces > 0, "CORESET with no CCEs");
    assert!(
        start_cce_idx < nof_coreset_cces,
        "CCE {} outside of CORESET with {} CCEs",
        start_cce_idx,
        nof_coreset_cces
    );
    (2 * start_cce_idx) / nof_coreset_cces + 2 * d_pri
}

/// PRB indexes (first hop, second hop) for resource index `r_pucch`
pub fn get_pucch_default_prb_index(
    r_pucch: u32,
    rb_bwp_offset: u32,
    nof_cs: u32,
    size_ul_bwp: u32,
) -> (u32, u32) {
    if r_pucch < 8 {
        let shift = rb_bwp_offset + r_pucch / nof_cs;
        (shift, size_ul_bwp - 1 - shift)
    } else {
        let shift = rb_bwp_offset + (r_pucch - 8) / nof_cs;
        (size_ul_bwp - 1 - shift, shift)
    }
}
