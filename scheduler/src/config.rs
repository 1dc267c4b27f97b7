//! Cell and UE Configuration
//!
//! Read-only configuration consumed by the PUCCH allocator. The structures
//! follow the layout of `ServingCellConfigCommon` and `PUCCH-Config` in
//! TS 38.331, reduced to the fields the uplink control channel needs.

use crate::pucch::default_resource::PucchDefaultResource;
use crate::SchedError;
use common::{CrbInterval, OfdmSymbolRange, Pci, PrbInterval, Rnti, SlotPoint, SubcarrierSpacing};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Number of OFDM symbols per slot with normal cyclic prefix
pub const NOF_OFDM_SYM_PER_SLOT_NORMAL_CP: u32 = 14;
/// Number of OFDM symbols per slot with extended cyclic prefix
pub const NOF_OFDM_SYM_PER_SLOT_EXTENDED_CP: u32 = 12;
/// Maximum value of `hoppingId` (TS 38.331)
pub const MAX_HOPPING_ID: u16 = 1023;
/// `periodicityAndOffset` values expressed in slots, as per TS 38.331 `SchedulingRequestResourceConfig`
pub const SR_PERIODICITIES_IN_SLOTS: [u32; 13] = [1, 2, 4, 5, 8, 10, 16, 20, 40, 80, 160, 320, 640];
/// PUCCH formats 0 and 1 span a single PRB
pub const PUCCH_FORMAT_1_NOF_PRBS: u32 = 1;

/// Generic bandwidth part parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BwpConfiguration {
    /// Subcarrier spacing
    pub scs: SubcarrierSpacing,
    /// CRBs occupied by the BWP
    pub crbs: CrbInterval,
    /// Extended cyclic prefix
    #[serde(default)]
    pub cp_extended: bool,
}

impl BwpConfiguration {
    pub fn nof_symbols_per_slot(&self) -> u32 {
        if self.cp_extended {
            NOF_OFDM_SYM_PER_SLOT_EXTENDED_CP
        } else {
            NOF_OFDM_SYM_PER_SLOT_NORMAL_CP
        }
    }
}

/// Convert a PRB index (BWP-relative) into a CRB index
pub fn prb_to_crb(bwp_cfg: &BwpConfiguration, prb: u32) -> u32 {
    assert!(
        prb < bwp_cfg.crbs.length(),
        "PRB {} outside of BWP with {} PRBs",
        prb,
        bwp_cfg.crbs.length()
    );
    bwp_cfg.crbs.start() + prb
}

/// Convert a CRB interval into a BWP-relative PRB interval
pub fn crb_to_prb(bwp_cfg: &BwpConfiguration, crbs: CrbInterval) -> PrbInterval {
    assert!(
        bwp_cfg.crbs.contains_interval(&crbs),
        "CRBs {} outside of BWP {}",
        crbs,
        bwp_cfg.crbs
    );
    crbs.shifted(-(bwp_cfg.crbs.start() as i64))
}

/// `pucch-GroupHopping`, as per TS 38.331
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PucchGroupHopping {
    #[default]
    Neither,
    Enable,
    Disable,
}

/// `PUCCH-ConfigCommon`, as per TS 38.331
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchConfigCommon {
    /// Row of TS 38.213 Table 9.2.1-1
    pub pucch_resource_common: u8,
    #[serde(default)]
    pub group_hopping: PucchGroupHopping,
    /// Defaults to the PCI when absent
    #[serde(default)]
    pub hopping_id: Option<u16>,
}

/// Initial uplink BWP common parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BwpUplinkCommon {
    pub generic_params: BwpConfiguration,
    pub pucch_cfg_common: PucchConfigCommon,
}

/// Uplink common configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UlConfigCommon {
    pub init_ul_bwp: BwpUplinkCommon,
}

/// Cell configuration shared by all UEs of the cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellConfiguration {
    /// Physical Cell ID
    pub pci: Pci,
    /// Uplink common configuration
    pub ul_cfg_common: UlConfigCommon,
}

impl CellConfiguration {
    /// Initial UL BWP generic parameters
    pub fn ul_bwp(&self) -> &BwpConfiguration {
        &self.ul_cfg_common.init_ul_bwp.generic_params
    }

    pub fn pucch_cfg_common(&self) -> &PucchConfigCommon {
        &self.ul_cfg_common.init_ul_bwp.pucch_cfg_common
    }

    /// `hoppingId` if configured, otherwise the PCI (TS 38.211, Section 6.3.2.2.1)
    pub fn pucch_hopping_id(&self) -> u16 {
        self.pucch_cfg_common().hopping_id.unwrap_or(self.pci.0)
    }

    /// Check the configuration before handing it to the scheduler
    pub fn validate(&self) -> Result<(), SchedError> {
        if Pci::new(self.pci.0).is_none() {
            return Err(SchedError::InvalidConfiguration(format!(
                "PCI {} exceeds {}",
                self.pci.0,
                Pci::MAX
            )));
        }

        let bwp = self.ul_bwp();
        if !bwp.crbs.is_valid() || bwp.crbs.is_empty() {
            return Err(SchedError::InvalidConfiguration(format!(
                "Invalid initial UL BWP CRBs {}",
                bwp.crbs
            )));
        }

        if let Some(hopping_id) = self.pucch_cfg_common().hopping_id {
            if hopping_id > MAX_HOPPING_ID {
                return Err(SchedError::InvalidConfiguration(format!(
                    "PUCCH hopping ID {} exceeds {}",
                    hopping_id, MAX_HOPPING_ID
                )));
            }
        }

        let default_res = PucchDefaultResource::from_index(
            self.pucch_cfg_common().pucch_resource_common,
            bwp.crbs.length(),
        )?;
        // Table 9.2.1-1 assumes 14 symbols per slot.
        if default_res.first_symbol_index + default_res.nof_symbols > bwp.nof_symbols_per_slot() {
            return Err(SchedError::InvalidConfiguration(format!(
                "PUCCH common resource {} does not fit a slot of {} symbols",
                self.pucch_cfg_common().pucch_resource_common,
                bwp.nof_symbols_per_slot()
            )));
        }

        Ok(())
    }
}

/// PUCCH format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PucchFormat {
    Format0 = 0,
    Format1 = 1,
    Format2 = 2,
    Format3 = 3,
    Format4 = 4,
}

impl fmt::Display for PucchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Format {}", *self as u8)
    }
}

/// PUCCH-format0 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchFormat0Params {
    pub initial_cyclic_shift: u8,
    pub nof_symbols: u8,
    pub starting_sym_idx: u8,
}

/// PUCCH-format1 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchFormat1Params {
    pub initial_cyclic_shift: u8,
    pub nof_symbols: u8,
    pub starting_sym_idx: u8,
    pub time_domain_occ: u8,
}

/// PUCCH-format2/3/4 parameters. Accepted by the parser, never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchFormatOtherParams {
    pub nof_prbs: u8,
    pub nof_symbols: u8,
    pub starting_sym_idx: u8,
}

/// Format-specific part of a `PUCCH-Resource`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum PucchFormatParams {
    #[serde(rename = "format_0")]
    Format0(PucchFormat0Params),
    #[serde(rename = "format_1")]
    Format1(PucchFormat1Params),
    #[serde(rename = "format_2")]
    Format2(PucchFormatOtherParams),
    #[serde(rename = "format_3")]
    Format3(PucchFormatOtherParams),
    #[serde(rename = "format_4")]
    Format4(PucchFormatOtherParams),
}

impl PucchFormatParams {
    pub fn format(&self) -> PucchFormat {
        match self {
            PucchFormatParams::Format0(_) => PucchFormat::Format0,
            PucchFormatParams::Format1(_) => PucchFormat::Format1,
            PucchFormatParams::Format2(_) => PucchFormat::Format2,
            PucchFormatParams::Format3(_) => PucchFormat::Format3,
            PucchFormatParams::Format4(_) => PucchFormat::Format4,
        }
    }

    /// Symbols occupied within the slot
    pub fn symbols(&self) -> OfdmSymbolRange {
        let (start, nof_symbols) = match self {
            PucchFormatParams::Format0(p) => (p.starting_sym_idx, p.nof_symbols),
            PucchFormatParams::Format1(p) => (p.starting_sym_idx, p.nof_symbols),
            PucchFormatParams::Format2(p)
            | PucchFormatParams::Format3(p)
            | PucchFormatParams::Format4(p) => (p.starting_sym_idx, p.nof_symbols),
        };
        OfdmSymbolRange::new(start as u32, start as u32 + nof_symbols as u32)
    }

    pub fn nof_prbs(&self) -> u32 {
        match self {
            PucchFormatParams::Format0(_) | PucchFormatParams::Format1(_) => PUCCH_FORMAT_1_NOF_PRBS,
            PucchFormatParams::Format2(p)
            | PucchFormatParams::Format3(p)
            | PucchFormatParams::Format4(p) => p.nof_prbs as u32,
        }
    }
}

/// `PUCCH-Resource`, as per TS 38.331
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchResource {
    /// `pucch-ResourceId`
    pub res_id: u32,
    pub starting_prb: u32,
    #[serde(default)]
    pub intraslot_freq_hopping: bool,
    #[serde(default)]
    pub second_hop_prb: u32,
    #[serde(flatten)]
    pub format_params: PucchFormatParams,
}

impl PucchResource {
    pub fn format(&self) -> PucchFormat {
        self.format_params.format()
    }

    /// Symbols of the first and, with intra-slot hopping, the second hop
    pub fn hop_symbols(&self) -> (OfdmSymbolRange, Option<OfdmSymbolRange>) {
        let symbols = self.format_params.symbols();
        if !self.intraslot_freq_hopping {
            return (symbols, None);
        }
        let split = symbols.start() + symbols.length() / 2;
        (
            OfdmSymbolRange::new(symbols.start(), split),
            Some(OfdmSymbolRange::new(split, symbols.stop())),
        )
    }

    /// PRBs of the first hop
    pub fn prbs(&self) -> PrbInterval {
        PrbInterval::new(self.starting_prb, self.starting_prb + self.format_params.nof_prbs())
    }

    /// PRBs of the second hop, if hopping is enabled
    pub fn second_hop_prbs(&self) -> Option<PrbInterval> {
        self.intraslot_freq_hopping.then(|| {
            PrbInterval::new(self.second_hop_prb, self.second_hop_prb + self.format_params.nof_prbs())
        })
    }

    fn validate(&self, bwp: &BwpConfiguration) -> Result<(), SchedError> {
        match self.format() {
            PucchFormat::Format0 | PucchFormat::Format1 => {}
            other => {
                return Err(SchedError::InvalidConfiguration(format!(
                    "PUCCH resource {} uses {}; only formats 0 and 1 are supported",
                    self.res_id, other
                )))
            }
        }

        let symbols = self.format_params.symbols();
        if symbols.is_empty() || symbols.stop() > bwp.nof_symbols_per_slot() {
            return Err(SchedError::InvalidConfiguration(format!(
                "PUCCH resource {} symbols {} do not fit in a slot",
                self.res_id, symbols
            )));
        }

        let nof_prbs = bwp.crbs.length();
        let hops = std::iter::once(self.prbs()).chain(self.second_hop_prbs());
        for prbs in hops {
            if prbs.stop() > nof_prbs {
                return Err(SchedError::InvalidConfiguration(format!(
                    "PUCCH resource {} PRBs {} outside of BWP with {} PRBs",
                    self.res_id, prbs, nof_prbs
                )));
            }
        }
        Ok(())
    }
}

/// `SchedulingRequestResourceConfig`, as per TS 38.331
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingRequestResourceConfig {
    pub sr_res_id: u32,
    /// `resource`, the `pucch-ResourceId` used for SR
    pub pucch_res_id: u32,
    /// Periodicity in slots
    pub period: u32,
    /// Offset in slots within the period
    pub offset: u32,
}

impl SchedulingRequestResourceConfig {
    /// Whether `slot` is an SR transmission occasion (TS 38.213, Section 9.2.4)
    pub fn is_sr_occasion(&self, slot: SlotPoint) -> bool {
        slot.to_uint() % self.period == self.offset
    }
}

/// `PUCCH-Config`, as per TS 38.331
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PucchConfig {
    /// `resourceToAddModList`
    pub pucch_res_list: Vec<PucchResource>,
    /// `schedulingRequestResourceToAddModList`
    #[serde(default)]
    pub sr_res_list: Vec<SchedulingRequestResourceConfig>,
}

impl PucchConfig {
    pub fn find_resource(&self, res_id: u32) -> Option<&PucchResource> {
        self.pucch_res_list.iter().find(|res| res.res_id == res_id)
    }

    fn validate(&self, bwp: &BwpConfiguration) -> Result<(), SchedError> {
        if self.pucch_res_list.is_empty() {
            return Err(SchedError::InvalidConfiguration("Empty PUCCH resource list".into()));
        }

        let mut ids = HashSet::new();
        for res in &self.pucch_res_list {
            if !ids.insert(res.res_id) {
                return Err(SchedError::InvalidConfiguration(format!(
                    "Duplicate PUCCH resource ID {}",
                    res.res_id
                )));
            }
            res.validate(bwp)?;
        }

        // Only a single SR resource per UE is handled by the resource manager.
        let [sr_res] = self.sr_res_list.as_slice() else {
            return Err(SchedError::InvalidConfiguration(format!(
                "UE SR resource list must have size 1, got {}",
                self.sr_res_list.len()
            )));
        };

        if !SR_PERIODICITIES_IN_SLOTS.contains(&sr_res.period) || sr_res.offset >= sr_res.period {
            return Err(SchedError::InvalidConfiguration(format!(
                "Invalid SR period {} / offset {}",
                sr_res.period, sr_res.offset
            )));
        }

        let pucch_sr_res = self.find_resource(sr_res.pucch_res_id).ok_or_else(|| {
            SchedError::InvalidConfiguration(format!(
                "SR resource {} points to unknown PUCCH resource {}",
                sr_res.sr_res_id, sr_res.pucch_res_id
            ))
        })?;

        if pucch_sr_res.format() != PucchFormat::Format1 {
            return Err(SchedError::InvalidConfiguration(format!(
                "SR PUCCH resource {} uses {}; only Format 1 is supported for SR",
                pucch_sr_res.res_id,
                pucch_sr_res.format()
            )));
        }
        Ok(())
    }
}

/// Per-UE dedicated configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeCellConfiguration {
    pub crnti: Rnti,
    /// Absent until the UE has been configured by RRC
    #[serde(default)]
    pub pucch_cfg: Option<PucchConfig>,
}

impl UeCellConfiguration {
    pub fn validate(&self, cell_cfg: &CellConfiguration) -> Result<(), SchedError> {
        match &self.pucch_cfg {
            Some(pucch_cfg) => pucch_cfg.validate(cell_cfg.ul_bwp()).map_err(|e| match e {
                SchedError::InvalidConfiguration(msg) => {
                    SchedError::InvalidConfiguration(format!("rnti={}: {}", self.crnti, msg))
                }
                other => other,
            }),
            None => Ok(()),
        }
    }
}

/// Create a default cell configuration: 15 kHz, 52 PRBs, PUCCH common resource 0
pub fn default_cell_config(pci: Pci) -> CellConfiguration {
    CellConfiguration {
        pci,
        ul_cfg_common: UlConfigCommon {
            init_ul_bwp: BwpUplinkCommon {
                generic_params: BwpConfiguration {
                    scs: SubcarrierSpacing::Scs15,
                    crbs: CrbInterval::new(0, 52),
                    cp_extended: false,
                },
                pucch_cfg_common: PucchConfigCommon {
                    pucch_resource_common: 0,
                    group_hopping: PucchGroupHopping::Neither,
                    hopping_id: None,
                },
            },
        },
    }
}

/// Create a default dedicated UE configuration.
///
/// Resources 0 to 2 are hopping Format 1 resources for HARQ-ACK, resource 3 is
/// a non-hopping Format 1 resource used for SR every `sr_period` slots. The
/// PRBs stay clear of the band edges used by the common resources.
pub fn default_ue_config(crnti: Rnti, sr_period: u32, sr_offset: u32) -> UeCellConfiguration {
    let harq_res = |res_id: u32| PucchResource {
        res_id,
        starting_prb: 8 + res_id,
        intraslot_freq_hopping: true,
        second_hop_prb: 43 - res_id,
        format_params: PucchFormatParams::Format1(PucchFormat1Params {
            initial_cyclic_shift: 0,
            nof_symbols: 14,
            starting_sym_idx: 0,
            time_domain_occ: 0,
        }),
    };

    let mut pucch_res_list: Vec<PucchResource> = (0..3).map(harq_res).collect();
    pucch_res_list.push(PucchResource {
        res_id: 3,
        starting_prb: 11,
        intraslot_freq_hopping: false,
        second_hop_prb: 0,
        format_params: PucchFormatParams::Format1(PucchFormat1Params {
            initial_cyclic_shift: 0,
            nof_symbols: 14,
            starting_sym_idx: 0,
            time_domain_occ: 0,
        }),
    });

    UeCellConfiguration {
        crnti,
        pucch_cfg: Some(PucchConfig {
            pucch_res_list,
            sr_res_list: vec![SchedulingRequestResourceConfig {
                sr_res_id: 1,
                pucch_res_id: 3,
                period: sr_period,
                offset: sr_offset,
            }],
        }),
    }
}
