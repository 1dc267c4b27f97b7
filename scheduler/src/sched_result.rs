//! Scheduler Output
//!
//! Uplink control channel PDUs produced for each slot.

use crate::config::{BwpConfiguration, PucchFormat, PucchGroupHopping};
use common::{OfdmSymbolRange, PrbInterval, Rnti};

/// Maximum number of PUCCH PDUs per slot
pub const MAX_PUCCH_PDUS_PER_SLOT: usize = 64;

/// Number of SR bits carried by the PUCCH
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrNofBits {
    NoSr,
    One,
}

/// `nrofSlots` for PUCCH repetition. Only single-slot transmission is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PucchRepetitionTxSlot {
    NoMultiSlot,
}

/// Format 0 PDU fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PucchFormat0Info {
    pub group_hopping: PucchGroupHopping,
    pub n_id_hopping: u16,
    pub initial_cyclic_shift: u8,
    pub sr_bits: SrNofBits,
    pub harq_ack_nof_bits: u32,
}

/// Format 1 PDU fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PucchFormat1Info {
    pub group_hopping: PucchGroupHopping,
    pub n_id_hopping: u16,
    pub initial_cyclic_shift: u8,
    pub time_domain_occ: u8,
    pub sr_bits: SrNofBits,
    pub harq_ack_nof_bits: u32,
    pub slot_repetition: PucchRepetitionTxSlot,
}

/// Format-specific PDU fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PucchFormatInfo {
    Format0(PucchFormat0Info),
    Format1(PucchFormat1Info),
}

impl PucchFormatInfo {
    pub fn format(&self) -> PucchFormat {
        match self {
            PucchFormatInfo::Format0(_) => PucchFormat::Format0,
            PucchFormatInfo::Format1(_) => PucchFormat::Format1,
        }
    }

    pub fn harq_ack_nof_bits(&self) -> u32 {
        match self {
            PucchFormatInfo::Format0(f0) => f0.harq_ack_nof_bits,
            PucchFormatInfo::Format1(f1) => f1.harq_ack_nof_bits,
        }
    }

    pub fn sr_bits(&self) -> SrNofBits {
        match self {
            PucchFormatInfo::Format0(f0) => f0.sr_bits,
            PucchFormatInfo::Format1(f1) => f1.sr_bits,
        }
    }
}

/// Frequency and time resources of a PUCCH PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PucchResources {
    pub prbs: PrbInterval,
    pub second_hop_prbs: Option<PrbInterval>,
    pub symbols: OfdmSymbolRange,
}

/// PUCCH PDU sent to the PHY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PucchInfo {
    pub crnti: Rnti,
    pub bwp_cfg: BwpConfiguration,
    pub resources: PucchResources,
    pub format_info: PucchFormatInfo,
}

impl PucchInfo {
    pub fn format(&self) -> PucchFormat {
        self.format_info.format()
    }
}

/// Bounded list of PUCCH PDUs of one slot
#[derive(Debug, Clone)]
pub struct PucchList {
    pdus: Vec<PucchInfo>,
}

impl Default for PucchList {
    fn default() -> Self {
        Self {
            pdus: Vec::with_capacity(MAX_PUCCH_PDUS_PER_SLOT),
        }
    }
}

impl PucchList {
    pub fn full(&self) -> bool {
        self.pdus.len() >= MAX_PUCCH_PDUS_PER_SLOT
    }

    pub fn len(&self) -> usize {
        self.pdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pdus.is_empty()
    }

    /// Append a PDU. Callers must check `full()` first.
    pub fn emplace_back(&mut self, pdu: PucchInfo) -> &mut PucchInfo {
        assert!(!self.full(), "PUCCH PDU list is full");
        self.pdus.push(pdu);
        let last = self.pdus.len() - 1;
        &mut self.pdus[last]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PucchInfo> {
        self.pdus.iter()
    }

    pub fn clear(&mut self) {
        self.pdus.clear();
    }
}

impl<'a> IntoIterator for &'a PucchList {
    type Item = &'a PucchInfo;
    type IntoIter = std::slice::Iter<'a, PucchInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.pdus.iter()
    }
}

/// Uplink scheduling result of one slot
#[derive(Debug, Clone, Default)]
pub struct UlSchedResult {
    pub pucchs: PucchList,
}

/// Scheduling result of one slot
#[derive(Debug, Clone, Default)]
pub struct SchedResult {
    pub ul: UlSchedResult,
}

impl SchedResult {
    pub fn clear(&mut self) {
        self.ul.pucchs.clear();
    }
}
