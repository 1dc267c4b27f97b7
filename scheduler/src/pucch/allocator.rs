//! PUCCH Allocator
//!
//! Allocates PUCCH grants for HARQ-ACK and SR according to TS 38.213,
//! Section 9.2. HARQ-ACKs of UEs without dedicated configuration use the
//! default resources of Table 9.2.1-1; UEs with a `PUCCH-Config` use their
//! dedicated resources.

use super::default_resource::{
    get_pucch_default_prb_index, get_pucch_default_resource_index, PucchDefaultResource, MAX_D_PRI,
};
use super::resource_manager::PucchResourceManager;
use crate::config::{
    crb_to_prb, prb_to_crb, CellConfiguration, PucchFormat, PucchFormatParams, PucchGroupHopping,
    PucchResource, UeCellConfiguration,
};
use crate::pdcch::{DciDlContextInformation, PdcchDlInformation};
use crate::resource_grid::{CellResourceAllocator, CellSlotResourceAllocator, GrantInfo};
use crate::sched_result::{
    PucchFormat0Info, PucchFormat1Info, PucchFormatInfo, PucchInfo, PucchList, PucchRepetitionTxSlot,
    PucchResources, SrNofBits,
};
use crate::SchedError;
use common::{CrbInterval, OfdmSymbolRange, Rnti, SlotPoint};
use tracing::{debug, info_span, warn, Span};

/// HARQ-ACK bits reported on a PUCCH when no HARQ-ACK is pending
const HARQ_BITS_WITH_NO_HARQ_REPORTING: u32 = 0;
/// [Implementation-defined] Only 1 HARQ-ACK process is reported per PUCCH.
const HARQ_BITS_WITH_HARQ_REPORTING: u32 = 1;

/// Resources selected for a PUCCH before building the PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PucchResAllocCfg {
    pub first_hop_res: GrantInfo,
    pub second_hop_res: GrantInfo,
    /// Initial cyclic shift
    pub cs: u8,
    pub format: PucchFormat,
}

/// HARQ-ACK grant on a common PUCCH resource
#[derive(Debug, Clone, Copy)]
pub struct PucchHarqAckGrant<'r> {
    /// Delta_PRI to be signalled in the DCI
    pub pucch_res_indicator: u32,
    pub pucch_pdu: &'r PucchInfo,
}

/// PUCCH allocator of one cell
pub struct PucchAllocator<'a> {
    cell_cfg: &'a CellConfiguration,
    default_res: PucchDefaultResource,
    resource_manager: PucchResourceManager,
    last_sl_ind: Option<SlotPoint>,
    span: Span,
}

impl<'a> PucchAllocator<'a> {
    /// Create the allocator. Fails if the cell's common PUCCH configuration is invalid.
    pub fn new(cell_cfg: &'a CellConfiguration) -> Result<Self, SchedError> {
        cell_cfg.validate()?;
        let default_res = PucchDefaultResource::from_index(
            cell_cfg.pucch_cfg_common().pucch_resource_common,
            cell_cfg.ul_bwp().crbs.length(),
        )?;
        Ok(Self {
            cell_cfg,
            default_res,
            resource_manager: PucchResourceManager::new(),
            last_sl_ind: None,
            span: info_span!("pucch_alloc", pci = cell_cfg.pci.0),
        })
    }

    pub fn resource_manager(&self) -> &PucchResourceManager {
        &self.resource_manager
    }

    /// Advance to the next slot. Slots must be indicated without gaps.
    pub fn slot_indication(&mut self, sl_tx: SlotPoint) {
        // Before the first indication any slot is accepted.
        if let Some(last) = self.last_sl_ind {
            assert!(sl_tx == last + 1, "Detected a skipped slot: expected {}, got {}", last + 1, sl_tx);
        }
        self.last_sl_ind = Some(sl_tx);

        self.resource_manager.slot_indication(sl_tx);
    }

    /// Allocate a HARQ-ACK on a common PUCCH resource for a UE without
    /// dedicated configuration.
    ///
    /// The PUCCH goes in slot `pdsch_time_domain_resource + k1` relative to the
    /// current slot. Returns `None` if the slot has no room left.
    pub fn alloc_common_pucch_harq_ack_ue<'r>(
        &self,
        slot_alloc: &'r mut CellResourceAllocator,
        tcrnti: Rnti,
        pdsch_time_domain_resource: u32,
        k1: u32,
        dci_info: &PdcchDlInformation,
    ) -> Option<PucchHarqAckGrant<'r>> {
        let _enter = self.span.enter();

        // Slot of the PUCCH, considering the PDSCH delay (k0) and the HARQ-ACK delay (k1).
        let pucch_slot_alloc = &mut slot_alloc[(pdsch_time_domain_resource + k1) as usize];

        if pucch_slot_alloc.result.ul.pucchs.full() {
            debug!(
                "HARQ-ACK allocation for rnti={} in slot={} skipped: PUCCH list full",
                tcrnti, pucch_slot_alloc.slot
            );
            return None;
        }

        let Some((pucch_res_indicator, pucch_res)) =
            self.alloc_pucch_common_res_harq(pucch_slot_alloc, &dci_info.ctx)
        else {
            debug!(
                "HARQ-ACK allocation for rnti={} in slot={} skipped: no free common PUCCH resource",
                tcrnti, pucch_slot_alloc.slot
            );
            return None;
        };

        let pucch_info = self.fill_pucch_harq_grant(tcrnti, &pucch_res);
        let pucch_pdu = pucch_slot_alloc.result.ul.pucchs.emplace_back(pucch_info);
        debug!(
            "HARQ-ACK for rnti={} allocated on common PUCCH resource with d_pri={}",
            tcrnti, pucch_res_indicator
        );

        Some(PucchHarqAckGrant {
            pucch_res_indicator,
            pucch_pdu,
        })
    }

    /// Find a default PUCCH resource whose hops are both free, and reserve it.
    ///
    /// Returns the selected PUCCH resource indicator and the resource, or
    /// `None` if all candidates collide.
    pub fn alloc_pucch_common_res_harq(
        &self,
        pucch_alloc: &mut CellSlotResourceAllocator,
        dci_info: &DciDlContextInformation,
    ) -> Option<(u32, PucchResAllocCfg)> {
        let init_ul_bwp_param = self.cell_cfg.ul_bwp();
        // N_BWP^size, TS 38.213, Section 9.2.1.
        let size_ul_bwp = init_ul_bwp_param.crbs.length();
        let pucch_res = &self.default_res;

        let nof_coreset_cces = dci_info.coreset_cfg.nof_cces();
        let start_cce_idx = dci_info.cces.ncce;

        // The first floor(N_symb/2) symbols are the first hop, the rest the second (TS 38.211, 6.3.2.1).
        let split_symbol = pucch_res.first_symbol_index + pucch_res.nof_symbols / 2;
        let first_hop_symbols = OfdmSymbolRange::new(pucch_res.first_symbol_index, split_symbol);
        let second_hop_symbols =
            OfdmSymbolRange::new(split_symbol, pucch_res.first_symbol_index + pucch_res.nof_symbols);

        for d_pri in 0..MAX_D_PRI {
            let r_pucch = get_pucch_default_resource_index(start_cce_idx, nof_coreset_cces, d_pri);
            let (prb_first_hop, prb_second_hop) =
                get_pucch_default_prb_index(r_pucch, pucch_res.rb_bwp_offset, pucch_res.nof_cs(), size_ul_bwp);

            // Formats 0 and 1 occupy a single RB.
            let crb_first_hop = prb_to_crb(init_ul_bwp_param, prb_first_hop);
            let first_hop_grant = GrantInfo {
                scs: init_ul_bwp_param.scs,
                symbols: first_hop_symbols,
                crbs: CrbInterval::new(crb_first_hop, crb_first_hop + 1),
            };
            let crb_second_hop = prb_to_crb(init_ul_bwp_param, prb_second_hop);
            let second_hop_grant = GrantInfo {
                scs: init_ul_bwp_param.scs,
                symbols: second_hop_symbols,
                crbs: CrbInterval::new(crb_second_hop, crb_second_hop + 1),
            };

            if pucch_alloc.ul_res_grid.collides(&first_hop_grant)
                || pucch_alloc.ul_res_grid.collides(&second_hop_grant)
            {
                continue;
            }

            pucch_alloc.ul_res_grid.fill(&first_hop_grant);
            pucch_alloc.ul_res_grid.fill(&second_hop_grant);
            return Some((
                d_pri,
                PucchResAllocCfg {
                    first_hop_res: first_hop_grant,
                    second_hop_res: second_hop_grant,
                    cs: pucch_res.cyclic_shift(r_pucch),
                    format: pucch_res.format,
                },
            ));
        }

        None
    }

    /// Build the PDU of a HARQ-ACK on a common PUCCH resource
    pub fn fill_pucch_harq_grant(&self, rnti: Rnti, pucch_res: &PucchResAllocCfg) -> PucchInfo {
        let bwp_cfg = *self.cell_cfg.ul_bwp();
        let (group_hopping, n_id_hopping) = self.hopping_params();

        let resources = PucchResources {
            prbs: crb_to_prb(&bwp_cfg, pucch_res.first_hop_res.crbs),
            second_hop_prbs: Some(crb_to_prb(&bwp_cfg, pucch_res.second_hop_res.crbs)),
            symbols: OfdmSymbolRange::new(
                pucch_res.first_hop_res.symbols.start(),
                pucch_res.second_hop_res.symbols.stop(),
            ),
        };

        // SR is never reported on common resources.
        let format_info = match pucch_res.format {
            PucchFormat::Format0 => PucchFormatInfo::Format0(PucchFormat0Info {
                group_hopping,
                n_id_hopping,
                initial_cyclic_shift: pucch_res.cs,
                sr_bits: SrNofBits::NoSr,
                harq_ack_nof_bits: HARQ_BITS_WITH_HARQ_REPORTING,
            }),
            PucchFormat::Format1 => PucchFormatInfo::Format1(PucchFormat1Info {
                group_hopping,
                n_id_hopping,
                initial_cyclic_shift: pucch_res.cs,
                // OCC index 0 for the resources of Table 9.2.1-1 (TS 38.213, Section 9.2.1).
                time_domain_occ: 0,
                sr_bits: SrNofBits::NoSr,
                harq_ack_nof_bits: HARQ_BITS_WITH_HARQ_REPORTING,
                slot_repetition: PucchRepetitionTxSlot::NoMultiSlot,
            }),
            PucchFormat::Format2 | PucchFormat::Format3 | PucchFormat::Format4 => {
                panic!("PUCCH Format must be from 0 to 4, but only 0 and 1 are currently supported.")
            }
        };

        PucchInfo {
            crnti: rnti,
            bwp_cfg,
            resources,
            format_info,
        }
    }

    /// Allocate a HARQ-ACK on the UE's next free dedicated PUCCH resource.
    ///
    /// Dedicated resources are reserved by configuration, so no collision check
    /// is made. Returns `Ok(None)` if the UE has no dedicated configuration, its
    /// resources for the slot are exhausted or the slot has no room left.
    pub fn alloc_ded_pucch_harq_ack_ue<'r>(
        &mut self,
        slot_alloc: &'r mut CellResourceAllocator,
        crnti: Rnti,
        ue_cell_cfg: &UeCellConfiguration,
        pdsch_time_domain_resource: u32,
        k1: u32,
    ) -> Result<Option<&'r PucchInfo>, SchedError> {
        let _enter = self.span.enter();

        let Some(pucch_cfg) = ue_cell_cfg.pucch_cfg.as_ref() else {
            debug!("Dedicated HARQ-ACK allocation for rnti={} skipped: no PUCCH-Config", crnti);
            return Ok(None);
        };

        let pucch_slot_alloc = &mut slot_alloc[(pdsch_time_domain_resource + k1) as usize];
        if pucch_slot_alloc.result.ul.pucchs.full() {
            debug!(
                "Dedicated HARQ-ACK allocation for rnti={} in slot={} skipped: PUCCH list full",
                crnti, pucch_slot_alloc.slot
            );
            return Ok(None);
        }

        // Reject an unsupported resource before it takes the slot's HARQ-ACK cursor.
        let next_res_idx = self
            .resource_manager
            .get_slot_resource_counter(pucch_slot_alloc.slot)
            .next_pucch_harq_res_idx;
        if let Some(next_res) = pucch_cfg.pucch_res_list.get(next_res_idx) {
            if !matches!(next_res.format(), PucchFormat::Format0 | PucchFormat::Format1) {
                return Err(SchedError::UnsupportedPucchFormat(next_res.format()));
            }
        }

        let Some(pucch_harq_res) =
            self.resource_manager.get_next_harq_res_available(pucch_slot_alloc.slot, pucch_cfg)
        else {
            debug!(
                "Dedicated HARQ-ACK allocation for rnti={} in slot={} skipped: PUCCH resources exhausted",
                crnti, pucch_slot_alloc.slot
            );
            return Ok(None);
        };

        let pucch_info = self.fill_pucch_ded_res_grant(
            crnti,
            pucch_harq_res,
            SrNofBits::NoSr,
            HARQ_BITS_WITH_HARQ_REPORTING,
        )?;
        self.allocate_ded_pucch_on_grid(pucch_slot_alloc, pucch_harq_res);
        let pucch_pdu = pucch_slot_alloc.result.ul.pucchs.emplace_back(pucch_info);
        debug!(
            "HARQ-ACK for rnti={} allocated on dedicated PUCCH resource {}",
            crnti, pucch_harq_res.res_id
        );
        Ok(Some(pucch_pdu))
    }

    /// Allocate the SR opportunity of a UE in `pucch_slot_alloc`.
    ///
    /// If a HARQ-ACK grant already exists for the UE in the slot, the SR PUCCH
    /// also carries its HARQ-ACK bit. A missed SR opportunity is not an error
    /// and yields `Ok(None)`.
    pub fn pucch_allocate_sr_opportunity<'r>(
        &mut self,
        pucch_slot_alloc: &'r mut CellSlotResourceAllocator,
        crnti: Rnti,
        ue_cell_cfg: &UeCellConfiguration,
    ) -> Result<Option<&'r PucchInfo>, SchedError> {
        let _enter = self.span.enter();

        let Some(pucch_cfg) = ue_cell_cfg.pucch_cfg.as_ref() else {
            return Err(SchedError::InvalidConfiguration(format!(
                "rnti={} has no PUCCH-Config for SR",
                crnti
            )));
        };

        let Some(pucch_sr_res) =
            self.resource_manager.get_next_sr_res_available(pucch_slot_alloc.slot, pucch_cfg)
        else {
            warn!(
                "SR allocation skipped for rnti={} due to PUCCH ded. resource not available",
                crnti
            );
            return Ok(None);
        };

        let existing_harq_grant = get_harq_ack_grant_allocated(crnti, &pucch_slot_alloc.result.ul.pucchs);

        if pucch_slot_alloc.result.ul.pucchs.full() {
            warn!(
                "SR occasion allocation for rnti={} skipped. CAUSE: no more PUCCH grants available",
                crnti
            );
            return Ok(None);
        }

        let nof_harq_ack_bits = if existing_harq_grant.is_some() {
            HARQ_BITS_WITH_HARQ_REPORTING
        } else {
            HARQ_BITS_WITH_NO_HARQ_REPORTING
        };

        let pucch_info = self.fill_pucch_sr_grant(crnti, pucch_sr_res, nof_harq_ack_bits)?;
        self.allocate_ded_pucch_on_grid(pucch_slot_alloc, pucch_sr_res);
        let pucch_pdu = pucch_slot_alloc.result.ul.pucchs.emplace_back(pucch_info);
        debug!("SR occasion for rnti={} scheduling completed", crnti);
        Ok(Some(pucch_pdu))
    }

    /// Build the PDU of an SR occasion. Only Format 1 carries SR.
    pub fn fill_pucch_sr_grant(
        &self,
        crnti: Rnti,
        pucch_sr_res: &PucchResource,
        harq_ack_bits: u32,
    ) -> Result<PucchInfo, SchedError> {
        match pucch_sr_res.format() {
            PucchFormat::Format1 => {
                self.fill_pucch_ded_res_grant(crnti, pucch_sr_res, SrNofBits::One, harq_ack_bits)
            }
            other => Err(SchedError::UnsupportedPucchFormat(other)),
        }
    }

    /// Build a PDU on a dedicated resource
    fn fill_pucch_ded_res_grant(
        &self,
        crnti: Rnti,
        pucch_res: &PucchResource,
        sr_bits: SrNofBits,
        harq_ack_nof_bits: u32,
    ) -> Result<PucchInfo, SchedError> {
        let (group_hopping, n_id_hopping) = self.hopping_params();

        let format_info = match &pucch_res.format_params {
            PucchFormatParams::Format0(f0) => PucchFormatInfo::Format0(PucchFormat0Info {
                group_hopping,
                n_id_hopping,
                initial_cyclic_shift: f0.initial_cyclic_shift,
                sr_bits,
                harq_ack_nof_bits,
            }),
            PucchFormatParams::Format1(f1) => PucchFormatInfo::Format1(PucchFormat1Info {
                group_hopping,
                n_id_hopping,
                initial_cyclic_shift: f1.initial_cyclic_shift,
                time_domain_occ: f1.time_domain_occ,
                sr_bits,
                harq_ack_nof_bits,
                // [Implementation-defined] PUCCH over several slots is not implemented.
                slot_repetition: PucchRepetitionTxSlot::NoMultiSlot,
            }),
            PucchFormatParams::Format2(_)
            | PucchFormatParams::Format3(_)
            | PucchFormatParams::Format4(_) => {
                return Err(SchedError::UnsupportedPucchFormat(pucch_res.format()))
            }
        };

        Ok(PucchInfo {
            crnti,
            bwp_cfg: *self.cell_cfg.ul_bwp(),
            resources: PucchResources {
                prbs: pucch_res.prbs(),
                second_hop_prbs: pucch_res.second_hop_prbs(),
                symbols: pucch_res.format_params.symbols(),
            },
            format_info,
        })
    }

    /// Mark the hop(s) of a dedicated resource as used. No collision check: the
    /// resource is reserved for the UE by configuration.
    fn allocate_ded_pucch_on_grid(
        &self,
        pucch_slot_alloc: &mut CellSlotResourceAllocator,
        pucch_res: &PucchResource,
    ) {
        let bwp_config = self.cell_cfg.ul_bwp();
        let nof_prbs = pucch_res.format_params.nof_prbs();
        let (first_hop_symbols, second_hop_symbols) = pucch_res.hop_symbols();

        let crb_first_hop = prb_to_crb(bwp_config, pucch_res.starting_prb);
        pucch_slot_alloc.ul_res_grid.fill(&GrantInfo {
            scs: bwp_config.scs,
            symbols: first_hop_symbols,
            crbs: CrbInterval::new(crb_first_hop, crb_first_hop + nof_prbs),
        });

        if let Some(second_hop_symbols) = second_hop_symbols {
            let crb_second_hop = prb_to_crb(bwp_config, pucch_res.second_hop_prb);
            pucch_slot_alloc.ul_res_grid.fill(&GrantInfo {
                scs: bwp_config.scs,
                symbols: second_hop_symbols,
                crbs: CrbInterval::new(crb_second_hop, crb_second_hop + nof_prbs),
            });
        }
    }

    /// `pucch-GroupHopping` and `hoppingId`, as per TS 38.211, Section 6.3.2.2.1
    fn hopping_params(&self) -> (PucchGroupHopping, u16) {
        (
            self.cell_cfg.pucch_cfg_common().group_hopping,
            self.cell_cfg.pucch_hopping_id(),
        )
    }
}

/// HARQ-ACK grant already allocated for `crnti` in the slot, if any
fn get_harq_ack_grant_allocated(crnti: Rnti, pucchs: &PucchList) -> Option<&PucchInfo> {
    pucchs
        .iter()
        .find(|pucch| pucch.crnti == crnti && pucch.format_info.harq_ack_nof_bits() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_cell_config, default_ue_config, PucchFormat0Params, PucchFormatOtherParams};
    use crate::pucch::resource_manager::SLOT_RES_COUNTER_RING_SIZE;
    use crate::pdcch::{CceLocation, CoresetConfiguration};
    use crate::resource_grid::RESOURCE_GRID_RING_SIZE;
    use crate::sched_result::MAX_PUCCH_PDUS_PER_SLOT;
    use common::{Pci, PrbInterval, SubcarrierSpacing};

    const K1: u32 = 4;

    fn dci(ncce: u32) -> PdcchDlInformation {
        PdcchDlInformation {
            ctx: DciDlContextInformation {
                coreset_cfg: CoresetConfiguration::from_coreset0_index(0).unwrap(),
                cces: CceLocation { ncce, aggr_lvl: 4 },
            },
        }
    }

    fn grid_grant(symbols: (u32, u32), crbs: (u32, u32)) -> GrantInfo {
        GrantInfo {
            scs: SubcarrierSpacing::Scs15,
            symbols: OfdmSymbolRange::new(symbols.0, symbols.1),
            crbs: CrbInterval::new(crbs.0, crbs.1),
        }
    }

    struct TestBench {
        cell_cfg: CellConfiguration,
        slot: SlotPoint,
    }

    impl TestBench {
        fn new() -> Self {
            Self {
                cell_cfg: default_cell_config(Pci(1)),
                slot: SlotPoint::new(SubcarrierSpacing::Scs15, 10, 0),
            }
        }

        fn start(&self) -> (PucchAllocator<'_>, CellResourceAllocator) {
            let mut pucch_alloc = PucchAllocator::new(&self.cell_cfg).unwrap();
            let mut res_alloc = CellResourceAllocator::new(self.cell_cfg.ul_bwp());
            res_alloc.slot_indication(self.slot);
            pucch_alloc.slot_indication(self.slot);
            (pucch_alloc, res_alloc)
        }
    }

    #[test]
    fn test_common_harq_default_resource() {
        let bench = TestBench::new();
        let (pucch_alloc, mut res_alloc) = bench.start();

        let grant = pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4601), 0, K1, &dci(0))
            .unwrap();
        assert_eq!(grant.pucch_res_indicator, 0);

        let pdu = grant.pucch_pdu;
        assert_eq!(pdu.crnti, Rnti(0x4601));
        assert_eq!(pdu.format(), PucchFormat::Format0);
        assert_eq!(pdu.resources.prbs, PrbInterval::new(0, 1));
        assert_eq!(pdu.resources.second_hop_prbs, Some(PrbInterval::new(51, 52)));
        assert_eq!(pdu.resources.symbols, OfdmSymbolRange::new(12, 14));
        let PucchFormatInfo::Format0(f0) = pdu.format_info else {
            panic!("expected Format 0");
        };
        assert_eq!(f0.harq_ack_nof_bits, 1);
        assert_eq!(f0.sr_bits, SrNofBits::NoSr);
        assert_eq!(f0.initial_cyclic_shift, 0);
        assert_eq!(f0.n_id_hopping, 1);

        let pucch_slot = &res_alloc[K1 as usize];
        assert_eq!(pucch_slot.result.ul.pucchs.len(), 1);
        assert_eq!(pucch_slot.ul_res_grid.nof_used(), 2);
        // Other slots untouched
        assert_eq!(res_alloc[0].ul_res_grid.nof_used(), 0);
    }

    #[test]
    fn test_common_harq_skips_colliding_candidates() {
        let bench = TestBench::new();
        let (pucch_alloc, mut res_alloc) = bench.start();

        let first = pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4601), 0, K1, &dci(0))
            .map(|g| g.pucch_res_indicator);
        let second = pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4602), 0, K1, &dci(0))
            .unwrap();

        // r = 2 maps to PRB 1 / PRB 50 for the {0, 3} cyclic shift set.
        assert_eq!(first, Some(0));
        assert_eq!(second.pucch_res_indicator, 1);
        assert_eq!(second.pucch_pdu.resources.prbs, PrbInterval::new(1, 2));
        assert_eq!(second.pucch_pdu.resources.second_hop_prbs, Some(PrbInterval::new(50, 51)));
        assert_eq!(res_alloc[K1 as usize].result.ul.pucchs.len(), 2);
    }

    #[test]
    fn test_common_harq_hops_never_overlap_existing_grants() {
        let bench = TestBench::new();
        let (pucch_alloc, mut res_alloc) = bench.start();

        // Occupy the first hop of the d_pri = 0 and d_pri = 1 candidates.
        let bwp = *bench.cell_cfg.ul_bwp();
        let busy = GrantInfo {
            scs: bwp.scs,
            symbols: OfdmSymbolRange::new(12, 13),
            crbs: CrbInterval::new(0, 2),
        };
        res_alloc[K1 as usize].ul_res_grid.fill(&busy);

        let (d_pri, cfg) = pucch_alloc
            .alloc_pucch_common_res_harq(&mut res_alloc[K1 as usize], &dci(0).ctx)
            .unwrap();
        assert_eq!(d_pri, 2);
        assert!(!cfg.first_hop_res.crbs.overlaps(&busy.crbs));
        assert_eq!(cfg.first_hop_res.crbs, CrbInterval::new(2, 3));
        assert_eq!(cfg.second_hop_res.crbs, CrbInterval::new(49, 50));
        assert_eq!(cfg.format, PucchFormat::Format0);
    }

    #[test]
    fn test_common_harq_all_candidates_collide() {
        let bench = TestBench::new();
        let (pucch_alloc, mut res_alloc) = bench.start();

        let bwp = *bench.cell_cfg.ul_bwp();
        let pucch_slot = &mut res_alloc[K1 as usize];
        pucch_slot.ul_res_grid.fill(&GrantInfo {
            scs: bwp.scs,
            symbols: OfdmSymbolRange::new(13, 14),
            crbs: bwp.crbs,
        });
        let used_before = pucch_slot.ul_res_grid.nof_used();

        assert!(pucch_alloc.alloc_pucch_common_res_harq(pucch_slot, &dci(0).ctx).is_none());
        assert_eq!(pucch_slot.ul_res_grid.nof_used(), used_before);

        assert!(pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4601), 0, K1, &dci(0))
            .is_none());
        assert!(res_alloc[K1 as usize].result.ul.pucchs.is_empty());
    }

    #[test]
    fn test_common_harq_exhausts_seven_indicators() {
        let bench = TestBench::new();
        let (pucch_alloc, mut res_alloc) = bench.start();

        let indicators: Vec<u32> = (0..8)
            .filter_map(|i| {
                pucch_alloc
                    .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4601 + i), 0, K1, &dci(0))
                    .map(|g| g.pucch_res_indicator)
            })
            .collect();
        assert_eq!(indicators, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_common_harq_format1_row() {
        let mut bench = TestBench::new();
        bench.cell_cfg.ul_cfg_common.init_ul_bwp.pucch_cfg_common.pucch_resource_common = 11;
        bench.cell_cfg.ul_cfg_common.init_ul_bwp.pucch_cfg_common.hopping_id = Some(77);
        let (pucch_alloc, mut res_alloc) = bench.start();

        // n_CCE,0 = 4 of 8 CCEs gives r = 1: PRB 0, cyclic shift 6.
        let grant = pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4601), 1, K1, &dci(4))
            .unwrap();
        let pdu = grant.pucch_pdu;
        assert_eq!(pdu.resources.symbols, OfdmSymbolRange::new(0, 14));
        let PucchFormatInfo::Format1(f1) = pdu.format_info else {
            panic!("expected Format 1");
        };
        assert_eq!(f1.initial_cyclic_shift, 6);
        assert_eq!(f1.time_domain_occ, 0);
        assert_eq!(f1.n_id_hopping, 77);
        assert_eq!(f1.slot_repetition, PucchRepetitionTxSlot::NoMultiSlot);
        assert_eq!(res_alloc[(1 + K1) as usize].result.ul.pucchs.len(), 1);
    }

    #[test]
    fn test_common_harq_list_full() {
        let bench = TestBench::new();
        let (pucch_alloc, mut res_alloc) = bench.start();
        let ue_cfg = default_ue_config(Rnti(0x4601), 20, 0);
        let sr_res = ue_cfg.pucch_cfg.as_ref().unwrap().pucch_res_list[3];
        let filler = pucch_alloc.fill_pucch_sr_grant(Rnti(0x4601), &sr_res, 0).unwrap();

        for _ in 0..MAX_PUCCH_PDUS_PER_SLOT {
            res_alloc[K1 as usize].result.ul.pucchs.emplace_back(filler.clone());
        }
        assert!(pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4602), 0, K1, &dci(0))
            .is_none());
        assert_eq!(res_alloc[K1 as usize].ul_res_grid.nof_used(), 0);
    }

    #[test]
    fn test_sr_without_harq() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let ue_cfg = default_ue_config(Rnti(0x4601), 20, 0);

        let pdu = pucch_alloc
            .pucch_allocate_sr_opportunity(&mut res_alloc[0], Rnti(0x4601), &ue_cfg)
            .unwrap()
            .unwrap();
        assert_eq!(pdu.format(), PucchFormat::Format1);
        assert_eq!(pdu.resources.prbs, PrbInterval::new(11, 12));
        assert_eq!(pdu.resources.second_hop_prbs, None);
        assert_eq!(pdu.resources.symbols, OfdmSymbolRange::new(0, 14));
        assert_eq!(pdu.format_info.sr_bits(), SrNofBits::One);
        assert_eq!(pdu.format_info.harq_ack_nof_bits(), 0);
        assert_eq!(res_alloc[0].ul_res_grid.nof_used(), 14);
    }

    #[test]
    fn test_sr_piggybacks_harq_bit() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let rnti = Rnti(0x4601);
        let ue_cfg = default_ue_config(rnti, 20, 0);

        pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, rnti, 0, K1, &dci(0))
            .unwrap();

        let pdu = pucch_alloc
            .pucch_allocate_sr_opportunity(&mut res_alloc[K1 as usize], rnti, &ue_cfg)
            .unwrap()
            .unwrap();
        let PucchFormatInfo::Format1(f1) = pdu.format_info else {
            panic!("expected Format 1");
        };
        assert_eq!(f1.harq_ack_nof_bits, 1);
        assert_eq!(f1.sr_bits, SrNofBits::One);
        assert_eq!(f1.slot_repetition, PucchRepetitionTxSlot::NoMultiSlot);
        assert_eq!(res_alloc[K1 as usize].result.ul.pucchs.len(), 2);
    }

    #[test]
    fn test_sr_ignores_other_ue_harq() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let ue_cfg = default_ue_config(Rnti(0x4601), 20, 0);

        pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4602), 0, 0, &dci(0))
            .unwrap();
        let pdu = pucch_alloc
            .pucch_allocate_sr_opportunity(&mut res_alloc[0], Rnti(0x4601), &ue_cfg)
            .unwrap()
            .unwrap();
        assert_eq!(pdu.format_info.harq_ack_nof_bits(), 0);
    }

    #[test]
    fn test_sr_single_opportunity_per_slot() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let ue_cfg = default_ue_config(Rnti(0x4601), 20, 0);

        assert!(pucch_alloc
            .pucch_allocate_sr_opportunity(&mut res_alloc[2], Rnti(0x4601), &ue_cfg)
            .unwrap()
            .is_some());
        assert_eq!(
            pucch_alloc.pucch_allocate_sr_opportunity(&mut res_alloc[2], Rnti(0x4601), &ue_cfg),
            Ok(None)
        );
        assert_eq!(res_alloc[2].result.ul.pucchs.len(), 1);
        assert!(!pucch_alloc
            .resource_manager()
            .get_slot_resource_counter(bench.slot + 2)
            .sr_resource_available);
    }

    #[test]
    fn test_sr_list_full() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let rnti = Rnti(0x4601);
        let ue_cfg = default_ue_config(rnti, 20, 0);
        let sr_res = ue_cfg.pucch_cfg.as_ref().unwrap().pucch_res_list[3];
        let filler = pucch_alloc.fill_pucch_sr_grant(Rnti(0x4700), &sr_res, 0).unwrap();

        for _ in 0..MAX_PUCCH_PDUS_PER_SLOT {
            res_alloc[0].result.ul.pucchs.emplace_back(filler.clone());
        }
        assert_eq!(
            pucch_alloc.pucch_allocate_sr_opportunity(&mut res_alloc[0], rnti, &ue_cfg),
            Ok(None)
        );
        assert_eq!(res_alloc[0].ul_res_grid.nof_used(), 0);
    }

    #[test]
    fn test_sr_format0_is_unsupported() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let mut ue_cfg = default_ue_config(Rnti(0x4601), 20, 0);
        ue_cfg.pucch_cfg.as_mut().unwrap().pucch_res_list[3].format_params =
            PucchFormatParams::Format0(PucchFormat0Params {
                initial_cyclic_shift: 0,
                nof_symbols: 2,
                starting_sym_idx: 12,
            });

        assert_eq!(
            pucch_alloc.pucch_allocate_sr_opportunity(&mut res_alloc[0], Rnti(0x4601), &ue_cfg),
            Err(SchedError::UnsupportedPucchFormat(PucchFormat::Format0))
        );
        assert!(res_alloc[0].result.ul.pucchs.is_empty());
        assert_eq!(res_alloc[0].ul_res_grid.nof_used(), 0);
    }

    #[test]
    fn test_sr_requires_dedicated_config() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let ue_cfg = UeCellConfiguration {
            crnti: Rnti(0x4601),
            pucch_cfg: None,
        };
        assert!(matches!(
            pucch_alloc.pucch_allocate_sr_opportunity(&mut res_alloc[0], Rnti(0x4601), &ue_cfg),
            Err(SchedError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_dedicated_harq_round_robin() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let ue_a = default_ue_config(Rnti(0x4601), 20, 0);
        let ue_b = default_ue_config(Rnti(0x4602), 20, 0);

        let pdu_a = pucch_alloc
            .alloc_ded_pucch_harq_ack_ue(&mut res_alloc, ue_a.crnti, &ue_a, 0, K1)
            .unwrap()
            .unwrap()
            .clone();
        let pdu_b = pucch_alloc
            .alloc_ded_pucch_harq_ack_ue(&mut res_alloc, ue_b.crnti, &ue_b, 0, K1)
            .unwrap()
            .unwrap()
            .clone();

        assert_eq!(pdu_a.resources.prbs, PrbInterval::new(8, 9));
        assert_eq!(pdu_a.resources.second_hop_prbs, Some(PrbInterval::new(43, 44)));
        assert_eq!(pdu_b.resources.prbs, PrbInterval::new(9, 10));
        assert_eq!(pdu_b.format_info.harq_ack_nof_bits(), 1);
        assert_eq!(pdu_b.format_info.sr_bits(), SrNofBits::NoSr);
        // Two hopping resources, 7 symbols per hop
        assert_eq!(res_alloc[K1 as usize].ul_res_grid.nof_used(), 28);
    }

    #[test]
    fn test_dedicated_harq_exhausted() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let ue_cfg = default_ue_config(Rnti(0x4601), 20, 0);
        let nof_res = ue_cfg.pucch_cfg.as_ref().unwrap().pucch_res_list.len();

        for _ in 0..nof_res {
            assert!(pucch_alloc
                .alloc_ded_pucch_harq_ack_ue(&mut res_alloc, ue_cfg.crnti, &ue_cfg, 0, K1)
                .unwrap()
                .is_some());
        }
        assert_eq!(
            pucch_alloc.alloc_ded_pucch_harq_ack_ue(&mut res_alloc, ue_cfg.crnti, &ue_cfg, 0, K1),
            Ok(None)
        );
    }

    #[test]
    fn test_dedicated_harq_without_config() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let ue_cfg = UeCellConfiguration {
            crnti: Rnti(0x4601),
            pucch_cfg: None,
        };
        assert_eq!(
            pucch_alloc.alloc_ded_pucch_harq_ack_ue(&mut res_alloc, ue_cfg.crnti, &ue_cfg, 0, K1),
            Ok(None)
        );
    }

    #[test]
    fn test_allocations_across_slots() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let rnti = Rnti(0x4601);
        let ue_cfg = default_ue_config(rnti, 1, 0);

        for k in 1..3 * RESOURCE_GRID_RING_SIZE as u32 {
            let sl = bench.slot + k;
            res_alloc.slot_indication(sl);
            pucch_alloc.slot_indication(sl);

            pucch_alloc
                .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4700), 0, K1, &dci(0))
                .unwrap();
            let pdu = pucch_alloc
                .pucch_allocate_sr_opportunity(&mut res_alloc[0], rnti, &ue_cfg)
                .unwrap();
            assert!(pdu.is_some(), "SR missing in slot {}", sl);
        }
    }

    #[test]
    fn test_dedicated_harq_unsupported_format_keeps_cursor() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let mut ue_cfg = default_ue_config(Rnti(0x4601), 20, 0);
        ue_cfg.pucch_cfg.as_mut().unwrap().pucch_res_list[0].format_params =
            PucchFormatParams::Format2(PucchFormatOtherParams {
                nof_prbs: 1,
                nof_symbols: 2,
                starting_sym_idx: 12,
            });

        assert_eq!(
            pucch_alloc.alloc_ded_pucch_harq_ack_ue(&mut res_alloc, ue_cfg.crnti, &ue_cfg, 0, K1),
            Err(SchedError::UnsupportedPucchFormat(PucchFormat::Format2))
        );
        let counter = pucch_alloc.resource_manager().get_slot_resource_counter(bench.slot + K1);
        assert_eq!(counter.next_pucch_harq_res_idx, 0);
        assert!(res_alloc[K1 as usize].result.ul.pucchs.is_empty());
        assert_eq!(res_alloc[K1 as usize].ul_res_grid.nof_used(), 0);
    }

    #[test]
    fn test_bwp_with_crb_offset() {
        let mut bench = TestBench::new();
        bench.cell_cfg.ul_cfg_common.init_ul_bwp.generic_params.crbs = CrbInterval::new(10, 62);
        let (mut pucch_alloc, mut res_alloc) = bench.start();

        // Common resource: PRBs are BWP-relative, the grid is in CRBs.
        let grant = pucch_alloc
            .alloc_common_pucch_harq_ack_ue(&mut res_alloc, Rnti(0x4601), 0, K1, &dci(0))
            .unwrap();
        assert_eq!(grant.pucch_pdu.resources.prbs, PrbInterval::new(0, 1));
        assert_eq!(grant.pucch_pdu.resources.second_hop_prbs, Some(PrbInterval::new(51, 52)));

        let grid = &res_alloc[K1 as usize].ul_res_grid;
        assert_eq!(grid.nof_crbs(), 62);
        assert!(grid.collides(&grid_grant((12, 13), (10, 11))));
        assert!(grid.collides(&grid_grant((13, 14), (61, 62))));
        assert!(!grid.collides(&grid_grant((0, 14), (0, 10))));
        assert_eq!(grid.nof_used(), 2);

        // Dedicated resource 0: PRB 8 then PRB 43
        let ue_cfg = default_ue_config(Rnti(0x4602), 20, 0);
        let pdu = pucch_alloc
            .alloc_ded_pucch_harq_ack_ue(&mut res_alloc, ue_cfg.crnti, &ue_cfg, 1, K1)
            .unwrap()
            .unwrap();
        assert_eq!(pdu.resources.prbs, PrbInterval::new(8, 9));
        assert_eq!(pdu.resources.second_hop_prbs, Some(PrbInterval::new(43, 44)));

        let grid = &res_alloc[(1 + K1) as usize].ul_res_grid;
        assert!(grid.collides(&grid_grant((0, 7), (18, 19))));
        assert!(!grid.collides(&grid_grant((7, 14), (18, 19))));
        assert!(grid.collides(&grid_grant((7, 14), (53, 54))));
        assert!(!grid.collides(&grid_grant((0, 7), (53, 54))));
        assert!(!grid.collides(&grid_grant((0, 14), (8, 9))));
    }

    #[test]
    fn test_sr_with_intraslot_hopping() {
        let bench = TestBench::new();
        let (mut pucch_alloc, mut res_alloc) = bench.start();
        let rnti = Rnti(0x4601);
        let mut ue_cfg = default_ue_config(rnti, 20, 0);
        {
            let sr_res = &mut ue_cfg.pucch_cfg.as_mut().unwrap().pucch_res_list[3];
            sr_res.intraslot_freq_hopping = true;
            sr_res.second_hop_prb = 40;
        }
        assert!(ue_cfg.validate(&bench.cell_cfg).is_ok());

        let pdu = pucch_alloc
            .pucch_allocate_sr_opportunity(&mut res_alloc[0], rnti, &ue_cfg)
            .unwrap()
            .unwrap();
        assert_eq!(pdu.resources.prbs, PrbInterval::new(11, 12));
        assert_eq!(pdu.resources.second_hop_prbs, Some(PrbInterval::new(40, 41)));
        assert_eq!(pdu.resources.symbols, OfdmSymbolRange::new(0, 14));

        let grid = &res_alloc[0].ul_res_grid;
        assert_eq!(grid.nof_used(), 14);
        assert!(grid.collides(&grid_grant((0, 7), (11, 12))));
        assert!(!grid.collides(&grid_grant((7, 14), (11, 12))));
        assert!(grid.collides(&grid_grant((7, 14), (40, 41))));
        assert!(!grid.collides(&grid_grant((0, 7), (40, 41))));

        // The SR opportunity of this ring cell comes back one full ring later.
        for k in 1..=SLOT_RES_COUNTER_RING_SIZE as u32 {
            res_alloc.slot_indication(bench.slot + k);
            pucch_alloc.slot_indication(bench.slot + k);
        }
        assert!(pucch_alloc
            .pucch_allocate_sr_opportunity(&mut res_alloc[0], rnti, &ue_cfg)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_extended_cp_cell_rejected() {
        let mut cell_cfg = default_cell_config(Pci(1));
        cell_cfg.ul_cfg_common.init_ul_bwp.generic_params.cp_extended = true;
        assert!(matches!(
            PucchAllocator::new(&cell_cfg),
            Err(SchedError::InvalidConfiguration(_))
        ));
    }

    #[test]
    #[should_panic(expected = "Detected a skipped slot")]
    fn test_slot_indication_gap() {
        let bench = TestBench::new();
        let (mut pucch_alloc, _res_alloc) = bench.start();
        pucch_alloc.slot_indication(bench.slot + 2);
    }

    #[test]
    fn test_invalid_cell_config_rejected() {
        let mut cell_cfg = default_cell_config(Pci(1));
        cell_cfg.ul_cfg_common.init_ul_bwp.pucch_cfg_common.pucch_resource_common = 20;
        assert!(PucchAllocator::new(&cell_cfg).is_err());
    }
}
