//! PUCCH Resource Manager
//!
//! Keeps, for each slot of the look-ahead window, the dedicated PUCCH
//! resources still available for HARQ-ACK and whether the SR opportunity has
//! been used. The counters live in a ring indexed by `slot mod RING_SIZE`;
//! each slot indication rearms the single entry that is about to represent
//! the new farthest slot.

use crate::config::{PucchConfig, PucchResource};
use common::SlotPoint;
use tracing::warn;

/// Size of the counter ring. Must exceed the farthest slot any caller allocates in.
pub const SLOT_RES_COUNTER_RING_SIZE: usize = 20;

/// Resource usage of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotResourceCounter {
    pub sr_resource_available: bool,
    /// Index in the UE PUCCH resource list of the next HARQ-ACK resource
    pub next_pucch_harq_res_idx: usize,
}

impl Default for SlotResourceCounter {
    fn default() -> Self {
        Self {
            sr_resource_available: true,
            next_pucch_harq_res_idx: 0,
        }
    }
}

/// Ring of per-slot PUCCH resource counters
#[derive(Debug)]
pub struct PucchResourceManager {
    last_sl_ind: Option<SlotPoint>,
    resource_slots: [SlotResourceCounter; SLOT_RES_COUNTER_RING_SIZE],
}

impl Default for PucchResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PucchResourceManager {
    pub fn new() -> Self {
        Self {
            last_sl_ind: None,
            resource_slots: [SlotResourceCounter::default(); SLOT_RES_COUNTER_RING_SIZE],
        }
    }

    /// Advance to `slot_tx` and rearm the counter of slot `slot_tx + RING_SIZE - 1`.
    pub fn slot_indication(&mut self, slot_tx: SlotPoint) {
        if let Some(last) = self.last_sl_ind {
            assert!(
                slot_tx == last + 1,
                "PUCCH resource manager skipped a slot: expected {}, got {}",
                last + 1,
                slot_tx
            );
        }
        self.last_sl_ind = Some(slot_tx);

        let farthest = slot_tx + (SLOT_RES_COUNTER_RING_SIZE as u32 - 1);
        self.resource_slots[Self::ring_index(farthest)] = SlotResourceCounter::default();
    }

    /// Next dedicated HARQ-ACK resource of `pucch_cfg` for `slot_harq`, if any is left.
    ///
    /// Successive calls for the same slot walk the resource list in order, so
    /// UEs sharing a list get distinct resources.
    pub fn get_next_harq_res_available<'c>(
        &mut self,
        slot_harq: SlotPoint,
        pucch_cfg: &'c PucchConfig,
    ) -> Option<&'c PucchResource> {
        let counter = self.get_slot_resource_counter_mut(slot_harq);
        let res = pucch_cfg.pucch_res_list.get(counter.next_pucch_harq_res_idx)?;
        counter.next_pucch_harq_res_idx += 1;
        Some(res)
    }

    /// PUCCH resource configured for SR in `slot_sr`, if the slot's SR
    /// opportunity has not been used yet.
    pub fn get_next_sr_res_available<'c>(
        &mut self,
        slot_sr: SlotPoint,
        pucch_cfg: &'c PucchConfig,
    ) -> Option<&'c PucchResource> {
        assert!(
            pucch_cfg.sr_res_list.len() == 1,
            "UE SR resource list must have size 1."
        );

        let counter = self.get_slot_resource_counter_mut(slot_sr);
        if !counter.sr_resource_available {
            return None;
        }

        let sr_res_cfg = &pucch_cfg.sr_res_list[0];
        let Some(pucch_sr_res) = pucch_cfg.find_resource(sr_res_cfg.pucch_res_id) else {
            warn!(
                "SR resource {} refers to PUCCH resource {} missing from the UE resource list",
                sr_res_cfg.sr_res_id, sr_res_cfg.pucch_res_id
            );
            return None;
        };

        counter.sr_resource_available = false;
        Some(pucch_sr_res)
    }

    /// Counter of a slot inside `[last indicated slot, last indicated slot + RING_SIZE)`
    pub fn get_slot_resource_counter(&self, sl: SlotPoint) -> &SlotResourceCounter {
        &self.resource_slots[self.window_index(sl)]
    }

    fn get_slot_resource_counter_mut(&mut self, sl: SlotPoint) -> &mut SlotResourceCounter {
        let idx = self.window_index(sl);
        &mut self.resource_slots[idx]
    }

    fn window_index(&self, sl: SlotPoint) -> usize {
        let Some(last) = self.last_sl_ind else {
            panic!("PUCCH resource ring-buffer accessed before the first slot indication");
        };
        let offset = sl - last;
        assert!(offset >= 0, "PUCCH resource ring-buffer accessed in the past: {} < {}", sl, last);
        assert!(
            (offset as usize) < SLOT_RES_COUNTER_RING_SIZE,
            "PUCCH resource ring-buffer accessed too far into the future: {} >= {} + {}",
            sl,
            last,
            SLOT_RES_COUNTER_RING_SIZE
        );
        Self::ring_index(sl)
    }

    fn ring_index(sl: SlotPoint) -> usize {
        sl.to_uint() as usize % SLOT_RES_COUNTER_RING_SIZE
    }
}
