//! Uplink Resource Grid Occupancy
//!
//! Tracks which CRBs and OFDM symbols of each upcoming slot are already
//! granted, and holds the per-slot scheduling results.

use crate::config::BwpConfiguration;
use crate::sched_result::SchedResult;
use common::{CrbInterval, OfdmSymbolRange, SlotPoint, SubcarrierSpacing};
use ndarray::{s, Array2};
use std::ops::{Index, IndexMut};
use tracing::trace;

/// Number of slots tracked ahead of the current slot, including it
pub const RESOURCE_GRID_RING_SIZE: usize = 16;

/// Time-frequency footprint of a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantInfo {
    pub scs: SubcarrierSpacing,
    pub symbols: OfdmSymbolRange,
    pub crbs: CrbInterval,
}

/// Occupancy map of one uplink slot: [symbols, CRBs]
#[derive(Debug, Clone)]
pub struct UlResourceGrid {
    scs: SubcarrierSpacing,
    occupancy: Array2<bool>,
}

impl UlResourceGrid {
    /// Create an empty grid covering CRBs `[0, nof_crbs)`
    pub fn new(scs: SubcarrierSpacing, nof_symbols: u32, nof_crbs: u32) -> Self {
        Self {
            scs,
            occupancy: Array2::from_elem((nof_symbols as usize, nof_crbs as usize), false),
        }
    }

    pub fn nof_symbols(&self) -> u32 {
        self.occupancy.nrows() as u32
    }

    pub fn nof_crbs(&self) -> u32 {
        self.occupancy.ncols() as u32
    }

    /// Mark the grant as used. Filling an already used region is a no-op.
    pub fn fill(&mut self, grant: &GrantInfo) {
        self.check_grant(grant);
        trace!("Filling UL grid: symbols={} crbs={}", grant.symbols, grant.crbs);
        self.occupancy
            .slice_mut(s![
                grant.symbols.start() as usize..grant.symbols.stop() as usize,
                grant.crbs.start() as usize..grant.crbs.stop() as usize
            ])
            .fill(true);
    }

    /// Whether any RE of the grant is already used
    pub fn collides(&self, grant: &GrantInfo) -> bool {
        self.check_grant(grant);
        self.occupancy
            .slice(s![
                grant.symbols.start() as usize..grant.symbols.stop() as usize,
                grant.crbs.start() as usize..grant.crbs.stop() as usize
            ])
            .iter()
            .any(|&used| used)
    }

    /// Number of used (symbol, CRB) pairs
    pub fn nof_used(&self) -> usize {
        self.occupancy.iter().filter(|&&used| used).count()
    }

    pub fn clear(&mut self) {
        self.occupancy.fill(false);
    }

    fn check_grant(&self, grant: &GrantInfo) {
        assert_eq!(grant.scs, self.scs, "Grant numerology does not match the UL grid");
        assert!(
            grant.symbols.stop() <= self.nof_symbols() && grant.crbs.stop() <= self.nof_crbs(),
            "Grant symbols={} crbs={} outside of the UL grid",
            grant.symbols,
            grant.crbs
        );
    }
}

/// Resources and results of one slot
#[derive(Debug, Clone)]
pub struct CellSlotResourceAllocator {
    /// Slot this entry currently represents
    pub slot: SlotPoint,
    pub ul_res_grid: UlResourceGrid,
    pub result: SchedResult,
}

impl CellSlotResourceAllocator {
    fn reset(&mut self, slot: SlotPoint) {
        self.slot = slot;
        self.ul_res_grid.clear();
        self.result.clear();
    }
}

/// Ring of per-slot allocators, indexed by the offset from the current slot
#[derive(Debug)]
pub struct CellResourceAllocator {
    last_slot_ind: Option<SlotPoint>,
    slots: Vec<CellSlotResourceAllocator>,
}

impl CellResourceAllocator {
    pub fn new(bwp_cfg: &BwpConfiguration) -> Self {
        let grid = UlResourceGrid::new(bwp_cfg.scs, bwp_cfg.nof_symbols_per_slot(), bwp_cfg.crbs.stop());
        let slots = (0..RESOURCE_GRID_RING_SIZE)
            .map(|i| CellSlotResourceAllocator {
                slot: SlotPoint::from_count(bwp_cfg.scs, i as u32),
                ul_res_grid: grid.clone(),
                result: SchedResult::default(),
            })
            .collect();
        Self {
            last_slot_ind: None,
            slots,
        }
    }

    /// Farthest offset from the current slot that can be indexed
    pub fn max_lookahead(&self) -> usize {
        RESOURCE_GRID_RING_SIZE - 1
    }

    /// Advance to `slot_tx`. The slot leaving the window is cleared and reused
    /// for the new farthest slot.
    pub fn slot_indication(&mut self, slot_tx: SlotPoint) {
        match self.last_slot_ind {
            None => {
                for k in 0..RESOURCE_GRID_RING_SIZE {
                    let sl = slot_tx + k as u32;
                    self.slots[Self::ring_index(sl)].reset(sl);
                }
            }
            Some(last) => {
                assert!(
                    slot_tx == last + 1,
                    "Detected a skipped slot: expected {}, got {}",
                    last + 1,
                    slot_tx
                );
                let new_farthest = slot_tx + (RESOURCE_GRID_RING_SIZE as u32 - 1);
                self.slots[Self::ring_index(last)].reset(new_farthest);
            }
        }
        self.last_slot_ind = Some(slot_tx);
    }

    fn ring_index(sl: SlotPoint) -> usize {
        sl.to_uint() as usize % RESOURCE_GRID_RING_SIZE
    }

    fn slot_position(&self, offset: usize) -> usize {
        assert!(
            offset < RESOURCE_GRID_RING_SIZE,
            "Slot offset {} beyond the resource grid look-ahead of {}",
            offset,
            RESOURCE_GRID_RING_SIZE - 1
        );
        let Some(last) = self.last_slot_ind else {
            panic!("Resource grid accessed before the first slot indication");
        };
        Self::ring_index(last + offset as u32)
    }
}

impl Index<usize> for CellResourceAllocator {
    type Output = CellSlotResourceAllocator;

    fn index(&self, offset: usize) -> &CellSlotResourceAllocator {
        &self.slots[self.slot_position(offset)]
    }
}

impl IndexMut<usize> for CellResourceAllocator {
    fn index_mut(&mut self, offset: usize) -> &mut CellSlotResourceAllocator {
        let pos = self.slot_position(offset);
        &mut self.slots[pos]
    }
}
