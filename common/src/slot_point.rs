//! Slot Point
//!
//! Wrapping slot counter bound to a numerology. The counter runs over a full
//! hyper-period of 1024 system frames and wraps back to zero.

use crate::types::SubcarrierSpacing;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Slot counter with modular arithmetic over 1024 frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotPoint {
    scs: SubcarrierSpacing,
    count: u32,
}

impl SlotPoint {
    /// Number of system frames before the counter wraps
    pub const NOF_SFNS: u32 = 1024;

    /// Create a slot point from SFN and slot index within the frame
    pub fn new(scs: SubcarrierSpacing, sfn: u32, slot_index: u32) -> Self {
        assert!(sfn < Self::NOF_SFNS, "Invalid SFN {}", sfn);
        assert!(
            slot_index < scs.slots_per_frame(),
            "Invalid slot index {} for {} kHz",
            slot_index,
            scs.khz()
        );
        Self {
            scs,
            count: sfn * scs.slots_per_frame() + slot_index,
        }
    }

    /// Create a slot point from an absolute slot count, wrapped to the period
    pub fn from_count(scs: SubcarrierSpacing, count: u32) -> Self {
        let period = Self::NOF_SFNS * scs.slots_per_frame();
        Self { scs, count: count % period }
    }

    /// Number of slots before the counter wraps
    pub fn nof_slots_per_period(&self) -> u32 {
        Self::NOF_SFNS * self.scs.slots_per_frame()
    }

    /// Slot count within the period
    pub fn to_uint(&self) -> u32 {
        self.count
    }

    /// System frame number
    pub fn sfn(&self) -> u32 {
        self.count / self.scs.slots_per_frame()
    }

    /// Slot index within the frame
    pub fn slot_index(&self) -> u32 {
        self.count % self.scs.slots_per_frame()
    }
}

impl Add<u32> for SlotPoint {
    type Output = SlotPoint;

    fn add(self, rhs: u32) -> SlotPoint {
        let period = self.nof_slots_per_period();
        SlotPoint {
            scs: self.scs,
            count: (self.count + rhs % period) % period,
        }
    }
}

impl AddAssign<u32> for SlotPoint {
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl Sub<u32> for SlotPoint {
    type Output = SlotPoint;

    fn sub(self, rhs: u32) -> SlotPoint {
        let period = self.nof_slots_per_period();
        SlotPoint {
            scs: self.scs,
            count: (self.count + period - rhs % period) % period,
        }
    }
}

/// Shortest signed distance between two slot points of the same numerology
impl Sub<SlotPoint> for SlotPoint {
    type Output = i32;

    fn sub(self, rhs: SlotPoint) -> i32 {
        assert_eq!(
            self.scs, rhs.scs,
            "Slot points with different numerologies cannot be compared"
        );
        let period = self.nof_slots_per_period();
        let diff = (self.count + period - rhs.count) % period;
        if diff >= period / 2 {
            diff as i32 - period as i32
        } else {
            diff as i32
        }
    }
}

impl PartialOrd for SlotPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.scs != other.scs {
            return None;
        }
        Some((*self - *other).cmp(&0))
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sfn(), self.slot_index())
    }
}
