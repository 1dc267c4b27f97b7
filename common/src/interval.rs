//! Half-open index ranges
//!
//! Resource blocks and OFDM symbols are addressed by `[start, stop)` ranges.
//! The unit is carried in the type so CRB and PRB ranges cannot be mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Common resource block unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crb {}

/// Physical resource block unit (relative to the BWP start)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prb {}

/// OFDM symbol unit (within a slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {}

/// Half-open interval `[start, stop)` of unit `K`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Interval<K> {
    start: u32,
    stop: u32,
    #[serde(skip)]
    _unit: PhantomData<K>,
}

pub type CrbInterval = Interval<Crb>;
pub type PrbInterval = Interval<Prb>;
pub type OfdmSymbolRange = Interval<Symbol>;

impl<K> Interval<K> {
    pub fn new(start: u32, stop: u32) -> Self {
        assert!(start <= stop, "Invalid interval [{}, {})", start, stop);
        Self {
            start,
            stop,
            _unit: PhantomData,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn stop(&self) -> u32 {
        self.stop
    }

    pub fn length(&self) -> u32 {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Whether the bounds are well ordered. Always true for intervals built
    /// with `new`; deserialized ones must be checked.
    pub fn is_valid(&self) -> bool {
        self.start <= self.stop
    }

    /// Whether `other` lies fully inside this interval
    pub fn contains_interval(&self, other: &Self) -> bool {
        other.start >= self.start && other.stop <= self.stop
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    /// Same bounds shifted by `offset` (may change the unit)
    pub fn shifted<U>(&self, offset: i64) -> Interval<U> {
        let start = self.start as i64 + offset;
        let stop = self.stop as i64 + offset;
        assert!(start >= 0, "Interval shifted below zero");
        Interval::new(start as u32, stop as u32)
    }
}

impl<K> Default for Interval<K> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl<K> fmt::Display for Interval<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}
