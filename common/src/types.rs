//! Common Types for the 5G NR MAC scheduler
//!
//! Defines fundamental radio types shared by the scheduler crates

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use std::fmt;

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Physical Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid PCI value (0-1007)
    pub const MAX: u16 = 1007;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }
}

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 15,
    /// 30 kHz
    Scs30 = 30,
    /// 60 kHz
    Scs60 = 60,
    /// 120 kHz
    Scs120 = 120,
    /// 240 kHz
    Scs240 = 240,
}

impl SubcarrierSpacing {
    /// Numerology index mu (TS 38.211 Table 4.2-1)
    pub fn numerology(&self) -> u8 {
        match self {
            SubcarrierSpacing::Scs15 => 0,
            SubcarrierSpacing::Scs30 => 1,
            SubcarrierSpacing::Scs60 => 2,
            SubcarrierSpacing::Scs120 => 3,
            SubcarrierSpacing::Scs240 => 4,
        }
    }

    /// Build from a numerology index
    pub fn from_numerology(mu: u8) -> Option<Self> {
        Self::from_u32(15 << mu)
    }

    /// Number of slots per subframe (1ms)
    pub fn slots_per_subframe(&self) -> u32 {
        1 << self.numerology()
    }

    /// Number of slots per frame (10ms)
    pub fn slots_per_frame(&self) -> u32 {
        10 * self.slots_per_subframe()
    }

    /// Slot duration in microseconds
    pub fn slot_duration_us(&self) -> u32 {
        match self {
            SubcarrierSpacing::Scs15 => 1000,
            SubcarrierSpacing::Scs30 => 500,
            SubcarrierSpacing::Scs60 => 250,
            SubcarrierSpacing::Scs120 => 125,
            SubcarrierSpacing::Scs240 => 62, // Actually 62.5 us
        }
    }

    /// Spacing in kHz
    pub fn khz(&self) -> u32 {
        self.to_u32().unwrap_or_default()
    }
}

impl TryFrom<u32> for SubcarrierSpacing {
    type Error = String;

    fn try_from(khz: u32) -> Result<Self, Self::Error> {
        Self::from_u32(khz).ok_or_else(|| format!("Invalid subcarrier spacing: {} kHz", khz))
    }
}

impl From<SubcarrierSpacing> for u32 {
    fn from(scs: SubcarrierSpacing) -> Self {
        scs.khz()
    }
}
