//! Core value types shared by the catalog, matcher, validator and preferences

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::platform::{DisplayId, ModeHandle};

/// A connected display with its disambiguated, human-readable name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayIdentity {
    pub id: DisplayId,
    pub name: String,
}

/// Canonical identity of a mode: width, height, rounded refresh rate, density flag.
///
/// Two modes (or favorites) are the same when their keys are equal. The
/// `Display` form is the structured `width,height,refreshRate,densityFlag` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeKey {
    pub width: u32,
    pub height: u32,
    pub refresh_rate_hz: i64,
    pub density_doubled: bool,
}

impl ModeKey {
    pub fn new(width: u32, height: u32, refresh_rate_hz: f64, density_doubled: bool) -> Self {
        Self {
            width,
            height,
            refresh_rate_hz: refresh_rate_hz.round() as i64,
            density_doubled,
        }
    }
}

impl fmt::Display for ModeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.width, self.height, self.refresh_rate_hz, self.density_doubled
        )
    }
}

/// One mode a display supports, normalized from the platform's enumeration
#[derive(Debug, Clone)]
pub struct ModeDescriptor {
    pub width: u32,
    pub height: u32,
    pub refresh_rate_hz: f64,
    pub density_doubled: bool,
    pub is_current: bool,
    /// Platform token handed back to the switcher, never inspected by the core
    pub handle: ModeHandle,
}

impl ModeDescriptor {
    pub fn key(&self) -> ModeKey {
        ModeKey::new(self.width, self.height, self.refresh_rate_hz, self.density_doubled)
    }

    /// Same mode under the canonical-key rule (current flag and handle ignored)
    pub fn same_mode(&self, other: &ModeDescriptor) -> bool {
        self.key() == other.key()
    }

    pub fn to_favorite(&self) -> FavoriteEntry {
        FavoriteEntry {
            width: self.width,
            height: self.height,
            refresh_rate_hz: self.refresh_rate_hz,
            density_doubled: self.density_doubled,
        }
    }
}

impl fmt::Display for ModeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {:.0}Hz", self.width, self.height, self.refresh_rate_hz)?;
        if self.density_doubled {
            write!(f, " (HiDPI)")?;
        }
        Ok(())
    }
}

/// A partially specified mode request; `None` leaves the field to the matcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionSpec {
    pub width: u32,
    pub height: u32,
    pub refresh_rate_hz: Option<f64>,
    pub density_doubled: Option<bool>,
}

impl fmt::Display for ResolutionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if let Some(rate) = self.refresh_rate_hz {
            write!(f, "@{rate}")?;
        }
        if let Some(density) = self.density_doubled {
            write!(f, " hidpi={density}")?;
        }
        Ok(())
    }
}

/// A fully specified mode, as persisted in favorites and the last-used map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub width: u32,
    pub height: u32,
    pub refresh_rate_hz: f64,
    pub density_doubled: bool,
}

impl FavoriteEntry {
    pub fn new(width: u32, height: u32, refresh_rate_hz: f64, density_doubled: bool) -> Self {
        Self {
            width,
            height,
            refresh_rate_hz,
            density_doubled,
        }
    }

    pub fn key(&self) -> ModeKey {
        ModeKey::new(self.width, self.height, self.refresh_rate_hz, self.density_doubled)
    }
}

impl fmt::Display for FavoriteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
