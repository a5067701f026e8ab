//! Narrow platform interface used by the core
//!
//! The core never talks to the display server directly. It reads displays and
//! modes through [`DisplayBackend`] and hands an opaque [`ModeHandle`] back to
//! it when switching. The production backend is X11 RandR.

use anyhow::Result;

#[cfg(test)]
pub mod fake;
pub mod login_item;
pub mod randr;

pub use login_item::{LoginItemService, XdgAutostart};
pub use randr::RandrBackend;

/// Platform identifier of a display (a RandR output XID on X11)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayId(pub u32);

/// Opaque capability token for one platform mode.
///
/// Only the platform layer creates it and only `DisplayBackend::apply_mode`
/// reads it. Deliberately not comparable or hashable.
#[derive(Debug, Clone)]
pub struct ModeHandle(u32);

impl ModeHandle {
    pub(crate) fn from_native(id: u32) -> Self {
        Self(id)
    }

    pub(crate) fn native_id(&self) -> u32 {
        self.0
    }
}

/// A display as the platform reports it, before name disambiguation
#[derive(Debug, Clone)]
pub struct RawDisplay {
    pub id: DisplayId,
    pub name: String,
}

/// A mode as the platform reports it
#[derive(Debug, Clone)]
pub struct RawMode {
    pub native_id: u32,
    /// Logical size in points
    pub width: u32,
    pub height: u32,
    /// Backing size in pixels
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub refresh_rate_hz: f64,
}

impl RawMode {
    /// Backing pixel grid larger than the logical grid
    pub fn is_density_doubled(&self) -> bool {
        self.pixel_width > self.width || self.pixel_height > self.height
    }
}

pub trait DisplayBackend {
    /// Connected displays in enumeration order
    fn displays(&self) -> Result<Vec<RawDisplay>>;

    /// Every mode the display exposes, including low-resolution duplicates
    fn modes(&self, display: DisplayId) -> Result<Vec<RawMode>>;

    /// Native id of the mode currently driving the display
    fn active_mode_id(&self, display: DisplayId) -> Result<Option<u32>>;

    /// The primary display, if the platform designates one
    fn main_display(&self) -> Result<Option<DisplayId>>;

    /// One synchronous attempt to switch the display to `mode`
    fn apply_mode(&self, display: DisplayId, mode: &ModeHandle) -> Result<()>;

    /// Drain pending notifications; true when the display configuration changed
    fn poll_changes(&self) -> Result<bool> {
        Ok(false)
    }
}
