//! IPC message types for CLI ↔ daemon communication

use serde::{Deserialize, Serialize};

use crate::config::PreferencesSnapshot;
use crate::favorites::ValidationResult;
use crate::modes::{DisplayMenu, MenuEntry};

/// Requests sent from the CLI to the daemon
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum DaemonRequest {
    /// Resolve and apply a mode; `display` None means the main display
    SetMode {
        spec: String,
        display: Option<String>,
    },

    /// Current menu model, optionally for one display
    ListModes { display: Option<String> },

    /// Re-enumerate displays and rebuild the menu
    Refresh,

    /// Re-apply the last used mode on every display that still offers it
    Restore,

    /// Validate favorites text against the connected displays
    ValidateFavorites(String),

    /// Validate and persist favorites text
    SetFavorites(String),

    GetPreferences,

    SetPreference(PreferenceUpdate),

    /// Health check
    Ping,

    /// Request graceful shutdown
    Shutdown,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum PreferenceUpdate {
    MinRefreshRate(f64),
    ShowLowResolution(bool),
    StartAtLogin(bool),
}

/// Responses sent from the daemon to the CLI
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum DaemonResponse {
    /// Mode applied; carries the confirmation text
    ModeSet(String),

    Modes(Vec<DisplaySummary>),

    Validation(ValidationResult),

    Preferences(PreferencesSnapshot),

    /// Number of displays switched by a restore
    Restored(usize),

    /// Acknowledgment that request was processed
    Ready,

    /// Health check response
    Pong,

    Error(String),
}

/// Serializable view of one menu entry
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModeSummary {
    pub width: u32,
    pub height: u32,
    pub refresh_rate_hz: f64,
    pub density_doubled: bool,
    pub is_current: bool,
    pub is_favorite: bool,
}

impl From<&MenuEntry> for ModeSummary {
    fn from(entry: &MenuEntry) -> Self {
        Self {
            width: entry.mode.width,
            height: entry.mode.height,
            refresh_rate_hz: entry.mode.refresh_rate_hz,
            density_doubled: entry.mode.density_doubled,
            is_current: entry.mode.is_current,
            is_favorite: entry.is_favorite,
        }
    }
}

/// Serializable view of one display's menu
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisplaySummary {
    pub name: String,
    pub current: Option<ModeSummary>,
    pub modes: Vec<ModeSummary>,
    pub favorites: Vec<ModeSummary>,
}

impl From<&DisplayMenu> for DisplaySummary {
    fn from(menu: &DisplayMenu) -> Self {
        Self {
            name: menu.display.name.clone(),
            current: menu.current().map(ModeSummary::from),
            modes: menu.modes.iter().map(ModeSummary::from).collect(),
            favorites: menu.favorites.iter().map(ModeSummary::from).collect(),
        }
    }
}
