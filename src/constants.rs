//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Config and runtime paths
pub mod paths {
    /// Directory name under the XDG config/runtime/cache dirs
    pub const APP_DIR: &str = "res-switcher";

    /// Preferences file inside the config dir
    pub const PREFERENCES_FILENAME: &str = "preferences.json";

    /// IPC socket file inside the runtime dir
    pub const SOCKET_FILENAME: &str = "daemon.sock";

    /// XDG autostart directory (relative to the config dir)
    pub const AUTOSTART_DIR: &str = "autostart";

    /// Autostart entry written when start-at-login is enabled
    pub const AUTOSTART_FILENAME: &str = "res-switcher.desktop";
}

/// Preference keys in the persisted key-value document
pub mod keys {
    pub const FAVORITES: &str = "favorites";
    pub const MIN_REFRESH_RATE: &str = "min_refresh_rate";
    pub const SHOW_LOW_RESOLUTION: &str = "show_low_resolution";
    pub const START_AT_LOGIN: &str = "start_at_login";
    pub const LAST_USED: &str = "last_used";
}

/// Defaults for absent or undecodable preferences
pub mod defaults {
    /// Minimum refresh rate shown in the menu (Hz)
    pub const MIN_REFRESH_RATE: f64 = 60.0;

    pub const SHOW_LOW_RESOLUTION: bool = false;

    pub const START_AT_LOGIN: bool = false;

    /// Refresh rate of every built-in favorite (Hz)
    pub const FAVORITE_REFRESH_RATE: f64 = 60.0;

    /// Built-in favorites, in display order
    pub const FAVORITE_RESOLUTIONS: [(u32, u32); 22] = [
        (3840, 2160),
        (3440, 1440),
        (3200, 1800),
        (3008, 1692),
        (2880, 1800),
        (2880, 1620),
        (2560, 1600),
        (2560, 1440),
        (2560, 1080),
        (2304, 1440),
        (2048, 1152),
        (1920, 1200),
        (1920, 1080),
        (1680, 1050),
        (1600, 900),
        (1440, 900),
        (1366, 768),
        (1280, 800),
        (1280, 720),
        (1152, 720),
        (1024, 768),
        (1024, 640),
    ];
}

/// Favorites text validation
pub mod validation {
    /// Refresh rate filled in when a favorites line omits it
    pub const DEFAULT_REFRESH_RATE: f64 = 30.0;

    /// Density flag filled in when a favorites line omits it
    pub const DEFAULT_DENSITY_DOUBLED: bool = true;
}

/// Mode scoring weights (lower score wins)
pub mod scoring {
    /// Multiplier on the Euclidean resolution distance
    pub const RESOLUTION_WEIGHT: f64 = 10_000.0;

    /// Flat penalty when the density flag differs from the request
    pub const DENSITY_PENALTY: f64 = 1_000.0;

    /// Multiplier on the refresh-rate difference when a rate is requested
    pub const REFRESH_WEIGHT: f64 = 10.0;

    /// Reference rate used to prefer faster modes when none is requested
    pub const REFRESH_CEILING: f64 = 120.0;

    /// Density preference when the request leaves it open
    pub const PREFER_DENSITY_DOUBLED: bool = true;
}

/// Startup restoration of the last used mode
pub mod restore {
    /// Maximum refresh-rate difference (Hz) for a stored mode to still match
    pub const REFRESH_TOLERANCE: f64 = 0.5;
}

/// Daemon loop timing
pub mod daemon {
    /// How long the main loop waits for IPC work before polling X11 events
    pub const POLL_INTERVAL_MS: u64 = 250;

    /// A connected client must send its request within this time
    pub const CLIENT_READ_TIMEOUT_MS: u64 = 2000;
}
