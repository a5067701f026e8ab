//! The single logical instance of the mode engine
//!
//! `ModeService` owns the platform backend, the preferences and the cached
//! catalog/menu. Every operation is synchronous; the host serializes calls.

use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use crate::config::{PreferencesSnapshot, PreferencesStore};
use crate::constants::restore::REFRESH_TOLERANCE;
use crate::error::ModeError;
use crate::favorites::{self, ValidationResult};
use crate::modes::{
    CatalogSnapshot, DisplayModes, MenuFilter, MenuModel, ModeCatalog, ModeSwitcher, best_match,
    parse_resolution,
};
use crate::platform::DisplayBackend;
use crate::types::{DisplayIdentity, FavoriteEntry, ModeDescriptor, ResolutionSpec};

pub struct ModeService {
    backend: Box<dyn DisplayBackend>,
    prefs: PreferencesStore,
    snapshot: CatalogSnapshot,
    menu: MenuModel,
}

impl ModeService {
    /// Enumerates once and builds the menu
    pub fn new(backend: Box<dyn DisplayBackend>, prefs: PreferencesStore) -> Self {
        let mut service = Self {
            backend,
            prefs,
            snapshot: CatalogSnapshot::default(),
            menu: MenuModel::default(),
        };
        service.refresh();
        service
    }

    /// Re-enumerate displays and modes, then rebuild the menu
    pub fn refresh(&mut self) {
        self.snapshot = ModeCatalog::new(self.backend.as_ref()).snapshot();
        debug!(displays = self.snapshot.displays.len(), "Catalog refreshed");
        self.rebuild_menu();
    }

    /// Rebuild the menu from the current snapshot and freshly read preferences
    pub fn rebuild_menu(&mut self) {
        let filter = MenuFilter {
            min_refresh_rate: self.prefs.min_refresh_rate(),
            show_low_resolution: self.prefs.show_low_resolution(),
        };
        self.menu = MenuModel::build(&self.snapshot, &self.prefs.favorites(), filter);
    }

    pub fn menu(&self) -> &MenuModel {
        &self.menu
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    pub fn known_mode_keys(&self) -> HashSet<String> {
        self.snapshot.known_mode_keys()
    }

    /// Parse `text` and apply the best match on `display` (main display when
    /// omitted or empty). Returns a user-facing confirmation.
    pub fn set_mode(&mut self, text: &str, display: Option<&str>) -> Result<String, ModeError> {
        let spec =
            parse_resolution(text).ok_or_else(|| ModeError::InvalidSpecFormat(text.to_string()))?;
        self.set_mode_spec(&spec, display)
    }

    pub fn set_mode_spec(
        &mut self,
        spec: &ResolutionSpec,
        display: Option<&str>,
    ) -> Result<String, ModeError> {
        let target = self.resolve_display(display)?;
        let identity = target.identity.clone();
        let mode = best_match(spec, &target.modes)
            .cloned()
            .ok_or(ModeError::NoMatchingMode(*spec))?;
        info!(display = %identity.name, request = %spec, chosen = %mode, "Resolved mode request");

        if !ModeSwitcher::new(self.backend.as_ref()).apply(&mode, &identity) {
            return Err(ModeError::ModeApplicationFailed {
                display: identity.name,
                mode: mode.to_string(),
            });
        }

        self.record_last_used(&identity, &mode);
        self.refresh();
        Ok(format!("Set {} to {}", identity.name, mode))
    }

    fn resolve_display(&self, name: Option<&str>) -> Result<&DisplayModes, ModeError> {
        if let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) {
            return self
                .snapshot
                .find_by_name(name)
                .ok_or_else(|| ModeError::DisplayNotFound(name.to_string()));
        }

        let main = match self.backend.main_display() {
            Ok(Some(id)) => id,
            Ok(None) => return Err(ModeError::MainDisplayUnavailable),
            Err(e) => {
                warn!(error = ?e, "Failed to query main display");
                return Err(ModeError::MainDisplayUnavailable);
            }
        };
        self.snapshot
            .find_by_id(main)
            .ok_or(ModeError::TargetDisplayUndetermined)
    }

    fn record_last_used(&mut self, target: &DisplayIdentity, mode: &ModeDescriptor) {
        let name = &target.name;
        if let Err(e) = self.prefs.set_last_used(name, mode.to_favorite()) {
            error!(display = %name, error = ?e, "Failed to save last used mode");
        }
    }

    /// Re-apply each display's last used mode when it is still offered.
    /// Returns how many displays were switched.
    pub fn restore_last_used(&mut self) -> usize {
        let last_used = self.prefs.last_used();
        let mut targets: Vec<(DisplayIdentity, ModeDescriptor)> = Vec::new();
        for entry in &self.snapshot.displays {
            let name = &entry.identity.name;
            let Some(stored) = last_used.get(name) else {
                continue;
            };
            match entry.modes.iter().find(|mode| restorable(stored, mode)) {
                Some(mode) => targets.push((entry.identity.clone(), mode.clone())),
                None => info!(
                    display = %name,
                    stored = %stored,
                    "Last used mode no longer offered, skipping restore"
                ),
            }
        }

        let mut restored = 0;
        for (identity, mode) in &targets {
            if ModeSwitcher::new(self.backend.as_ref()).apply(mode, identity) {
                self.record_last_used(identity, mode);
                restored += 1;
            }
        }
        if restored > 0 {
            self.refresh();
        }
        info!(restored = restored, candidates = targets.len(), "Restore finished");
        restored
    }

    /// Drain platform notifications; re-enumerate when the configuration changed
    pub fn poll_display_changes(&mut self) -> bool {
        match self.backend.poll_changes() {
            Ok(true) => {
                info!("Display configuration changed, refreshing");
                self.refresh();
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(error = ?e, "Failed to poll display changes");
                false
            }
        }
    }

    pub fn validate_favorites(&self, text: &str) -> ValidationResult {
        favorites::validate(text, &self.known_mode_keys())
    }

    /// Validate and, unless a line could not be read, persist the entries
    pub fn save_favorites(&mut self, text: &str) -> Result<ValidationResult> {
        let result = self.validate_favorites(text);
        if result.has_warnings {
            warn!("Favorites contain unreadable lines, not saving");
            return Ok(result);
        }
        self.prefs.set_favorites(&result.entries)?;
        self.rebuild_menu();
        Ok(result)
    }

    pub fn preferences(&self) -> PreferencesSnapshot {
        self.prefs.snapshot()
    }

    pub fn set_min_refresh_rate(&mut self, rate: f64) -> Result<()> {
        self.prefs.set_min_refresh_rate(rate)?;
        self.rebuild_menu();
        Ok(())
    }

    pub fn set_show_low_resolution(&mut self, show: bool) -> Result<()> {
        self.prefs.set_show_low_resolution(show)?;
        self.rebuild_menu();
        Ok(())
    }

    pub fn set_start_at_login(&mut self, enabled: bool) -> Result<()> {
        self.prefs.set_start_at_login(enabled)
    }
}

fn restorable(stored: &FavoriteEntry, mode: &ModeDescriptor) -> bool {
    mode.width == stored.width
        && mode.height == stored.height
        && mode.density_doubled == stored.density_doubled
        && (mode.refresh_rate_hz - stored.refresh_rate_hz).abs() <= REFRESH_TOLERANCE
}
