//! Typed preference accessors over a [`KeyValueStore`]
//!
//! Every setter writes through synchronously. Reads never fail: absent or
//! undecodable values fall back to the defaults in `constants::defaults`.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use super::store::{JsonFileStore, KeyValueStore};
use crate::constants::{defaults, keys};
use crate::platform::{LoginItemService, XdgAutostart};
use crate::types::{FavoriteEntry, ModeKey};

/// Last successfully applied mode per disambiguated display name
pub type LastUsedMap = BTreeMap<String, FavoriteEntry>;

/// Everything the preferences hold, for display and IPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferencesSnapshot {
    pub favorites: Vec<FavoriteEntry>,
    pub min_refresh_rate: f64,
    pub show_low_resolution: bool,
    pub start_at_login: bool,
    pub last_used: LastUsedMap,
}

pub struct PreferencesStore {
    store: Box<dyn KeyValueStore>,
    login_items: Box<dyn LoginItemService>,
}

impl PreferencesStore {
    pub fn new(store: Box<dyn KeyValueStore>, login_items: Box<dyn LoginItemService>) -> Self {
        Self { store, login_items }
    }

    /// Preferences file in the user config dir, XDG autostart for login items
    pub fn open_default() -> Result<Self> {
        let store = JsonFileStore::new(JsonFileStore::default_path());
        info!(path = %store.path().display(), "Using preferences file");
        let login_items = XdgAutostart::new().context("Failed to set up autostart integration")?;
        Ok(Self::new(Box::new(store), Box::new(login_items)))
    }

    fn read<T: DeserializeOwned>(&self, key: &str, default: impl FnOnce() -> T) -> T {
        match self.store.get(key) {
            None => default(),
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(key = key, error = %e, "Stored preference is corrupt, using default");
                default()
            }),
        }
    }

    fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .context(format!("Failed to encode preference '{key}'"))?;
        self.store
            .set(key, value)
            .context(format!("Failed to save preference '{key}'"))?;
        debug!(key = key, "Saved preference");
        Ok(())
    }

    pub fn favorites(&self) -> Vec<FavoriteEntry> {
        self.read(keys::FAVORITES, default_favorites)
    }

    /// Stores favorites in the given order, dropping later duplicates
    pub fn set_favorites(&mut self, favorites: &[FavoriteEntry]) -> Result<()> {
        let favorites = dedup_favorites(favorites);
        info!(count = favorites.len(), "Saving favorites");
        self.write(keys::FAVORITES, &favorites)
    }

    pub fn min_refresh_rate(&self) -> f64 {
        let rate: f64 = self.read(keys::MIN_REFRESH_RATE, || defaults::MIN_REFRESH_RATE);
        if rate < 0.0 {
            warn!(min_refresh_rate = rate, "Negative minimum refresh rate, clamping to 0");
            return 0.0;
        }
        rate
    }

    pub fn set_min_refresh_rate(&mut self, rate: f64) -> Result<()> {
        let rate = rate.max(0.0);
        self.write(keys::MIN_REFRESH_RATE, &rate)
    }

    pub fn show_low_resolution(&self) -> bool {
        self.read(keys::SHOW_LOW_RESOLUTION, || defaults::SHOW_LOW_RESOLUTION)
    }

    pub fn set_show_low_resolution(&mut self, show: bool) -> Result<()> {
        self.write(keys::SHOW_LOW_RESOLUTION, &show)
    }

    pub fn start_at_login(&self) -> bool {
        self.read(keys::START_AT_LOGIN, || defaults::START_AT_LOGIN)
    }

    /// Stores the flag, then registers with the login-item service.
    /// Registration failure is logged only; the stored flag stays as set.
    pub fn set_start_at_login(&mut self, enabled: bool) -> Result<()> {
        self.write(keys::START_AT_LOGIN, &enabled)?;
        if let Err(e) = self.login_items.set_enabled(enabled) {
            warn!(enabled = enabled, error = ?e, "Failed to update login item registration");
        }
        Ok(())
    }

    pub fn last_used(&self) -> LastUsedMap {
        self.read(keys::LAST_USED, LastUsedMap::new)
    }

    pub fn set_last_used(&mut self, display_name: &str, entry: FavoriteEntry) -> Result<()> {
        let mut map = self.last_used();
        map.insert(display_name.to_string(), entry);
        self.write(keys::LAST_USED, &map)
    }

    pub fn snapshot(&self) -> PreferencesSnapshot {
        PreferencesSnapshot {
            favorites: self.favorites(),
            min_refresh_rate: self.min_refresh_rate(),
            show_low_resolution: self.show_low_resolution(),
            start_at_login: self.start_at_login(),
            last_used: self.last_used(),
        }
    }
}

pub fn default_favorites() -> Vec<FavoriteEntry> {
    defaults::FAVORITE_RESOLUTIONS
        .iter()
        .map(|&(width, height)| {
            FavoriteEntry::new(width, height, defaults::FAVORITE_REFRESH_RATE, true)
        })
        .collect()
}

fn dedup_favorites(favorites: &[FavoriteEntry]) -> Vec<FavoriteEntry> {
    let mut seen: HashSet<ModeKey> = HashSet::new();
    favorites
        .iter()
        .filter(|favorite| seen.insert(favorite.key()))
        .copied()
        .collect()
}

#[cfg(test)]
pub struct NoopLoginItems;

#[cfg(test)]
impl LoginItemService for NoopLoginItems {
    fn set_enabled(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl PreferencesStore {
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(super::store::MemoryStore::default()),
            Box::new(NoopLoginItems),
        )
    }
}
