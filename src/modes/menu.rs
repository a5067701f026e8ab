//! Menu data model: catalog modes joined with favorites, filtered for presentation
//!
//! Rebuilt synchronously on start, explicit refresh, successful switches and
//! preference changes. There is no timer; nothing else invalidates it.

use std::collections::HashSet;

use super::catalog::CatalogSnapshot;
use crate::types::{DisplayIdentity, FavoriteEntry, ModeDescriptor, ModeKey};

/// Preference-driven presentation rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuFilter {
    /// Modes below this (rounded) rate are hidden
    pub min_refresh_rate: f64,
    /// Show non-HiDPI duplicates of HiDPI sizes
    pub show_low_resolution: bool,
}

#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub mode: ModeDescriptor,
    pub is_favorite: bool,
}

#[derive(Debug, Clone)]
pub struct DisplayMenu {
    pub display: DisplayIdentity,
    /// Visible modes in catalog order; empty means "No modes available"
    pub modes: Vec<MenuEntry>,
    /// Favorites this display supports, in favorites order
    pub favorites: Vec<MenuEntry>,
}

impl DisplayMenu {
    pub fn current(&self) -> Option<&MenuEntry> {
        self.modes.iter().find(|entry| entry.mode.is_current)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MenuModel {
    pub displays: Vec<DisplayMenu>,
}

impl MenuModel {
    pub fn build(snapshot: &CatalogSnapshot, favorites: &[FavoriteEntry], filter: MenuFilter) -> Self {
        let favorite_keys: HashSet<ModeKey> = favorites.iter().map(FavoriteEntry::key).collect();

        let displays = snapshot
            .displays
            .iter()
            .map(|display| {
                let modes = visible_modes(&display.modes, filter)
                    .into_iter()
                    .map(|mode| MenuEntry {
                        is_favorite: favorite_keys.contains(&mode.key()),
                        mode,
                    })
                    .collect();
                DisplayMenu {
                    display: display.identity.clone(),
                    modes,
                    favorites: supported_favorites(&display.modes, favorites),
                }
            })
            .collect();

        Self { displays }
    }

    pub fn display(&self, name: &str) -> Option<&DisplayMenu> {
        self.displays.iter().find(|menu| menu.display.name == name)
    }
}

fn visible_modes(modes: &[ModeDescriptor], filter: MenuFilter) -> Vec<ModeDescriptor> {
    let doubled_sizes: HashSet<(u32, u32)> = modes
        .iter()
        .filter(|m| m.density_doubled)
        .map(|m| (m.width, m.height))
        .collect();

    let mut visible: Vec<ModeDescriptor> = Vec::new();
    for mode in modes {
        if !mode.is_current {
            let rate = mode.key().refresh_rate_hz;
            // 0 Hz means the panel does not report a rate
            if rate != 0 && (rate as f64) < filter.min_refresh_rate {
                continue;
            }
            let low_res_duplicate =
                !mode.density_doubled && doubled_sizes.contains(&(mode.width, mode.height));
            if low_res_duplicate && !filter.show_low_resolution {
                continue;
            }
        }

        if let Some(existing) = visible.iter_mut().find(|m| m.same_mode(mode)) {
            existing.is_current |= mode.is_current;
            continue;
        }
        visible.push(mode.clone());
    }
    visible
}

fn supported_favorites(modes: &[ModeDescriptor], favorites: &[FavoriteEntry]) -> Vec<MenuEntry> {
    favorites
        .iter()
        .filter_map(|favorite| {
            let key = favorite.key();
            let mut matching = modes.iter().filter(|m| m.key() == key);
            let first = matching.next()?;
            let mut mode = first.clone();
            mode.is_current = first.is_current || matching.any(|m| m.is_current);
            Some(MenuEntry {
                mode,
                is_favorite: true,
            })
        })
        .collect()
}
