//! Display and mode enumeration into a canonical, deterministically ordered catalog

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};

use crate::platform::{DisplayBackend, DisplayId, ModeHandle, RawDisplay};
use crate::types::{DisplayIdentity, ModeDescriptor};

/// Read-only view over the platform's displays and modes
pub struct ModeCatalog<'a> {
    backend: &'a dyn DisplayBackend,
}

impl<'a> ModeCatalog<'a> {
    pub fn new(backend: &'a dyn DisplayBackend) -> Self {
        Self { backend }
    }

    /// Connected displays with unique names. Platform failure yields an empty list.
    pub fn list_displays(&self) -> Vec<DisplayIdentity> {
        match self.backend.displays() {
            Ok(raw) => disambiguate_names(raw),
            Err(e) => {
                error!(error = ?e, "Failed to enumerate displays");
                Vec::new()
            }
        }
    }

    /// All modes of `identity`, sorted. Platform failure yields an empty list.
    pub fn list_modes(&self, identity: &DisplayIdentity) -> Vec<ModeDescriptor> {
        let name = &identity.name;
        let raw_modes = match self.backend.modes(identity.id) {
            Ok(modes) => modes,
            Err(e) => {
                warn!(display = %name, error = ?e, "Failed to list modes, treating as none");
                return Vec::new();
            }
        };
        let active = self.backend.active_mode_id(identity.id).unwrap_or_else(|e| {
            warn!(display = %name, error = ?e, "Failed to query active mode");
            None
        });

        let mut modes: Vec<ModeDescriptor> = raw_modes
            .iter()
            .map(|raw| ModeDescriptor {
                width: raw.width,
                height: raw.height,
                refresh_rate_hz: raw.refresh_rate_hz,
                density_doubled: raw.is_density_doubled(),
                is_current: active == Some(raw.native_id),
                handle: ModeHandle::from_native(raw.native_id),
            })
            .collect();
        sort_modes(&mut modes);
        debug!(display = %name, count = modes.len(), "Listed modes");
        modes
    }

    /// Enumerate everything at once
    pub fn snapshot(&self) -> CatalogSnapshot {
        let displays = self
            .list_displays()
            .into_iter()
            .map(|identity| {
                let modes = self.list_modes(&identity);
                DisplayModes { identity, modes }
            })
            .collect();
        CatalogSnapshot { displays }
    }
}

/// One display together with its sorted modes
#[derive(Debug, Clone)]
pub struct DisplayModes {
    pub identity: DisplayIdentity,
    pub modes: Vec<ModeDescriptor>,
}

/// Result of one full enumeration; stale once a mode is applied
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub displays: Vec<DisplayModes>,
}

impl CatalogSnapshot {
    /// Exact name first, then case-insensitive
    pub fn find_by_name(&self, name: &str) -> Option<&DisplayModes> {
        self.displays
            .iter()
            .find(|d| d.identity.name == name)
            .or_else(|| {
                self.displays
                    .iter()
                    .find(|d| d.identity.name.eq_ignore_ascii_case(name))
            })
    }

    pub fn find_by_id(&self, id: DisplayId) -> Option<&DisplayModes> {
        self.displays.iter().find(|d| d.identity.id == id)
    }

    /// Canonical keys of every mode any display supports
    pub fn known_mode_keys(&self) -> HashSet<String> {
        self.displays
            .iter()
            .flat_map(|d| d.modes.iter())
            .map(|m| m.key().to_string())
            .collect()
    }
}

/// Append `-0`, `-1`, ... to names shared by several displays, in enumeration order.
/// A suffix already taken by another display's real name is skipped.
pub fn disambiguate_names(raw: Vec<RawDisplay>) -> Vec<DisplayIdentity> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for output in &raw {
        *counts.entry(output.name.clone()).or_default() += 1;
    }
    let mut taken: HashSet<String> = counts.keys().cloned().collect();

    let mut next_index: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .map(|output| {
            let name = if counts.get(&output.name).copied().unwrap_or(0) > 1 {
                let index = next_index.entry(output.name.clone()).or_default();
                let mut name = format!("{}-{}", output.name, index);
                while taken.contains(&name) {
                    *index += 1;
                    name = format!("{}-{}", output.name, index);
                }
                *index += 1;
                taken.insert(name.clone());
                name
            } else {
                output.name
            };
            DisplayIdentity {
                id: output.id,
                name,
            }
        })
        .collect()
}

/// Descending width, height, density (doubled first), refresh rate
pub fn sort_modes(modes: &mut [ModeDescriptor]) {
    modes.sort_by(compare_modes);
}

fn compare_modes(a: &ModeDescriptor, b: &ModeDescriptor) -> Ordering {
    b.width
        .cmp(&a.width)
        .then_with(|| b.height.cmp(&a.height))
        .then_with(|| b.density_doubled.cmp(&a.density_doubled))
        .then_with(|| b.refresh_rate_hz.total_cmp(&a.refresh_rate_hz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakeBackend;

    fn raw(id: u32, name: &str) -> RawDisplay {
        RawDisplay {
            id: DisplayId(id),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_disambiguate_shared_names_in_order() {
        let names: Vec<String> = disambiguate_names(vec![
            raw(1, "DELL U2720Q"),
            raw(2, "Built-in"),
            raw(3, "DELL U2720Q"),
        ])
        .into_iter()
        .map(|d| d.name)
        .collect();
        assert_eq!(names, vec!["DELL U2720Q-0", "Built-in", "DELL U2720Q-1"]);
    }

    #[test]
    fn test_disambiguate_skips_suffix_taken_by_real_name() {
        let names: Vec<String> = disambiguate_names(vec![
            raw(1, "DELL"),
            raw(2, "DELL"),
            raw(3, "DELL-0"),
        ])
        .into_iter()
        .map(|d| d.name)
        .collect();
        assert_eq!(names, vec!["DELL-1", "DELL-2", "DELL-0"]);

        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_disambiguate_unique_names_untouched() {
        let displays = disambiguate_names(vec![raw(1, "eDP-1"), raw(2, "HDMI-1")]);
        assert_eq!(displays[0].name, "eDP-1");
        assert_eq!(displays[1].name, "HDMI-1");
        assert_eq!(displays[1].id, DisplayId(2));
    }

    #[test]
    fn test_modes_sorted_descending_with_density_first() {
        let backend = FakeBackend::new().with_display(
            1,
            "eDP-1",
            &[
                (1920, 1080, 60.0, false),
                (2560, 1440, 60.0, false),
                (1920, 1080, 120.0, false),
                (1920, 1080, 60.0, true),
                (1920, 1200, 60.0, false),
            ],
            Some(0),
        );
        let catalog = ModeCatalog::new(&backend);
        let display = catalog.list_displays().remove(0);
        let modes = catalog.list_modes(&display);

        let order: Vec<(u32, u32, bool, i64)> = modes
            .iter()
            .map(|m| (m.width, m.height, m.density_doubled, m.refresh_rate_hz as i64))
            .collect();
        assert_eq!(
            order,
            vec![
                (2560, 1440, false, 60),
                (1920, 1200, false, 60),
                (1920, 1080, true, 60),
                (1920, 1080, false, 120),
                (1920, 1080, false, 60),
            ]
        );
    }

    #[test]
    fn test_current_flag_follows_active_mode() {
        let backend = FakeBackend::new().with_display(
            1,
            "eDP-1",
            &[(1920, 1080, 60.0, false), (1280, 720, 60.0, false)],
            Some(1),
        );
        let catalog = ModeCatalog::new(&backend);
        let display = catalog.list_displays().remove(0);
        let current: Vec<u32> = catalog
            .list_modes(&display)
            .iter()
            .filter(|m| m.is_current)
            .map(|m| m.width)
            .collect();
        assert_eq!(current, vec![1280]);
    }

    #[test]
    fn test_mode_listing_failure_is_empty() {
        let backend = FakeBackend::new()
            .with_display(1, "eDP-1", &[(1920, 1080, 60.0, false)], Some(0))
            .failing_modes(1);
        let snapshot = ModeCatalog::new(&backend).snapshot();
        assert_eq!(snapshot.displays.len(), 1);
        assert!(snapshot.displays[0].modes.is_empty());
    }

    #[test]
    fn test_known_mode_keys_span_all_displays() {
        let backend = FakeBackend::new()
            .with_display(1, "eDP-1", &[(1920, 1080, 59.94, true)], Some(0))
            .with_display(2, "HDMI-1", &[(2560, 1440, 144.0, false)], Some(0));
        let keys = ModeCatalog::new(&backend).snapshot().known_mode_keys();
        assert!(keys.contains("1920,1080,60,true"));
        assert!(keys.contains("2560,1440,144,false"));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_find_by_name_falls_back_to_case_insensitive() {
        let backend = FakeBackend::new().with_display(7, "HDMI-1", &[], None);
        let snapshot = ModeCatalog::new(&backend).snapshot();
        assert_eq!(snapshot.find_by_name("hdmi-1").map(|d| d.identity.id), Some(DisplayId(7)));
        assert!(snapshot.find_by_name("DP-2").is_none());
    }
}
