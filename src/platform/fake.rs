//! In-memory backend for unit tests

use anyhow::{Result, bail};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{DisplayBackend, DisplayId, ModeHandle, RawDisplay, RawMode};

struct FakeDisplay {
    raw: RawDisplay,
    modes: Vec<RawMode>,
    active: Option<u32>,
    fail_modes: bool,
}

#[derive(Default)]
pub struct FakeBackend {
    displays: RefCell<Vec<FakeDisplay>>,
    main: Option<DisplayId>,
    reject_apply: Cell<bool>,
    next_id: Cell<u32>,
    pub applied: RefCell<Vec<(DisplayId, u32)>>,
    pending_change: Cell<bool>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            ..Self::default()
        }
    }

    /// Add a display; modes are `(width, height, refresh, density_doubled)`.
    /// The first display added becomes the main display.
    pub fn with_display(
        mut self,
        id: u32,
        name: &str,
        modes: &[(u32, u32, f64, bool)],
        current: Option<usize>,
    ) -> Self {
        let raw_modes: Vec<RawMode> = modes
            .iter()
            .map(|&(width, height, refresh_rate_hz, doubled)| {
                let native_id = self.next_id.get();
                self.next_id.set(native_id + 1);
                let scale = if doubled { 2 } else { 1 };
                RawMode {
                    native_id,
                    width,
                    height,
                    pixel_width: width * scale,
                    pixel_height: height * scale,
                    refresh_rate_hz,
                }
            })
            .collect();
        let active = current.map(|i| raw_modes[i].native_id);
        self.displays.borrow_mut().push(FakeDisplay {
            raw: RawDisplay {
                id: DisplayId(id),
                name: name.to_string(),
            },
            modes: raw_modes,
            active,
            fail_modes: false,
        });
        if self.main.is_none() {
            self.main = Some(DisplayId(id));
        }
        self
    }

    pub fn without_main(mut self) -> Self {
        self.main = None;
        self
    }

    pub fn with_main(mut self, id: u32) -> Self {
        self.main = Some(DisplayId(id));
        self
    }

    /// Make mode listing fail for one display
    pub fn failing_modes(self, id: u32) -> Self {
        for display in self.displays.borrow_mut().iter_mut() {
            if display.raw.id == DisplayId(id) {
                display.fail_modes = true;
            }
        }
        self
    }

    pub fn reject_apply(&self, reject: bool) {
        self.reject_apply.set(reject);
    }

    pub fn signal_change(&self) {
        self.pending_change.set(true);
    }

    pub fn active_mode(&self, id: u32) -> Option<u32> {
        self.displays
            .borrow()
            .iter()
            .find(|d| d.raw.id == DisplayId(id))
            .and_then(|d| d.active)
    }
}

impl DisplayBackend for FakeBackend {
    fn displays(&self) -> Result<Vec<RawDisplay>> {
        Ok(self.displays.borrow().iter().map(|d| d.raw.clone()).collect())
    }

    fn modes(&self, display: DisplayId) -> Result<Vec<RawMode>> {
        let displays = self.displays.borrow();
        match displays.iter().find(|d| d.raw.id == display) {
            Some(d) if d.fail_modes => bail!("mode query failed"),
            Some(d) => Ok(d.modes.clone()),
            None => bail!("unknown display {}", display.0),
        }
    }

    fn active_mode_id(&self, display: DisplayId) -> Result<Option<u32>> {
        Ok(self
            .displays
            .borrow()
            .iter()
            .find(|d| d.raw.id == display)
            .and_then(|d| d.active))
    }

    fn main_display(&self) -> Result<Option<DisplayId>> {
        Ok(self.main)
    }

    fn apply_mode(&self, display: DisplayId, mode: &ModeHandle) -> Result<()> {
        self.applied.borrow_mut().push((display, mode.native_id()));
        if self.reject_apply.get() {
            bail!("mode rejected");
        }
        let mut displays = self.displays.borrow_mut();
        let Some(target) = displays.iter_mut().find(|d| d.raw.id == display) else {
            bail!("unknown display {}", display.0);
        };
        if !target.modes.iter().any(|m| m.native_id == mode.native_id()) {
            bail!("mode {} not supported", mode.native_id());
        }
        target.active = Some(mode.native_id());
        Ok(())
    }

    fn poll_changes(&self) -> Result<bool> {
        Ok(self.pending_change.replace(false))
    }
}

/// Lets a test keep a handle on the fake after boxing it into a service
impl DisplayBackend for Rc<FakeBackend> {
    fn displays(&self) -> Result<Vec<RawDisplay>> {
        (**self).displays()
    }

    fn modes(&self, display: DisplayId) -> Result<Vec<RawMode>> {
        (**self).modes(display)
    }

    fn active_mode_id(&self, display: DisplayId) -> Result<Option<u32>> {
        (**self).active_mode_id(display)
    }

    fn main_display(&self) -> Result<Option<DisplayId>> {
        (**self).main_display()
    }

    fn apply_mode(&self, display: DisplayId, mode: &ModeHandle) -> Result<()> {
        (**self).apply_mode(display, mode)
    }

    fn poll_changes(&self) -> Result<bool> {
        (**self).poll_changes()
    }
}
