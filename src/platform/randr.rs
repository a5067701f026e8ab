//! X11 RandR implementation of [`DisplayBackend`]

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::randr::{
    self, ConnectionExt as RandrExt, GetScreenResourcesCurrentReply, ModeFlag, ModeInfo,
    NotifyMask,
};
use x11rb::protocol::xproto::{ConnectionExt as XprotoExt, Window};
use x11rb::rust_connection::RustConnection;

use super::{DisplayBackend, DisplayId, ModeHandle, RawDisplay, RawMode};

/// Minimum RandR version providing GetScreenResourcesCurrent and GetOutputPrimary
const RANDR_MIN_VERSION: (u32, u32) = (1, 3);

pub struct RandrBackend {
    conn: RustConnection,
    root: Window,
    /// Physical size of the root window at connect time, for DPI-preserving resizes
    root_mm: (u32, u32),
    root_px: (u16, u16),
}

impl RandrBackend {
    /// Connect to the X server and subscribe to display configuration changes
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 server")?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let root_mm = (
            u32::from(screen.width_in_millimeters),
            u32::from(screen.height_in_millimeters),
        );
        let root_px = (screen.width_in_pixels, screen.height_in_pixels);

        let version = conn
            .randr_query_version(RANDR_MIN_VERSION.0, RANDR_MIN_VERSION.1)
            .context("Failed to query RandR version")?
            .reply()
            .context("RandR extension not available on this X server")?;
        if (version.major_version, version.minor_version) < RANDR_MIN_VERSION {
            bail!(
                "RandR {}.{} is too old (need {}.{})",
                version.major_version,
                version.minor_version,
                RANDR_MIN_VERSION.0,
                RANDR_MIN_VERSION.1
            );
        }

        conn.randr_select_input(
            root,
            NotifyMask::SCREEN_CHANGE | NotifyMask::OUTPUT_CHANGE | NotifyMask::CRTC_CHANGE,
        )
        .context("Failed to subscribe to RandR notifications")?;
        conn.flush()
            .context("Failed to flush X11 connection after RandR setup")?;

        info!(
            screen = screen_num,
            randr_major = version.major_version,
            randr_minor = version.minor_version,
            "Connected to X11 with RandR"
        );

        Ok(Self {
            conn,
            root,
            root_mm,
            root_px,
        })
    }

    fn resources(&self) -> Result<GetScreenResourcesCurrentReply> {
        self.conn
            .randr_get_screen_resources_current(self.root)
            .context("Failed to query RandR screen resources")?
            .reply()
            .context("Failed to get reply for RandR screen resources")
    }

    fn output_info(
        &self,
        output: DisplayId,
        resources: &GetScreenResourcesCurrentReply,
    ) -> Result<randr::GetOutputInfoReply> {
        let output = output.0;
        self.conn
            .randr_get_output_info(output, resources.config_timestamp)
            .context(format!("Failed to query output info for output {output}"))?
            .reply()
            .context(format!("Failed to get output info reply for output {output}"))
    }

    fn crtc_info(
        &self,
        crtc: randr::Crtc,
        resources: &GetScreenResourcesCurrentReply,
    ) -> Result<randr::GetCrtcInfoReply> {
        self.conn
            .randr_get_crtc_info(crtc, resources.config_timestamp)
            .context(format!("Failed to query CRTC info for crtc {crtc}"))?
            .reply()
            .context(format!("Failed to get CRTC info reply for crtc {crtc}"))
    }

    /// Grow the root window when the new CRTC area would not fit in it
    fn ensure_screen_fits(&self, right: u32, bottom: u32) -> Result<()> {
        let geometry = self
            .conn
            .get_geometry(self.root)
            .context("Failed to query root window geometry")?
            .reply()
            .context("Failed to get root window geometry reply")?;
        let width = u32::from(geometry.width);
        let height = u32::from(geometry.height);
        if right <= width && bottom <= height {
            return Ok(());
        }

        let new_width = right.max(width);
        let new_height = bottom.max(height);
        let mm_width = scale_mm(self.root_mm.0, self.root_px.0, new_width);
        let mm_height = scale_mm(self.root_mm.1, self.root_px.1, new_height);
        debug!(
            width = new_width,
            height = new_height,
            mm_width,
            mm_height,
            "Growing screen to fit new mode"
        );
        let new_width = u16::try_from(new_width).context("Screen width exceeds X11 limits")?;
        let new_height = u16::try_from(new_height).context("Screen height exceeds X11 limits")?;
        self.conn
            .randr_set_screen_size(self.root, new_width, new_height, mm_width, mm_height)
            .context("Failed to resize screen")?
            .check()
            .context("X server rejected screen resize")?;
        Ok(())
    }

    /// Shrink the root window to the area the active CRTCs cover, as xrandr does
    fn shrink_screen_to_crtcs(&self) -> Result<()> {
        let resources = self.resources()?;
        let mut areas = Vec::with_capacity(resources.crtcs.len());
        for &crtc in &resources.crtcs {
            let info = self.crtc_info(crtc, &resources)?;
            if info.mode != x11rb::NONE {
                areas.push(CrtcArea {
                    x: info.x,
                    y: info.y,
                    width: info.width,
                    height: info.height,
                });
            }
        }
        let Some((width, height)) = bounding_box(&areas) else {
            return Ok(());
        };

        let geometry = self
            .conn
            .get_geometry(self.root)
            .context("Failed to query root window geometry")?
            .reply()
            .context("Failed to get root window geometry reply")?;
        let (current_width, current_height) = (u32::from(geometry.width), u32::from(geometry.height));
        if width >= current_width && height >= current_height {
            return Ok(());
        }

        let mm_width = scale_mm(self.root_mm.0, self.root_px.0, width);
        let mm_height = scale_mm(self.root_mm.1, self.root_px.1, height);
        debug!(width, height, mm_width, mm_height, "Shrinking screen to active CRTCs");
        let width = u16::try_from(width).context("Screen width exceeds X11 limits")?;
        let height = u16::try_from(height).context("Screen height exceeds X11 limits")?;
        self.conn
            .randr_set_screen_size(self.root, width, height, mm_width, mm_height)
            .context("Failed to resize screen")?
            .check()
            .context("X server rejected screen resize")?;
        Ok(())
    }
}

/// Position and size of one driven CRTC
#[derive(Debug, Clone, Copy)]
struct CrtcArea {
    x: i16,
    y: i16,
    width: u16,
    height: u16,
}

/// Smallest screen size, anchored at the origin, that holds every area.
/// None when no area has a size.
fn bounding_box(areas: &[CrtcArea]) -> Option<(u32, u32)> {
    areas
        .iter()
        .filter(|area| area.width > 0 && area.height > 0)
        .map(|area| {
            let right = i64::from(area.x) + i64::from(area.width);
            let bottom = i64::from(area.y) + i64::from(area.height);
            (
                u32::try_from(right.max(0)).unwrap_or(0),
                u32::try_from(bottom.max(0)).unwrap_or(0),
            )
        })
        .reduce(|(w1, h1), (w2, h2)| (w1.max(w2), h1.max(h2)))
        .filter(|&(width, height)| width > 0 && height > 0)
}

impl DisplayBackend for RandrBackend {
    fn displays(&self) -> Result<Vec<RawDisplay>> {
        let resources = self.resources()?;
        let mut displays = Vec::new();
        for &output in &resources.outputs {
            let info = self.output_info(DisplayId(output), &resources)?;
            // Connected but disabled outputs have no CRTC to drive
            if info.connection != randr::Connection::CONNECTED || info.crtc == x11rb::NONE {
                continue;
            }
            displays.push(RawDisplay {
                id: DisplayId(output),
                name: String::from_utf8_lossy(&info.name).into_owned(),
            });
        }
        debug!(count = displays.len(), "Enumerated RandR outputs");
        Ok(displays)
    }

    fn modes(&self, output: DisplayId) -> Result<Vec<RawMode>> {
        let resources = self.resources()?;
        let info = self.output_info(output, &resources)?;
        let modes = info
            .modes
            .iter()
            .filter_map(|id| resources.modes.iter().find(|m| m.id == *id))
            .map(raw_mode)
            .collect();
        Ok(modes)
    }

    fn active_mode_id(&self, output: DisplayId) -> Result<Option<u32>> {
        let resources = self.resources()?;
        let info = self.output_info(output, &resources)?;
        if info.crtc == x11rb::NONE {
            return Ok(None);
        }
        let crtc = self.crtc_info(info.crtc, &resources)?;
        Ok((crtc.mode != x11rb::NONE).then_some(crtc.mode))
    }

    fn main_display(&self) -> Result<Option<DisplayId>> {
        let primary = self
            .conn
            .randr_get_output_primary(self.root)
            .context("Failed to query primary output")?
            .reply()
            .context("Failed to get primary output reply")?
            .output;
        if primary != x11rb::NONE {
            return Ok(Some(DisplayId(primary)));
        }
        // No primary set: the first driven output is what the desktop treats as main
        Ok(self.displays()?.first().map(|d| d.id))
    }

    fn apply_mode(&self, target: DisplayId, mode: &ModeHandle) -> Result<()> {
        let output = target.0;
        let resources = self.resources()?;
        let info = self.output_info(target, &resources)?;
        if info.crtc == x11rb::NONE {
            bail!("Output {output} is not driven by any CRTC");
        }
        let crtc = self.crtc_info(info.crtc, &resources)?;
        let mode_id = mode.native_id();
        let mode_info = resources
            .modes
            .iter()
            .find(|m| m.id == mode_id)
            .context(format!("Mode {mode_id} no longer exists"))?;

        let x = u32::try_from(crtc.x.max(0)).unwrap_or(0);
        let y = u32::try_from(crtc.y.max(0)).unwrap_or(0);
        self.ensure_screen_fits(
            x + u32::from(mode_info.width),
            y + u32::from(mode_info.height),
        )?;

        let reply = self
            .conn
            .randr_set_crtc_config(
                info.crtc,
                x11rb::CURRENT_TIME,
                resources.config_timestamp,
                crtc.x,
                crtc.y,
                mode_id,
                crtc.rotation,
                &crtc.outputs,
            )
            .context(format!("Failed to send CRTC config for output {output}"))?
            .reply()
            .context(format!("Failed to get CRTC config reply for output {output}"))?;
        if reply.status != randr::SetConfig::SUCCESS {
            warn!(output = output, mode = mode_id, status = ?u8::from(reply.status), "CRTC config rejected");
            bail!("X server rejected mode {mode_id} for output {output}");
        }

        // The mode is already live, so a failed shrink is not an apply failure
        if let Err(e) = self.shrink_screen_to_crtcs() {
            warn!(output = output, error = ?e, "Failed to shrink screen to the active CRTCs");
        }
        self.conn
            .flush()
            .context("Failed to flush X11 connection after mode switch")?;
        Ok(())
    }

    fn poll_changes(&self) -> Result<bool> {
        let mut changed = false;
        while let Some(event) = self
            .conn
            .poll_for_event()
            .context("Failed to poll X11 events")?
        {
            match event {
                Event::RandrScreenChangeNotify(_) | Event::RandrNotify(_) => {
                    debug!("RandR configuration change notification");
                    changed = true;
                }
                _ => {}
            }
        }
        Ok(changed)
    }
}

fn raw_mode(mode: &ModeInfo) -> RawMode {
    RawMode {
        native_id: mode.id,
        width: u32::from(mode.width),
        height: u32::from(mode.height),
        // X11 draws 1:1, there is no separate backing store
        pixel_width: u32::from(mode.width),
        pixel_height: u32::from(mode.height),
        refresh_rate_hz: refresh_rate(
            mode.dot_clock,
            mode.htotal,
            mode.vtotal,
            u32::from(mode.mode_flags),
        ),
    }
}

/// Vertical refresh from mode timings, as xrandr computes it
fn refresh_rate(dot_clock: u32, htotal: u16, vtotal: u16, flags: u32) -> f64 {
    let mut vtotal = f64::from(vtotal);
    if flags & u32::from(ModeFlag::DOUBLE_SCAN) != 0 {
        vtotal *= 2.0;
    }
    if flags & u32::from(ModeFlag::INTERLACE) != 0 {
        vtotal /= 2.0;
    }
    let total = f64::from(htotal) * vtotal;
    if total == 0.0 {
        0.0
    } else {
        f64::from(dot_clock) / total
    }
}

/// Physical size for `new_px` pixels at the DPI of the original screen
fn scale_mm(orig_mm: u32, orig_px: u16, new_px: u32) -> u32 {
    if orig_px == 0 || orig_mm == 0 {
        return 0;
    }
    (u64::from(orig_mm) * u64::from(new_px) / u64::from(orig_px)) as u32
}
