//! Start-at-login registration via XDG autostart entries

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::constants::paths;

pub trait LoginItemService {
    /// Register (true) or unregister (false) the process to start at login
    fn set_enabled(&self, enabled: bool) -> Result<()>;
}

/// Writes or removes `~/.config/autostart/res-switcher.desktop`
pub struct XdgAutostart {
    entry_path: PathBuf,
    exec: PathBuf,
}

impl XdgAutostart {
    pub fn new() -> Result<Self> {
        let exec = std::env::current_exe().context("Failed to resolve current executable path")?;
        let mut entry_path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        entry_path.push(paths::AUTOSTART_DIR);
        entry_path.push(paths::AUTOSTART_FILENAME);
        Ok(Self { entry_path, exec })
    }

    #[cfg(test)]
    pub fn with_paths(entry_path: PathBuf, exec: PathBuf) -> Self {
        Self { entry_path, exec }
    }

    fn desktop_entry(&self) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Resolution Switcher\n\
             Comment=Restore and switch display modes\n\
             Exec=\"{}\" daemon\n\
             Terminal=false\n\
             X-GNOME-Autostart-enabled=true\n",
            self.exec.display()
        )
    }
}

impl LoginItemService for XdgAutostart {
    fn set_enabled(&self, enabled: bool) -> Result<()> {
        if enabled {
            if let Some(parent) = self.entry_path.parent() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create autostart directory: {}", parent.display()))?;
            }
            fs::write(&self.entry_path, self.desktop_entry())
                .context(format!("Failed to write autostart entry {}", self.entry_path.display()))?;
            info!(path = %self.entry_path.display(), "Registered autostart entry");
        } else if self.entry_path.exists() {
            fs::remove_file(&self.entry_path)
                .context(format!("Failed to remove autostart entry {}", self.entry_path.display()))?;
            info!(path = %self.entry_path.display(), "Removed autostart entry");
        }
        Ok(())
    }
}
