use tracing::{error, info};

use crate::platform::DisplayBackend;
use crate::types::{DisplayIdentity, ModeDescriptor};

/// Applies a mode to a display; one attempt, no retry, no rollback
pub struct ModeSwitcher<'a> {
    backend: &'a dyn DisplayBackend,
}

impl<'a> ModeSwitcher<'a> {
    pub fn new(backend: &'a dyn DisplayBackend) -> Self {
        Self { backend }
    }

    /// True when the platform accepted the mode. The catalog is stale afterwards.
    pub fn apply(&self, mode: &ModeDescriptor, target: &DisplayIdentity) -> bool {
        let name = &target.name;
        match self.backend.apply_mode(target.id, &mode.handle) {
            Ok(()) => {
                info!(display = %name, mode = %mode, "Applied display mode");
                true
            }
            Err(e) => {
                error!(display = %name, mode = %mode, error = ?e, "Platform rejected display mode");
                false
            }
        }
    }
}
