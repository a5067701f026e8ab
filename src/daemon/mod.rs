//! Background daemon: owns the mode engine, restores modes at startup, follows
//! hot-plug events and serves CLI requests over IPC

mod ipc_handler;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::PreferencesStore;
use crate::constants::daemon::POLL_INTERVAL_MS;
use crate::error::ModeError;
use crate::ipc::{DaemonRequest, DaemonResponse, DaemonServer, DisplaySummary, PreferenceUpdate};
use crate::platform::RandrBackend;
use crate::service::ModeService;

use ipc_handler::{IpcJob, spawn_ipc_listener};

pub fn run_daemon() -> Result<()> {
    let backend = RandrBackend::connect().context("Failed to initialize RandR backend")?;
    let prefs = PreferencesStore::open_default()?;
    let mut service = ModeService::new(Box::new(backend), prefs);
    info!(
        displays = service.snapshot().displays.len(),
        "Mode engine initialized"
    );

    let restored = service.restore_last_used();
    info!(restored = restored, "Startup restore complete");

    let server = DaemonServer::bind().context("Failed to start IPC server")?;
    info!(socket = %server.path().display(), "IPC server listening");
    let (job_tx, job_rx) = mpsc::channel::<IpcJob>();
    let _ipc_handle = spawn_ipc_listener(server.acceptor()?, job_tx);

    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&shutdown))
                .context(format!("Failed to register handler for signal {signal}"))?;
        }
    }

    info!("Daemon running");
    let poll_interval = Duration::from_millis(POLL_INTERVAL_MS);

    while !shutdown.load(Ordering::Relaxed) {
        match job_rx.recv_timeout(poll_interval) {
            Ok(IpcJob { request, reply }) => {
                let stop = matches!(request, DaemonRequest::Shutdown);
                let response = handle_request(&mut service, request);
                if reply.send(response).is_err() {
                    warn!("IPC client went away before the reply was sent");
                }
                if stop {
                    info!("Shutdown requested via IPC");
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("IPC listener stopped, shutting down");
                break;
            }
        }

        service.poll_display_changes();
    }

    info!("Daemon stopped");
    drop(server);
    Ok(())
}

/// Execute one request against the engine. Also used in-process by the CLI.
pub fn handle_request(service: &mut ModeService, request: DaemonRequest) -> DaemonResponse {
    match request {
        DaemonRequest::SetMode { spec, display } => {
            match service.set_mode(&spec, display.as_deref()) {
                Ok(message) => DaemonResponse::ModeSet(message),
                Err(e) => DaemonResponse::Error(e.to_string()),
            }
        }

        DaemonRequest::ListModes { display } => {
            let menu = service.menu();
            match display.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                None => DaemonResponse::Modes(menu.displays.iter().map(DisplaySummary::from).collect()),
                Some(name) => match service.snapshot().find_by_name(name) {
                    Some(found) => DaemonResponse::Modes(
                        menu.display(&found.identity.name)
                            .map(DisplaySummary::from)
                            .into_iter()
                            .collect(),
                    ),
                    None => DaemonResponse::Error(
                        ModeError::DisplayNotFound(name.to_string()).to_string(),
                    ),
                },
            }
        }

        DaemonRequest::Refresh => {
            service.refresh();
            DaemonResponse::Ready
        }

        DaemonRequest::Restore => DaemonResponse::Restored(service.restore_last_used()),

        DaemonRequest::ValidateFavorites(text) => {
            DaemonResponse::Validation(service.validate_favorites(&text))
        }

        DaemonRequest::SetFavorites(text) => match service.save_favorites(&text) {
            Ok(result) => DaemonResponse::Validation(result),
            Err(e) => DaemonResponse::Error(format!("{e:#}")),
        },

        DaemonRequest::GetPreferences => DaemonResponse::Preferences(service.preferences()),

        DaemonRequest::SetPreference(update) => {
            let result = match update {
                PreferenceUpdate::MinRefreshRate(rate) => service.set_min_refresh_rate(rate),
                PreferenceUpdate::ShowLowResolution(show) => service.set_show_low_resolution(show),
                PreferenceUpdate::StartAtLogin(enabled) => service.set_start_at_login(enabled),
            };
            match result {
                Ok(()) => DaemonResponse::Preferences(service.preferences()),
                Err(e) => DaemonResponse::Error(format!("{e:#}")),
            }
        }

        DaemonRequest::Ping => DaemonResponse::Pong,

        DaemonRequest::Shutdown => DaemonResponse::Ready,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakeBackend;

    fn service() -> ModeService {
        let backend = FakeBackend::new()
            .with_display(1, "eDP-1", &[(1920, 1080, 60.0, true), (1280, 720, 60.0, true)], Some(0))
            .with_display(2, "HDMI-1", &[(2560, 1440, 144.0, false)], Some(0));
        ModeService::new(Box::new(backend), PreferencesStore::in_memory())
    }

    #[test]
    fn test_set_mode_request() {
        let mut service = service();
        let response = handle_request(
            &mut service,
            DaemonRequest::SetMode {
                spec: "1280x720".to_string(),
                display: None,
            },
        );
        assert!(matches!(response, DaemonResponse::ModeSet(ref m) if m.contains("1280x720")));

        let response = handle_request(
            &mut service,
            DaemonRequest::SetMode {
                spec: "nonsense".to_string(),
                display: None,
            },
        );
        assert!(matches!(response, DaemonResponse::Error(ref m) if m.contains("nonsense")));
    }

    #[test]
    fn test_list_modes_request() {
        let mut service = service();
        let DaemonResponse::Modes(all) =
            handle_request(&mut service, DaemonRequest::ListModes { display: None })
        else {
            panic!("expected modes");
        };
        assert_eq!(all.len(), 2);

        let DaemonResponse::Modes(one) = handle_request(
            &mut service,
            DaemonRequest::ListModes {
                display: Some("hdmi-1".to_string()),
            },
        ) else {
            panic!("expected modes");
        };
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].name, "HDMI-1");
        assert!(one[0].modes[0].is_current);
        assert_eq!(one[0].current.as_ref().map(|m| m.width), Some(2560));

        let missing = handle_request(
            &mut service,
            DaemonRequest::ListModes {
                display: Some("DP-3".to_string()),
            },
        );
        assert!(matches!(missing, DaemonResponse::Error(_)));
    }

    #[test]
    fn test_preference_requests() {
        let mut service = service();
        let response = handle_request(
            &mut service,
            DaemonRequest::SetPreference(PreferenceUpdate::MinRefreshRate(120.0)),
        );
        let DaemonResponse::Preferences(prefs) = response else {
            panic!("expected preferences");
        };
        assert_eq!(prefs.min_refresh_rate, 120.0);
        // eDP-1 keeps only its current mode
        assert_eq!(service.menu().displays[0].modes.len(), 1);
    }

    #[test]
    fn test_favorites_requests() {
        let mut service = service();
        let DaemonResponse::Validation(result) = handle_request(
            &mut service,
            DaemonRequest::SetFavorites("2560,1440,144,false\n1280,720".to_string()),
        ) else {
            panic!("expected validation");
        };
        assert!(result.corrections_made);
        assert!(result.has_unavailable);
        assert_eq!(service.preferences().favorites.len(), 2);
    }

    #[test]
    fn test_ping_and_shutdown() {
        let mut service = service();
        assert!(matches!(handle_request(&mut service, DaemonRequest::Ping), DaemonResponse::Pong));
        assert!(matches!(
            handle_request(&mut service, DaemonRequest::Shutdown),
            DaemonResponse::Ready
        ));
    }
}
