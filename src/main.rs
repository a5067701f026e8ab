#![forbid(unsafe_code)]

mod config;
mod constants;
mod daemon;
mod error;
mod favorites;
mod ipc;
mod modes;
mod platform;
mod service;
mod types;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{Level as TraceLevel, debug};
use tracing_subscriber::FmtSubscriber;

use config::{PreferencesSnapshot, PreferencesStore};
use favorites::{LineStatus, ValidationResult};
use ipc::{DaemonClient, DaemonRequest, DaemonResponse, DisplaySummary, ModeSummary, PreferenceUpdate};
use platform::RandrBackend;
use service::ModeService;

/// Switch display modes by resolution request, with favorites and restore
#[derive(Parser, Debug)]
#[command(name = "res-switcher", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run in the background: restore last used modes, follow hot-plug, serve requests
    Daemon,

    /// Apply the best matching mode, e.g. `2560,1440,60,true` or `1920x1080@60`
    Set {
        spec: String,
        /// Display name (defaults to the main display)
        #[arg(short, long)]
        display: Option<String>,
    },

    /// List the modes shown for each display
    List {
        #[arg(short, long)]
        display: Option<String>,
    },

    /// Re-apply the last used mode on every display that still offers it
    Restore,

    /// Re-enumerate displays in the running daemon
    Refresh,

    /// Stop the running daemon
    Stop,

    /// Favorites management
    Favorites {
        #[command(subcommand)]
        command: FavoritesCommands,
    },

    /// Preferences
    Prefs {
        #[command(subcommand)]
        command: PrefsCommands,
    },
}

#[derive(Subcommand, Debug)]
enum FavoritesCommands {
    /// Print the saved favorites in editable form
    Show,
    /// Check favorites text without saving (`-` reads stdin)
    Validate {
        file: PathBuf,
        /// Print only the corrected text, ready for `favorites set -`
        #[arg(long)]
        corrected: bool,
    },
    /// Validate and save favorites text (`-` reads stdin)
    Set { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum PrefsCommands {
    Show,
    /// Hide modes below this refresh rate (Hz)
    MinRefresh { hz: f64 },
    /// Show non-HiDPI duplicates of HiDPI modes
    ShowLowRes {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    StartAtLogin {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

/// Where requests are executed: the running daemon, or an engine built here
enum Session {
    Remote(DaemonClient),
    Local(Box<ModeService>),
}

impl Session {
    fn open() -> Result<Self> {
        match DaemonClient::connect() {
            Ok(client) => {
                debug!("Connected to daemon");
                Ok(Self::Remote(client))
            }
            Err(e) => {
                debug!(error = ?e, "Daemon not reachable, running in-process");
                let backend = RandrBackend::connect().context("Failed to initialize RandR backend")?;
                let prefs = PreferencesStore::open_default()?;
                Ok(Self::Local(Box::new(ModeService::new(Box::new(backend), prefs))))
            }
        }
    }

    fn request(&mut self, request: DaemonRequest) -> Result<DaemonResponse> {
        let response = match self {
            Self::Remote(client) => client.request(request)?,
            Self::Local(service) => daemon::handle_request(service, request),
        };
        match response {
            DaemonResponse::Error(message) => bail!(message),
            response => Ok(response),
        }
    }
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let cli = Cli::parse();
    run_command(cli.command)
}

fn stop_daemon() -> Result<()> {
    let mut client = DaemonClient::connect().context("Daemon is not running")?;
    client.request(DaemonRequest::Shutdown)?;
    println!("Daemon stopped");
    Ok(())
}

fn run_command(command: Commands) -> Result<()> {
    let mut session = match command {
        Commands::Daemon => return daemon::run_daemon(),
        Commands::Stop => return stop_daemon(),
        _ => Session::open()?,
    };

    match command {
        Commands::Set { spec, display } => {
            if let DaemonResponse::ModeSet(message) =
                session.request(DaemonRequest::SetMode { spec, display })?
            {
                println!("{message}");
            }
        }
        Commands::List { display } => {
            if let DaemonResponse::Modes(displays) =
                session.request(DaemonRequest::ListModes { display })?
            {
                print_modes(&displays);
            }
        }
        Commands::Restore => {
            if let DaemonResponse::Restored(count) = session.request(DaemonRequest::Restore)? {
                println!("Restored {count} display(s)");
            }
        }
        Commands::Refresh => {
            session.request(DaemonRequest::Refresh)?;
            println!("Displays re-enumerated");
        }
        Commands::Favorites { command } => run_favorites(&mut session, command)?,
        Commands::Prefs { command } => run_prefs(&mut session, command)?,
        Commands::Daemon | Commands::Stop => {}
    }
    Ok(())
}

fn run_favorites(session: &mut Session, command: FavoritesCommands) -> Result<()> {
    match command {
        FavoritesCommands::Show => {
            if let DaemonResponse::Preferences(prefs) = session.request(DaemonRequest::GetPreferences)? {
                for favorite in &prefs.favorites {
                    println!("{favorite}");
                }
            }
        }
        FavoritesCommands::Validate { file, corrected } => {
            let text = read_input(&file)?;
            if let DaemonResponse::Validation(result) =
                session.request(DaemonRequest::ValidateFavorites(text))?
            {
                if corrected {
                    println!("{}", result.corrected_text());
                } else {
                    print_validation(&result);
                }
            }
        }
        FavoritesCommands::Set { file } => {
            let text = read_input(&file)?;
            if let DaemonResponse::Validation(result) =
                session.request(DaemonRequest::SetFavorites(text))?
            {
                print_validation(&result);
                if result.has_warnings {
                    bail!("Favorites not saved");
                }
                println!("Saved {} favorite(s)", result.entries.len());
            }
        }
    }
    Ok(())
}

fn run_prefs(session: &mut Session, command: PrefsCommands) -> Result<()> {
    let request = match command {
        PrefsCommands::Show => DaemonRequest::GetPreferences,
        PrefsCommands::MinRefresh { hz } => {
            DaemonRequest::SetPreference(PreferenceUpdate::MinRefreshRate(hz))
        }
        PrefsCommands::ShowLowRes { enabled } => {
            DaemonRequest::SetPreference(PreferenceUpdate::ShowLowResolution(enabled))
        }
        PrefsCommands::StartAtLogin { enabled } => {
            DaemonRequest::SetPreference(PreferenceUpdate::StartAtLogin(enabled))
        }
    };
    if let DaemonResponse::Preferences(prefs) = session.request(request)? {
        print_preferences(&prefs);
    }
    Ok(())
}

fn read_input(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read favorites from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(file).context(format!("Failed to read {}", file.display()))
}

fn format_mode(mode: &ModeSummary) -> String {
    format!(
        "{} {}x{} @ {:.2}Hz{}{}",
        if mode.is_current { "*" } else { " " },
        mode.width,
        mode.height,
        mode.refresh_rate_hz,
        if mode.density_doubled { " (HiDPI)" } else { "" },
        if mode.is_favorite { " [fav]" } else { "" },
    )
}

fn print_modes(displays: &[DisplaySummary]) {
    for display in displays {
        match &display.current {
            Some(current) => println!(
                "{} (current: {}x{} @ {:.2}Hz):",
                display.name, current.width, current.height, current.refresh_rate_hz
            ),
            None => println!("{}:", display.name),
        }
        if display.modes.is_empty() {
            println!("    No modes available");
            continue;
        }
        for mode in &display.modes {
            println!("  {}", format_mode(mode));
        }
        if !display.favorites.is_empty() {
            println!("  Favorites:");
            for mode in &display.favorites {
                println!("    {}", format_mode(mode));
            }
        }
    }
}

fn print_validation(result: &ValidationResult) {
    for line in &result.lines {
        match &line.status {
            LineStatus::Ok => println!("  {}", line.text),
            LineStatus::Unavailable => println!("? {}  (not supported by any connected display)", line.text),
            LineStatus::Warning(reason) => println!("! {}  ({reason})", line.text),
        }
    }
    println!("{}", result.status_message);
}

fn print_preferences(prefs: &PreferencesSnapshot) {
    println!("min_refresh_rate: {}", prefs.min_refresh_rate);
    println!("show_low_resolution: {}", prefs.show_low_resolution);
    println!("start_at_login: {}", prefs.start_at_login);
    println!("favorites: {}", prefs.favorites.len());
    for (display, entry) in &prefs.last_used {
        println!("last_used[{display}]: {entry}");
    }
}
