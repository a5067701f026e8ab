//! Favorites text validation with auto-correction
//!
//! Input is one favorite per line in the structured `width,height,refresh,hidpi`
//! form. Missing fields are filled in, duplicates dropped, and every surviving
//! line is annotated so a settings editor can render it without re-parsing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::validation::{DEFAULT_DENSITY_DOUBLED, DEFAULT_REFRESH_RATE};
use crate::modes::parser::{parse_flag, parse_refresh_rate};
use crate::types::FavoriteEntry;

/// Per-line outcome, presentation-free
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStatus {
    Ok,
    /// Line could not be parsed and is echoed unchanged
    Warning(String),
    /// Parsed, but no connected display supports it
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedLine {
    pub text: String,
    pub status: LineStatus,
}

/// Summary status; higher variants mask lower ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    Warnings,
    Corrected,
    Clean,
}

impl ValidationStatus {
    pub fn message(self) -> &'static str {
        match self {
            Self::Warnings => "Some lines could not be read and were left unchanged",
            Self::Corrected => "Favorites were corrected: missing values filled in or duplicates removed",
            Self::Clean => "All favorites are valid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub lines: Vec<ValidatedLine>,
    /// Parsed favorites in line order, unavailable ones included
    pub entries: Vec<FavoriteEntry>,
    pub has_warnings: bool,
    pub corrections_made: bool,
    pub duplicates_removed: bool,
    pub has_unavailable: bool,
    pub status: ValidationStatus,
    pub status_message: String,
}

impl ValidationResult {
    pub fn corrected_lines(&self) -> Vec<String> {
        self.lines.iter().map(|line| line.text.clone()).collect()
    }

    pub fn corrected_text(&self) -> String {
        self.corrected_lines().join("\n")
    }
}

enum ParsedLine {
    Entry { entry: FavoriteEntry, corrected: bool },
    Malformed(&'static str),
}

pub fn validate(text: &str, known_mode_keys: &HashSet<String>) -> ValidationResult {
    let mut lines = Vec::new();
    let mut entries = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut has_warnings = false;
    let mut corrections_made = false;
    let mut duplicates_removed = false;
    let mut has_unavailable = false;

    for raw in text.lines() {
        if raw.trim().is_empty() {
            continue;
        }

        let (entry, corrected) = match parse_line(raw) {
            ParsedLine::Malformed(reason) => {
                has_warnings = true;
                lines.push(ValidatedLine {
                    text: raw.to_string(),
                    status: LineStatus::Warning(reason.to_string()),
                });
                continue;
            }
            ParsedLine::Entry { entry, corrected } => (entry, corrected),
        };
        corrections_made |= corrected;

        let canonical = entry.to_string();
        if !seen.insert(canonical.clone()) {
            duplicates_removed = true;
            corrections_made = true;
            continue;
        }

        let status = if known_mode_keys.contains(&canonical) {
            LineStatus::Ok
        } else {
            has_unavailable = true;
            LineStatus::Unavailable
        };
        lines.push(ValidatedLine {
            text: canonical,
            status,
        });
        entries.push(entry);
    }

    let status = if has_warnings {
        ValidationStatus::Warnings
    } else if corrections_made {
        ValidationStatus::Corrected
    } else {
        ValidationStatus::Clean
    };

    ValidationResult {
        lines,
        entries,
        has_warnings,
        corrections_made,
        duplicates_removed,
        has_unavailable,
        status,
        status_message: status.message().to_string(),
    }
}

fn parse_line(raw: &str) -> ParsedLine {
    let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
    if fields.len() < 2 {
        return ParsedLine::Malformed("expected width,height[,refresh[,hidpi]]");
    }

    let (Ok(width), Ok(height)) = (fields[0].parse::<u32>(), fields[1].parse::<u32>()) else {
        return ParsedLine::Malformed("width and height must be whole numbers");
    };

    // Extra fields are discarded
    let mut corrected = fields.len() > 4;

    let refresh_rate_hz = match fields.get(2).and_then(|raw| parse_refresh_rate(raw)) {
        Some(rate) => rate.round(),
        None => {
            corrected = true;
            DEFAULT_REFRESH_RATE
        }
    };
    let density_doubled = match fields.get(3).and_then(|raw| parse_flag(raw)) {
        Some(flag) => flag,
        None => {
            corrected = true;
            DEFAULT_DENSITY_DOUBLED
        }
    };

    ParsedLine::Entry {
        entry: FavoriteEntry::new(width, height, refresh_rate_hz, density_doubled),
        corrected,
    }
}
