//! Resolution request parsing
//!
//! Two grammars are accepted, tried in order:
//! - structured: `width,height[,refreshRate[,densityFlag]]`
//! - legacy: `WIDTHxHEIGHT[@REFRESH]`

use regex::Regex;
use std::sync::LazyLock;

use crate::types::ResolutionSpec;

static LEGACY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{3,5})\s*[xX]\s*(\d{3,5})\s*(?:@\s*(\d{1,3}(?:\.\d+)?))?\s*$").ok()
});

/// Parse a resolution request; `None` when neither grammar matches
pub fn parse_resolution(text: &str) -> Option<ResolutionSpec> {
    parse_structured(text).or_else(|| parse_legacy(text))
}

/// `width,height[,refreshRate[,densityFlag]]`, fields trimmed, trailing fields optional
pub fn parse_structured(text: &str) -> Option<ResolutionSpec> {
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.len() < 2 || fields.len() > 4 {
        return None;
    }

    let width = fields[0].parse::<u32>().ok()?;
    let height = fields[1].parse::<u32>().ok()?;

    let refresh_rate_hz = match fields.get(2) {
        None | Some(&"") => None,
        Some(raw) => Some(parse_refresh_rate(raw)?),
    };
    let density_doubled = match fields.get(3) {
        None | Some(&"") => None,
        Some(raw) => Some(parse_flag(raw)?),
    };

    Some(ResolutionSpec {
        width,
        height,
        refresh_rate_hz,
        density_doubled,
    })
}

/// `WIDTHxHEIGHT[@REFRESH]` with 3-5 digit dimensions
pub fn parse_legacy(text: &str) -> Option<ResolutionSpec> {
    let captures = LEGACY_PATTERN.as_ref()?.captures(text)?;
    let width = captures.get(1)?.as_str().parse::<u32>().ok()?;
    let height = captures.get(2)?.as_str().parse::<u32>().ok()?;
    let refresh_rate_hz = match captures.get(3) {
        Some(rate) => Some(rate.as_str().parse::<f64>().ok()?),
        None => None,
    };

    Some(ResolutionSpec {
        width,
        height,
        refresh_rate_hz,
        density_doubled: None,
    })
}

/// Finite, non-negative floating-point refresh rate
pub fn parse_refresh_rate(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|rate| rate.is_finite() && *rate >= 0.0)
}

/// Case-insensitive `true` / `false`
pub fn parse_flag(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_pattern_compiles() {
        assert!(LEGACY_PATTERN.is_some());
    }

    #[test]
    fn test_structured_full() {
        let spec = parse_resolution("2560,1440,60,true").unwrap();
        assert_eq!(spec.width, 2560);
        assert_eq!(spec.height, 1440);
        assert_eq!(spec.refresh_rate_hz, Some(60.0));
        assert_eq!(spec.density_doubled, Some(true));
    }

    #[test]
    fn test_structured_partial_leaves_fields_unset() {
        let spec = parse_resolution(" 1920 , 1080 ").unwrap();
        assert_eq!((spec.width, spec.height), (1920, 1080));
        assert_eq!(spec.refresh_rate_hz, None);
        assert_eq!(spec.density_doubled, None);

        let spec = parse_resolution("1920,1080,59.94").unwrap();
        assert_eq!(spec.refresh_rate_hz, Some(59.94));
        assert_eq!(spec.density_doubled, None);
    }

    #[test]
    fn test_structured_flag_case_insensitive() {
        assert_eq!(parse_resolution("1920,1080,60,FALSE").unwrap().density_doubled, Some(false));
        assert_eq!(parse_resolution("1920,1080,60,True").unwrap().density_doubled, Some(true));
        assert!(parse_resolution("1920,1080,60,yes").is_none());
    }

    #[test]
    fn test_legacy_formats() {
        let spec = parse_resolution("1920x1080@60").unwrap();
        assert_eq!((spec.width, spec.height), (1920, 1080));
        assert_eq!(spec.refresh_rate_hz, Some(60.0));
        assert_eq!(spec.density_doubled, None);

        let spec = parse_resolution("3840 X 2160").unwrap();
        assert_eq!((spec.width, spec.height), (3840, 2160));
        assert_eq!(spec.refresh_rate_hz, None);

        let spec = parse_resolution("1280x720@59.94").unwrap();
        assert_eq!(spec.refresh_rate_hz, Some(59.94));
    }

    #[test]
    fn test_legacy_digit_limits() {
        assert!(parse_resolution("64x48").is_none());
        assert!(parse_resolution("123456x1080").is_none());
        assert!(parse_resolution("1920x1080@1440").is_none());
    }

    #[test]
    fn test_rejected_inputs() {
        assert!(parse_resolution("abcx1080").is_none());
        assert!(parse_resolution("1920,abc").is_none());
        assert!(parse_resolution("1920").is_none());
        assert!(parse_resolution("").is_none());
        assert!(parse_resolution("1920,1080,fast").is_none());
        assert!(parse_resolution("1920,1080,inf").is_none());
        assert!(parse_resolution("1920,1080,60,true,extra").is_none());
    }
}
