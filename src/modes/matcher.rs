//! Best-match selection of a supported mode for an under-specified request

use crate::constants::scoring;
use crate::types::{ModeDescriptor, ResolutionSpec};

/// Score of `candidate` against `spec`; lower is better.
///
/// Resolution distance dominates, then the density preference, then refresh
/// rate (closeness to the requested rate, or higher-is-better when open).
pub fn score(spec: &ResolutionSpec, candidate: &ModeDescriptor) -> f64 {
    let dw = f64::from(spec.width) - f64::from(candidate.width);
    let dh = f64::from(spec.height) - f64::from(candidate.height);
    let resolution = (dw * dw + dh * dh).sqrt() * scoring::RESOLUTION_WEIGHT;

    let wanted_density = spec
        .density_doubled
        .unwrap_or(scoring::PREFER_DENSITY_DOUBLED);
    let density = if candidate.density_doubled == wanted_density {
        0.0
    } else {
        scoring::DENSITY_PENALTY
    };

    let refresh = match spec.refresh_rate_hz {
        Some(target) => (target - candidate.refresh_rate_hz).abs() * scoring::REFRESH_WEIGHT,
        None => scoring::REFRESH_CEILING - candidate.refresh_rate_hz,
    };

    resolution + density + refresh
}

/// Lowest-scoring candidate; ties go to the earliest in catalog order
pub fn best_match<'a>(
    spec: &ResolutionSpec,
    candidates: &'a [ModeDescriptor],
) -> Option<&'a ModeDescriptor> {
    let mut best: Option<(&ModeDescriptor, f64)> = None;
    for candidate in candidates {
        let candidate_score = score(spec, candidate);
        if best.is_none_or(|(_, best_score)| candidate_score < best_score) {
            best = Some((candidate, candidate_score));
        }
    }
    best.map(|(mode, _)| mode)
}
