//! Preview size negotiation.

use crate::camera::types::{Resolution, TargetSpec};

/// Maximum absolute difference between a candidate's aspect ratio and the
/// target's for the candidate to count as a ratio match.
pub const ASPECT_TOLERANCE: f64 = 0.1;

/// Upper bound (both axes) for the largest-area fallback.
pub const SQUARE_FALLBACK_BOUND: u32 = 640;

/// Pick the best preview size for `target` from the device's candidates.
///
/// Preference order:
/// 1. ratio within [`ASPECT_TOLERANCE`], height closest to the target;
/// 2. height closest to the target, ignoring ratio;
/// 3. largest area within [`SQUARE_FALLBACK_BOUND`] on both axes.
///
/// Ties keep the earliest candidate. Returns `None` for an empty slice, in
/// which case the caller keeps the target size as-is.
pub fn select_preview_size(candidates: &[Resolution], target: &TargetSpec) -> Option<Resolution> {
    if candidates.is_empty() {
        return None;
    }

    let target_ratio = target.aspect_ratio();
    let ratio_matches = candidates
        .iter()
        .filter(|c| (c.aspect_ratio() - target_ratio).abs() <= ASPECT_TOLERANCE);

    closest_height(ratio_matches, target.height)
        .or_else(|| closest_height(candidates.iter(), target.height))
        .or_else(|| largest_within(candidates, SQUARE_FALLBACK_BOUND))
}

/// First candidate whose height is nearest `height`.
fn closest_height<'a>(
    candidates: impl Iterator<Item = &'a Resolution>,
    height: u32,
) -> Option<Resolution> {
    // min_by_key keeps the first of equal minima
    candidates
        .min_by_key(|c| c.height.abs_diff(height))
        .copied()
}

/// Largest-area candidate with both sides at most `bound`; first seen wins ties.
pub fn largest_within(candidates: &[Resolution], bound: u32) -> Option<Resolution> {
    let mut best: Option<Resolution> = None;
    for c in candidates {
        if c.width > bound || c.height > bound {
            continue;
        }
        let better = match best {
            Some(b) => c.area() > b.area(),
            None => true,
        };
        if better {
            best = Some(*c);
        }
    }
    best
}
