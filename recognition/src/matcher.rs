//! Distance-threshold descriptor matcher.

use crate::descriptor::Descriptor;

/// Matches a probe descriptor against known (student id, descriptor) pairs.
///
/// A candidate matches when its Euclidean distance to the probe is at most
/// `tolerance`. When several candidates fall inside the threshold the closest
/// one wins; equal distances resolve to the earlier candidate in iteration
/// order, keeping the result deterministic.
pub fn match_descriptor(
    probe: &Descriptor,
    candidates: &[(i64, Descriptor)],
    tolerance: f64,
) -> Option<i64> {
    let mut best: Option<(i64, f64)> = None;
    for (student_id, descriptor) in candidates {
        let d = probe.distance(descriptor);
        if d > tolerance {
            continue;
        }
        match best {
            Some((_, best_d)) if best_d <= d => {}
            _ => best = Some((*student_id, d)),
        }
    }
    best.map(|(id, _)| id)
}
