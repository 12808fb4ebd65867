//! Least outstanding requests selection.

use crate::load_balancer::backend::Backend;

/// Pick the healthy backend with the fewest outstanding requests.
///
/// Returns the index into `backends`, or `None` when nothing is healthy.
/// Ties go to the earliest registered backend, so the same snapshot always
/// yields the same answer.
pub fn select(backends: &[Backend]) -> Option<usize> {
    backends
        .iter()
        .enumerate()
        .filter(|(_, b)| b.healthy)
        // min_by_key keeps the first of equal minimums
        .min_by_key(|(_, b)| b.outstanding)
        .map(|(idx, _)| idx)
}
