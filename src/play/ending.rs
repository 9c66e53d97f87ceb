//! Score-to-ending resolution.

use crate::story::EndingTier;

/// Minimum percentage of the maximum score for the Good ending (inclusive).
pub const GOOD_THRESHOLD_PCT: i64 = 80;

/// Minimum percentage of the maximum score for the Neutral ending (inclusive).
pub const NEUTRAL_THRESHOLD_PCT: i64 = 40;

/// Resolve the ending tier for a final score.
///
/// Total function: a zero (or negative) max score counts as 0% and routes to
/// the worst tier. Thresholds are inclusive lower bounds, compared with
/// integer cross-multiplication so the boundaries are exact.
pub fn resolve_ending(score: i64, max_score: i64) -> EndingTier {
    if max_score <= 0 {
        return EndingTier::Bad;
    }

    if score * 100 >= max_score * GOOD_THRESHOLD_PCT {
        EndingTier::Good
    } else if score * 100 >= max_score * NEUTRAL_THRESHOLD_PCT {
        EndingTier::Neutral
    } else {
        EndingTier::Bad
    }
}
