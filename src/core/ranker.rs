use std::cmp::Ordering;

use crate::core::candidate::Candidate;

/// Scores are compared at 4-decimal precision.
pub const SCORE_PRECISION: f64 = 10_000.0;

/// Integer ranking key for a score, so near-identical floats tie exactly
#[inline]
pub fn score_key(score: f64) -> i64 {
    (score * SCORE_PRECISION).round() as i64
}

/// Round a score to the precision it is ranked at
#[inline]
pub fn round_score(score: f64) -> f64 {
    score_key(score) as f64 / SCORE_PRECISION
}

/// Ranking order: higher score, then lower total monthly cost, then lower id.
pub fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    score_key(b.score)
        .cmp(&score_key(a.score))
        .then_with(|| a.total_monthly_cost.total_cmp(&b.total_monthly_cost))
        .then_with(|| a.neighborhood.id.cmp(&b.neighborhood.id))
}

/// Order candidates and keep the best `top_n`
pub fn rank<'a>(mut candidates: Vec<Candidate<'a>>, top_n: usize) -> Vec<Candidate<'a>> {
    candidates.sort_by(compare_candidates);
    candidates.truncate(top_n);
    candidates
}

/// Clamp a requested result count to `[1, max_top_n]`
#[inline]
pub fn clamp_top_n(requested: usize, max_top_n: usize) -> usize {
    requested.clamp(1, max_top_n.max(1))
}
