use crate::core::{
    assembler::{assemble, degraded_sources},
    filters::filter_candidates,
    normalizer::normalize,
    ranker::{clamp_top_n, rank},
    scoring::score_candidates,
};
use crate::models::{DegradedSource, Neighborhood, RecommendationQuery, ScoredResult};

/// Default upper bound on results per request
pub const DEFAULT_MAX_TOP_N: usize = 50;

/// Result of one pass through the recommendation pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub results: Vec<ScoredResult>,
    /// Neighborhoods that survived the hard constraints
    pub candidates_considered: usize,
    /// Effective result count after clamping
    pub top_n: usize,
    pub degraded_sources: Vec<DegradedSource>,
}

/// Recommendation pipeline orchestrator
///
/// # Pipeline Stages
/// 1. Hard-constraint filtering (budget, travel distance, city)
/// 2. Per-factor normalization across the surviving candidates
/// 3. Weighted scoring
/// 4. Deterministic ranking and top-N truncation
/// 5. Result assembly with raw breakdowns
///
/// Pure: the same snapshot and query always produce the same output.
#[derive(Debug, Clone)]
pub struct Recommender {
    max_top_n: usize,
}

impl Recommender {
    pub fn new(max_top_n: usize) -> Self {
        Self {
            max_top_n: max_top_n.max(1),
        }
    }

    pub fn with_default_limits() -> Self {
        Self::new(DEFAULT_MAX_TOP_N)
    }

    pub fn max_top_n(&self) -> usize {
        self.max_top_n
    }

    /// Rank a city's neighborhoods for a validated query
    pub fn recommend(&self, neighborhoods: &[Neighborhood], query: &RecommendationQuery) -> Recommendation {
        let top_n = clamp_top_n(query.top_n, self.max_top_n);

        // Stage 1: Hard constraints
        let mut candidates = filter_candidates(neighborhoods, &query.constraint);
        let candidates_considered = candidates.len();

        tracing::debug!(
            "{} of {} neighborhoods in {} passed constraints",
            candidates_considered,
            neighborhoods.len(),
            query.constraint.city
        );

        if candidates.is_empty() {
            return Recommendation {
                results: Vec::new(),
                candidates_considered,
                top_n,
                degraded_sources: Vec::new(),
            };
        }

        // Stage 2 & 3: Normalize and score
        let ranges = normalize(&mut candidates);
        tracing::trace!("Factor ranges: {:?}", ranges);
        score_candidates(&mut candidates, &query.weights);

        // Stage 4 & 5: Rank and assemble
        let ranked = rank(candidates, top_n);

        Recommendation {
            results: assemble(&ranked),
            candidates_considered,
            top_n,
            degraded_sources: degraded_sources(&ranked),
        }
    }
}

impl Default for Recommender {
    fn default() -> Self {
        Self::with_default_limits()
    }
}
