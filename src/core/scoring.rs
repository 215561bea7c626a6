use crate::core::{candidate::Candidate, normalizer::Desirability};
use crate::models::{Factor, FactorMap, WeightVector};

/// Combine normalized factors into a single score in [0,1]
///
/// score = Σ (weight_f × desirability_f) / Σ weight_f
///
/// Both sums run only over factors with a known raw value, so a missing data
/// feed drops out of the average instead of counting as worst-case. With no
/// applicable weight the score is the neutral 0.5.
pub fn weighted_score(desirability: &FactorMap<Desirability>, weights: &WeightVector) -> f64 {
    let (weighted_sum, applied_weight) = Factor::ALL
        .iter()
        .filter_map(|&factor| match desirability[factor] {
            Desirability::Known(value) => Some((weights.weight(factor), value)),
            Desirability::Unknown => None,
        })
        .fold((0.0, 0.0), |(sum, total), (weight, value)| {
            (sum + weight * value, total + weight)
        });

    if applied_weight <= 0.0 {
        return Desirability::NEUTRAL;
    }

    let score = weighted_sum / applied_weight;
    if !score.is_finite() {
        return Desirability::NEUTRAL;
    }
    score.clamp(0.0, 1.0)
}

/// Score every candidate in place
pub fn score_candidates(candidates: &mut [Candidate<'_>], weights: &WeightVector) {
    for candidate in candidates.iter_mut() {
        candidate.score = weighted_score(&candidate.desirability, weights);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(Factor, f64)]) -> WeightVector {
        pairs
            .iter()
            .fold(WeightVector::zero(), |w, &(factor, value)| w.with(factor, value).unwrap())
    }

    #[test]
    fn test_weights_renormalized() {
        let mut d = FactorMap::splat(Desirability::Unknown);
        d[Factor::Rent] = Desirability::Known(1.0);
        d[Factor::Aqi] = Desirability::Known(0.0);

        // Weights sum to 4, not 1
        let w = weights(&[(Factor::Rent, 3.0), (Factor::Aqi, 1.0)]);
        assert!((weighted_score(&d, &w) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_factor_excluded_from_both_sums() {
        let mut d = FactorMap::splat(Desirability::Unknown);
        d[Factor::Rent] = Desirability::Known(0.8);

        let w = weights(&[(Factor::Rent, 0.5), (Factor::Aqi, 0.5)]);
        assert!((weighted_score(&d, &w) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_weights_is_neutral() {
        let d = FactorMap::splat(Desirability::Known(0.9));
        assert_eq!(weighted_score(&d, &WeightVector::zero()), 0.5);
    }

    #[test]
    fn test_all_unknown_is_neutral() {
        let d = FactorMap::splat(Desirability::Unknown);
        assert_eq!(weighted_score(&d, &WeightVector::default()), 0.5);
    }
}
