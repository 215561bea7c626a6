use crate::core::candidate::Candidate;
use crate::models::{Direction, Factor, FactorMap};

/// Direction-corrected desirability of one factor for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Desirability {
    /// Value in [0,1], higher is better
    Known(f64),
    /// Raw value missing; excluded from the weighted average
    #[default]
    Unknown,
}

impl Desirability {
    pub const NEUTRAL: f64 = 0.5;

    /// Numeric value for display; unknown factors report the neutral score.
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            Desirability::Known(value) => value,
            Desirability::Unknown => Self::NEUTRAL,
        }
    }

    #[inline]
    pub fn is_known(self) -> bool {
        matches!(self, Desirability::Known(_))
    }
}

/// Min/max of a factor's known raw values across the candidate set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorRange {
    pub min: f64,
    pub max: f64,
}

impl FactorRange {
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values.into_iter().fold(None, |range, value| match range {
            None => Some(FactorRange { min: value, max: value }),
            Some(FactorRange { min, max }) => Some(FactorRange {
                min: min.min(value),
                max: max.max(value),
            }),
        })
    }

    /// Map a raw value onto [0,1] desirability
    ///
    /// With zero variance every value gets 1.0: a metric that is the same for
    /// all candidates must not penalize any of them.
    pub fn desirability(&self, raw: f64, direction: Direction) -> f64 {
        if self.max <= self.min {
            return 1.0;
        }
        let normalized = ((raw - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        match direction {
            Direction::LowerIsBetter => 1.0 - normalized,
            Direction::HigherIsBetter => normalized,
        }
    }
}

/// Normalize every factor of every candidate in place.
///
/// Ranges are computed over this candidate set only, so scores are relative to
/// the neighborhoods that survived filtering. Returns the per-factor ranges
/// (`None` when no candidate had a known value).
pub fn normalize(candidates: &mut [Candidate<'_>]) -> FactorMap<Option<FactorRange>> {
    let ranges = FactorMap::from_fn(|factor| {
        FactorRange::of(candidates.iter().filter_map(|c| c.raw[factor]))
    });

    for candidate in candidates.iter_mut() {
        for factor in Factor::ALL {
            candidate.desirability[factor] = match (candidate.raw[factor], ranges[factor]) {
                (Some(raw), Some(range)) => {
                    Desirability::Known(range.desirability(raw, factor.direction()))
                }
                _ => Desirability::Unknown,
            };
        }
    }

    ranges
}
