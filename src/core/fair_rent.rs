use serde::Serialize;

/// A listing more than this far above the locality average is overpriced.
pub const OVERPRICED_THRESHOLD_PERCENT: f64 = 20.0;

const CONFIDENCE_WITH_AVERAGE: f64 = 0.6;
const CONFIDENCE_WITHOUT_AVERAGE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RentClassification {
    Fair,
    Overpriced,
}

/// Fairness verdict for a single listing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RentAssessment {
    pub classification: RentClassification,
    pub confidence: f64,
    pub rent_amount: f64,
    pub locality_avg_rent: Option<f64>,
    pub difference_percent: Option<f64>,
}

/// Classify a listing's rent against the locality's long-run average rent for
/// the same property type.
///
/// Without a usable average the listing is reported fair at low confidence.
pub fn classify_rent(rent_amount: f64, locality_avg_rent: Option<f64>) -> RentAssessment {
    let average = locality_avg_rent.filter(|avg| avg.is_finite() && *avg > 0.0);

    match average {
        Some(avg) => {
            let difference_percent = (rent_amount - avg) / avg * 100.0;
            let classification = if difference_percent > OVERPRICED_THRESHOLD_PERCENT {
                RentClassification::Overpriced
            } else {
                RentClassification::Fair
            };
            RentAssessment {
                classification,
                confidence: CONFIDENCE_WITH_AVERAGE,
                rent_amount,
                locality_avg_rent: Some(avg),
                difference_percent: Some(difference_percent),
            }
        }
        None => RentAssessment {
            classification: RentClassification::Fair,
            confidence: CONFIDENCE_WITHOUT_AVERAGE,
            rent_amount,
            locality_avg_rent: None,
            difference_percent: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overpriced_above_threshold() {
        let assessment = classify_rent(13000.0, Some(10000.0));
        assert_eq!(assessment.classification, RentClassification::Overpriced);
        assert!((assessment.difference_percent.unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_fair_at_threshold() {
        let assessment = classify_rent(12000.0, Some(10000.0));
        assert_eq!(assessment.classification, RentClassification::Fair);
        assert_eq!(assessment.confidence, 0.6);
    }

    #[test]
    fn test_no_average_is_fair_low_confidence() {
        let assessment = classify_rent(50000.0, None);
        assert_eq!(assessment.classification, RentClassification::Fair);
        assert_eq!(assessment.confidence, 0.5);

        let zero_avg = classify_rent(50000.0, Some(0.0));
        assert_eq!(zero_avg.locality_avg_rent, None);
    }
}
