use crate::core::{candidate::Candidate, ranker::round_score};
use crate::models::{
    AmenityBreakdown, AqiCategory, DegradedSource, RestaurantBreakdown, ScoredResult,
};

/// Package a ranked candidate with its raw-value breakdown
pub fn assemble_result(rank: usize, candidate: &Candidate<'_>) -> ScoredResult {
    let neighborhood = candidate.neighborhood;
    let metrics = &neighborhood.metrics;
    let restaurants = metrics.restaurants.unwrap_or_default();
    let amenities = metrics.amenities.unwrap_or_default();
    let aqi = metrics.aqi.filter(|v| v.is_finite());

    ScoredResult {
        rank,
        neighborhood_id: neighborhood.id,
        locality_id: neighborhood.locality_id,
        locality_name: neighborhood.name.clone(),
        city: neighborhood.city.clone(),
        score: round_score(candidate.score),
        rent: candidate.rent,
        grocery_cost: candidate.grocery_cost,
        grocery_stores_count: metrics.grocery_stores_count.unwrap_or(0),
        transport_cost: candidate.transport_cost,
        total_monthly_cost: candidate.total_monthly_cost,
        aqi,
        aqi_category: aqi.map(AqiCategory::from_aqi),
        hygiene_rating: restaurants.avg_rating,
        restaurants: RestaurantBreakdown {
            restaurants_count: restaurants.restaurants_count,
            highly_rated_restaurants: restaurants.highly_rated_count,
            avg_restaurant_rating: restaurants.avg_rating,
        },
        amenities: AmenityBreakdown {
            hospitals: amenities.hospitals,
            schools: amenities.schools,
            parks: amenities.parks,
            malls: amenities.malls,
        },
        amenities_score: metrics.amenities_score,
        connectivity_score: metrics.connectivity_score,
        delivery_services: metrics.delivery,
        travel_distance_km: candidate.travel_distance_km,
        latitude: neighborhood.latitude,
        longitude: neighborhood.longitude,
        normalized_scores: candidate.desirability.map(|_, d| round_score(d.value())),
    }
}

/// Assemble results in rank order, ranks starting at 1
pub fn assemble(ranked: &[Candidate<'_>]) -> Vec<ScoredResult> {
    ranked
        .iter()
        .enumerate()
        .map(|(index, candidate)| assemble_result(index + 1, candidate))
        .collect()
}

/// Sources recorded as failed for the given candidates, sorted and deduplicated
pub fn degraded_sources(ranked: &[Candidate<'_>]) -> Vec<DegradedSource> {
    let mut degraded: Vec<DegradedSource> = ranked
        .iter()
        .flat_map(|candidate| {
            let locality_id = candidate.neighborhood.locality_id;
            candidate
                .neighborhood
                .metrics
                .degraded_sources
                .iter()
                .map(move |&source| DegradedSource { locality_id, source })
        })
        .collect();
    degraded.sort();
    degraded.dedup();
    degraded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalizer::Desirability;
    use crate::models::{
        AmenityCounts, Constraint, Factor, Neighborhood, PropertyType, RawMetrics,
        RestaurantStats, SourceKind,
    };

    fn neighborhood() -> Neighborhood {
        Neighborhood {
            id: 11,
            locality_id: 4,
            name: "Arera Colony".to_string(),
            city: "Bhopal".to_string(),
            latitude: Some(23.21),
            longitude: Some(77.43),
            distance_to_center_km: Some(3.0),
            metrics: RawMetrics {
                grocery_cost_per_person: Some(2500.0),
                grocery_stores_count: Some(6),
                aqi: Some(142.0),
                restaurants: Some(RestaurantStats {
                    avg_rating: Some(4.1),
                    restaurants_count: 40,
                    highly_rated_count: 12,
                }),
                amenities: Some(AmenityCounts {
                    hospitals: 3,
                    schools: 5,
                    parks: 2,
                    malls: 1,
                    metro_stations: 0,
                    bus_stops: 8,
                }),
                degraded_sources: vec![SourceKind::Transport, SourceKind::Aqi],
                ..Default::default()
            },
        }
    }

    fn constraint() -> Constraint {
        Constraint {
            city: "Bhopal".to_string(),
            property_type: PropertyType::TwoBhk,
            max_budget: 30000.0,
            max_travel_distance_km: 10.0,
            number_of_people: 2,
            work_point: None,
        }
    }

    #[test]
    fn test_breakdown_uses_raw_values() {
        let n = neighborhood();
        let mut candidate = Candidate::new(&n, &constraint(), 18000.0, Some(3.0));
        candidate.score = 0.666_666;
        candidate.desirability[Factor::Rent] = Desirability::Known(0.25);

        let result = assemble_result(1, &candidate);

        assert_eq!(result.score, 0.6667);
        assert_eq!(result.rent, 18000.0);
        assert_eq!(result.grocery_cost, Some(5000.0));
        assert_eq!(result.transport_cost, None);
        assert_eq!(result.total_monthly_cost, 23000.0);
        assert_eq!(result.aqi_category, Some(AqiCategory::Moderate));
        assert_eq!(result.hygiene_rating, Some(4.1));
        assert_eq!(result.amenities.hospitals, 3);
        assert_eq!(result.grocery_stores_count, 6);
        assert_eq!(result.normalized_scores[Factor::Rent], 0.25);
        assert_eq!(result.normalized_scores[Factor::Connectivity], 0.5);
    }

    #[test]
    fn test_degraded_sources_collected() {
        let n = neighborhood();
        let candidate = Candidate::new(&n, &constraint(), 18000.0, None);

        let degraded = degraded_sources(&[candidate]);
        assert_eq!(
            degraded,
            vec![
                DegradedSource { locality_id: 4, source: SourceKind::Transport },
                DegradedSource { locality_id: 4, source: SourceKind::Aqi },
            ]
        );
    }
}
