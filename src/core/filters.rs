use crate::core::{candidate::Candidate, distance::travel_distance_km};
use crate::models::{Constraint, Neighborhood};

/// Check a neighborhood against the request's hard limits
///
/// Returns the rent for the requested property type and the travel distance
/// when the neighborhood passes. Missing rent excludes the neighborhood since
/// affordability cannot be verified; an unknown travel distance does not.
#[inline]
pub fn check_constraints(
    neighborhood: &Neighborhood,
    constraint: &Constraint,
) -> Option<(f64, Option<f64>)> {
    if !neighborhood.city.eq_ignore_ascii_case(&constraint.city) {
        return None;
    }

    let rent = neighborhood
        .rent_for(constraint.property_type)
        .filter(|rent| rent.is_finite())?;
    if rent > constraint.max_budget {
        return None;
    }

    let travel = travel_distance_km(neighborhood, constraint.work_point);
    if let Some(distance) = travel {
        if distance > constraint.max_travel_distance_km {
            return None;
        }
    }

    Some((rent, travel))
}

/// Narrow a city's neighborhoods to the candidate set
pub fn filter_candidates<'a>(
    neighborhoods: &'a [Neighborhood],
    constraint: &Constraint,
) -> Vec<Candidate<'a>> {
    neighborhoods
        .iter()
        .filter_map(|neighborhood| {
            check_constraints(neighborhood, constraint)
                .map(|(rent, travel)| Candidate::new(neighborhood, constraint, rent, travel))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, PropertyType, RawMetrics, RentByType};

    fn neighborhood(id: i64, rent_2bhk: Option<f64>, center_km: Option<f64>) -> Neighborhood {
        Neighborhood {
            id,
            locality_id: id,
            name: format!("Locality {}", id),
            city: "Bhopal".to_string(),
            latitude: Some(23.2599),
            longitude: Some(77.4126),
            distance_to_center_km: center_km,
            metrics: RawMetrics {
                rent: RentByType { two_bhk: rent_2bhk, ..Default::default() },
                ..Default::default()
            },
        }
    }

    fn constraint(budget: f64, max_km: f64) -> Constraint {
        Constraint {
            city: "bhopal".to_string(),
            property_type: PropertyType::TwoBhk,
            max_budget: budget,
            max_travel_distance_km: max_km,
            number_of_people: 2,
            work_point: None,
        }
    }

    #[test]
    fn test_rent_over_budget_excluded() {
        let n = neighborhood(1, Some(32000.0), Some(2.0));
        assert!(check_constraints(&n, &constraint(30000.0, 10.0)).is_none());
    }

    #[test]
    fn test_missing_rent_excluded() {
        let n = neighborhood(1, None, Some(2.0));
        assert!(check_constraints(&n, &constraint(30000.0, 10.0)).is_none());
    }

    #[test]
    fn test_rent_at_budget_kept() {
        let n = neighborhood(1, Some(30000.0), Some(2.0));
        assert_eq!(check_constraints(&n, &constraint(30000.0, 10.0)), Some((30000.0, Some(2.0))));
    }

    #[test]
    fn test_travel_distance_excluded() {
        let n = neighborhood(1, Some(12000.0), Some(14.0));
        assert!(check_constraints(&n, &constraint(30000.0, 10.0)).is_none());
    }

    #[test]
    fn test_unknown_distance_kept() {
        let n = neighborhood(1, Some(12000.0), None);
        assert!(check_constraints(&n, &constraint(30000.0, 0.0)).is_some());
    }

    #[test]
    fn test_work_point_distance_applied() {
        let n = neighborhood(1, Some(12000.0), Some(1.0));
        let mut c = constraint(30000.0, 5.0);
        // Indore, ~170 km away
        c.work_point = Some(GeoPoint { latitude: 22.7196, longitude: 75.8577 });
        assert!(check_constraints(&n, &c).is_none());
    }

    #[test]
    fn test_other_city_excluded() {
        let mut n = neighborhood(1, Some(12000.0), Some(1.0));
        n.city = "Indore".to_string();
        assert!(check_constraints(&n, &constraint(30000.0, 10.0)).is_none());
    }

    #[test]
    fn test_filter_candidates_keeps_input_order() {
        let all = vec![
            neighborhood(3, Some(10000.0), Some(1.0)),
            neighborhood(1, Some(40000.0), Some(1.0)),
            neighborhood(2, Some(20000.0), Some(1.0)),
        ];
        let ids: Vec<i64> = filter_candidates(&all, &constraint(30000.0, 10.0))
            .iter()
            .map(|c| c.neighborhood.id)
            .collect();
        assert_eq!(ids, vec![3, 2]);
    }
}
