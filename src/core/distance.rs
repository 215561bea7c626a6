use geo::{HaversineDistance, Point};

use crate::models::{GeoPoint, Neighborhood};

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let from = Point::new(lon1, lat1);
    let to = Point::new(lon2, lat2);
    from.haversine_distance(&to) / 1000.0
}

/// Travel distance used by the commute constraint
///
/// Distance to the caller's work point when both positions are known, otherwise
/// the collaborator-supplied distance to the city center. `None` when neither
/// is available.
pub fn travel_distance_km(neighborhood: &Neighborhood, work_point: Option<GeoPoint>) -> Option<f64> {
    if let (Some(work), Some(home)) = (work_point, neighborhood.position()) {
        return Some(haversine_distance(
            home.latitude,
            home.longitude,
            work.latitude,
            work.longitude,
        ));
    }
    neighborhood.distance_to_center_km
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawMetrics;

    fn neighborhood(lat: Option<f64>, lon: Option<f64>, center_km: Option<f64>) -> Neighborhood {
        Neighborhood {
            id: 1,
            locality_id: 1,
            name: "Arera Colony".to_string(),
            city: "Bhopal".to_string(),
            latitude: lat,
            longitude: lon,
            distance_to_center_km: center_km,
            metrics: RawMetrics::default(),
        }
    }

    #[test]
    fn test_haversine_distance() {
        // Bhopal to Indore (approximately 170 km)
        let distance = haversine_distance(23.2599, 77.4126, 22.7196, 75.8577);
        assert!((distance - 170.0).abs() < 10.0, "Distance should be ~170km, got {}", distance);
    }

    #[test]
    fn test_haversine_distance_zero() {
        assert!(haversine_distance(23.2599, 77.4126, 23.2599, 77.4126) < 0.01);
    }

    #[test]
    fn test_work_point_preferred_over_center_distance() {
        let n = neighborhood(Some(23.2100), Some(77.4300), Some(99.0));
        let work = GeoPoint { latitude: 23.2599, longitude: 77.4126 };

        let distance = travel_distance_km(&n, Some(work)).unwrap();
        assert!(distance < 10.0, "got {}", distance);
    }

    #[test]
    fn test_falls_back_to_center_distance() {
        let n = neighborhood(None, None, Some(4.5));
        let work = GeoPoint { latitude: 23.2599, longitude: 77.4126 };

        assert_eq!(travel_distance_km(&n, Some(work)), Some(4.5));
        assert_eq!(travel_distance_km(&n, None), Some(4.5));
    }

    #[test]
    fn test_unknown_distance() {
        let n = neighborhood(Some(23.21), Some(77.43), None);
        assert_eq!(travel_distance_km(&n, None), None);
    }
}
