use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::models::{AmenityCounts, GeoPoint, Locality, RestaurantStats, SourceKind};
use crate::services::sources::{MetricPatch, MetricSource, SourceError, SourceFuture};

/// Restaurants at or above this rating count as highly rated
pub const HIGHLY_RATED_THRESHOLD: f64 = 4.0;

fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn coordinates(locality: &Locality) -> Result<GeoPoint, SourceError> {
    locality
        .position()
        .ok_or(SourceError::MissingCoordinates(locality.id))
}

/// Air quality from the WAQI geo feed
pub struct AqiSource {
    client: Client,
    base_url: String,
    token: String,
}

impl AqiSource {
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            token,
        })
    }

    async fn fetch_aqi(&self, locality: &Locality) -> Result<MetricPatch, SourceError> {
        let point = coordinates(locality)?;
        let url = format!(
            "{}/feed/geo:{};{}/",
            self.base_url.trim_end_matches('/'),
            point.latitude,
            point.longitude
        );

        tracing::debug!("Fetching AQI for locality {}", locality.id);

        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "AQI feed returned {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;
        parse_waqi(&json).map(MetricPatch::Aqi)
    }
}

/// Extract the AQI reading from a WAQI feed body
///
/// Stations without a current reading report `"-"`, which is treated as a failure.
fn parse_waqi(json: &Value) -> Result<f64, SourceError> {
    let status = json.get("status").and_then(Value::as_str).unwrap_or_default();
    if status != "ok" {
        let message = json
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(SourceError::ApiError(format!("AQI feed status '{}': {}", status, message)));
    }

    json.get("data")
        .and_then(|data| data.get("aqi"))
        .and_then(Value::as_f64)
        .filter(|aqi| aqi.is_finite() && *aqi >= 0.0)
        .ok_or_else(|| SourceError::InvalidResponse("missing numeric data.aqi".into()))
}

impl MetricSource for AqiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Aqi
    }

    fn fetch<'a>(&'a self, locality: &'a Locality) -> SourceFuture<'a> {
        Box::pin(self.fetch_aqi(locality))
    }
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<Place>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Place {
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
}

/// Places nearby-search client shared by the restaurant and amenity sources
#[derive(Clone)]
pub struct PlacesClient {
    client: Client,
    base_url: String,
    api_key: String,
    radius_m: u32,
}

impl PlacesClient {
    pub fn new(
        base_url: String,
        api_key: String,
        radius_m: u32,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            api_key,
            radius_m,
        })
    }

    async fn nearby(&self, point: GeoPoint, place_type: &str) -> Result<Vec<Place>, SourceError> {
        let url = format!(
            "{}/maps/api/place/nearbysearch/json",
            self.base_url.trim_end_matches('/')
        );
        let location = format!("{},{}", point.latitude, point.longitude);
        let radius = self.radius_m.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("type", place_type),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "Places search for {} returned {}",
                place_type,
                response.status()
            )));
        }

        let body: NearbyResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("Places body: {}", e)))?;

        match body.status.as_str() {
            "OK" => Ok(body.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            other => Err(SourceError::ApiError(format!(
                "Places status {}: {}",
                other,
                body.error_message.unwrap_or_default()
            ))),
        }
    }

    async fn count(&self, point: GeoPoint, place_type: &str) -> Result<u32, SourceError> {
        Ok(self.nearby(point, place_type).await?.len() as u32)
    }
}

fn restaurant_stats(places: &[Place]) -> RestaurantStats {
    let ratings: Vec<f64> = places
        .iter()
        .filter_map(|p| p.rating)
        .filter(|r| r.is_finite() && *r > 0.0)
        .collect();

    let avg_rating = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
    };

    RestaurantStats {
        avg_rating,
        restaurants_count: places.len() as u32,
        highly_rated_count: ratings.iter().filter(|r| **r >= HIGHLY_RATED_THRESHOLD).count() as u32,
    }
}

/// Restaurant ratings as the hygiene indicator
pub struct RestaurantSource {
    places: PlacesClient,
}

impl RestaurantSource {
    pub fn new(places: PlacesClient) -> Self {
        Self { places }
    }
}

impl MetricSource for RestaurantSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Restaurants
    }

    fn fetch<'a>(&'a self, locality: &'a Locality) -> SourceFuture<'a> {
        Box::pin(async move {
            let point = coordinates(locality)?;
            let places = self.places.nearby(point, "restaurant").await?;
            Ok(MetricPatch::Restaurants(restaurant_stats(&places)))
        })
    }
}

/// Amenity, transit stop and grocery store counts
pub struct AmenitySource {
    places: PlacesClient,
}

impl AmenitySource {
    pub fn new(places: PlacesClient) -> Self {
        Self { places }
    }

    async fn grocery_stores(&self, point: GeoPoint) -> Result<u32, SourceError> {
        let (supermarkets, groceries) = tokio::try_join!(
            self.places.nearby(point, "supermarket"),
            self.places.nearby(point, "grocery_or_supermarket"),
        )?;

        let mut seen = HashSet::new();
        let mut anonymous = 0u32;
        for place in supermarkets.iter().chain(groceries.iter()) {
            match &place.place_id {
                Some(id) => {
                    seen.insert(id.clone());
                }
                None => anonymous += 1,
            }
        }
        Ok(seen.len() as u32 + anonymous)
    }

    async fn fetch_counts(&self, locality: &Locality) -> Result<MetricPatch, SourceError> {
        let point = coordinates(locality)?;

        let (hospitals, schools, parks, malls, metro_stations, bus_stops, grocery_stores_count) = tokio::try_join!(
            self.places.count(point, "hospital"),
            self.places.count(point, "school"),
            self.places.count(point, "park"),
            self.places.count(point, "shopping_mall"),
            self.places.count(point, "subway_station"),
            self.places.count(point, "bus_station"),
            self.grocery_stores(point),
        )?;

        Ok(MetricPatch::Amenities {
            counts: AmenityCounts {
                hospitals,
                schools,
                parks,
                malls,
                metro_stations,
                bus_stops,
            },
            grocery_stores_count,
        })
    }
}

impl MetricSource for AmenitySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Amenities
    }

    fn fetch<'a>(&'a self, locality: &'a Locality) -> SourceFuture<'a> {
        Box::pin(self.fetch_counts(locality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn locality() -> Locality {
        Locality {
            id: 3,
            name: "Kolar Road".to_string(),
            city: "Bhopal".to_string(),
            latitude: Some(23.18),
            longitude: Some(77.42),
            distance_to_center_km: Some(8.0),
        }
    }

    fn places(server: &mockito::Server) -> PlacesClient {
        PlacesClient::new(server.url(), "test-key".to_string(), 2000, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_aqi_source_parses_feed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/feed/geo:.*".to_string()))
            .match_query(Matcher::UrlEncoded("token".into(), "secret".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok","data":{"aqi":142,"iaqi":{}}}"#)
            .create_async()
            .await;

        let source = AqiSource::new(server.url(), "secret".to_string(), Duration::from_secs(5)).unwrap();
        let patch = source.fetch(&locality()).await.unwrap();

        assert_eq!(patch, MetricPatch::Aqi(142.0));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_aqi_source_rejects_missing_reading() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex(r"^/feed/geo:.*".to_string()))
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"ok","data":{"aqi":"-"}}"#)
            .create_async()
            .await;

        let source = AqiSource::new(server.url(), "secret".to_string(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            source.fetch(&locality()).await,
            Err(SourceError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_aqi_source_requires_coordinates() {
        let source = AqiSource::new(
            "http://127.0.0.1:9".to_string(),
            "secret".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        let mut loc = locality();
        loc.latitude = None;

        assert!(matches!(
            source.fetch(&loc).await,
            Err(SourceError::MissingCoordinates(3))
        ));
    }

    #[tokio::test]
    async fn test_restaurant_source_aggregates_ratings() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/maps/api/place/nearbysearch/json")
            .match_query(Matcher::UrlEncoded("type".into(), "restaurant".into()))
            .with_status(200)
            .with_body(
                r#"{"status":"OK","results":[
                    {"place_id":"a","rating":4.5},
                    {"place_id":"b","rating":3.5},
                    {"place_id":"c"}
                ]}"#,
            )
            .create_async()
            .await;

        let source = RestaurantSource::new(places(&server));
        let patch = source.fetch(&locality()).await.unwrap();

        assert_eq!(
            patch,
            MetricPatch::Restaurants(RestaurantStats {
                avg_rating: Some(4.0),
                restaurants_count: 3,
                highly_rated_count: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_places_error_status_fails_source() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/maps/api/place/nearbysearch/json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"REQUEST_DENIED","error_message":"bad key","results":[]}"#)
            .create_async()
            .await;

        let source = RestaurantSource::new(places(&server));
        assert!(matches!(
            source.fetch(&locality()).await,
            Err(SourceError::ApiError(_))
        ));
    }

    #[tokio::test]
    async fn test_amenity_source_counts_and_dedupes_grocery() {
        let mut server = mockito::Server::new_async().await;
        let body = |ids: &[&str]| {
            let results: Vec<String> =
                ids.iter().map(|id| format!(r#"{{"place_id":"{}"}}"#, id)).collect();
            format!(r#"{{"status":"OK","results":[{}]}}"#, results.join(","))
        };

        let responses = [
            ("hospital", body(&["h1", "h2"])),
            ("school", body(&["s1"])),
            ("park", r#"{"status":"ZERO_RESULTS","results":[]}"#.to_string()),
            ("shopping_mall", body(&["m1"])),
            ("subway_station", body(&[])),
            ("bus_station", body(&["b1", "b2", "b3"])),
            ("supermarket", body(&["g1", "g2"])),
            ("grocery_or_supermarket", body(&["g2", "g3"])),
        ];
        for (place_type, response) in responses {
            server
                .mock("GET", "/maps/api/place/nearbysearch/json")
                .match_query(Matcher::UrlEncoded("type".into(), place_type.into()))
                .with_status(200)
                .with_body(response)
                .create_async()
                .await;
        }

        let source = AmenitySource::new(places(&server));
        let patch = source.fetch(&locality()).await.unwrap();

        assert_eq!(
            patch,
            MetricPatch::Amenities {
                counts: AmenityCounts {
                    hospitals: 2,
                    schools: 1,
                    parks: 0,
                    malls: 1,
                    metro_stations: 0,
                    bus_stops: 3,
                },
                grocery_stores_count: 3,
            }
        );
    }

    #[test]
    fn test_parse_waqi_error_status() {
        let json: Value = serde_json::json!({"status": "error", "data": "Invalid key"});
        assert!(matches!(parse_waqi(&json), Err(SourceError::ApiError(_))));
    }
}
