// Criterion benchmarks for the neighborhood ranker

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use neighborhood_ranker::core::{filter_candidates, haversine_distance, normalize, Recommender};
use neighborhood_ranker::models::{
    AmenityCounts, Constraint, DeliveryServices, GeoPoint, Neighborhood, PropertyType,
    RawMetrics, RecommendationQuery, RentByType, RestaurantStats, WeightVector,
};

fn create_neighborhood(id: usize) -> Neighborhood {
    let step = id as f64;
    let mut metrics = RawMetrics {
        rent: RentByType {
            one_bhk: Some(6000.0 + (id % 40) as f64 * 250.0),
            two_bhk: Some(9000.0 + (id % 50) as f64 * 400.0),
            three_bhk: Some(14000.0 + (id % 30) as f64 * 600.0),
        },
        grocery_cost_per_person: Some(2400.0 + (id % 7) as f64 * 150.0),
        grocery_stores_count: Some((id % 9) as u32),
        transport_cost_monthly: Some(500.0 + (id % 6) as f64 * 200.0),
        // Every tenth neighborhood is missing its AQI reading
        aqi: if id % 10 == 0 { None } else { Some(40.0 + (id % 12) as f64 * 15.0) },
        restaurants: Some(RestaurantStats {
            avg_rating: Some(3.0 + (id % 5) as f64 * 0.35),
            restaurants_count: 5 + (id % 25) as u32,
            highly_rated_count: (id % 8) as u32,
        }),
        amenities: Some(AmenityCounts {
            hospitals: (id % 4) as u32,
            schools: (id % 6) as u32,
            parks: (id % 3) as u32,
            malls: (id % 2) as u32,
            metro_stations: (id % 2) as u32,
            bus_stops: (id % 15) as u32,
        }),
        delivery: Some(DeliveryServices {
            blinkit: id % 2 == 0,
            zomato: true,
            swiggy: id % 3 != 0,
        }),
        ..Default::default()
    };
    metrics.derive_scores();

    Neighborhood {
        id: id as i64,
        locality_id: id as i64,
        name: format!("Locality {}", id),
        city: "Bhopal".to_string(),
        latitude: Some(23.2599 + (step * 0.0007) % 0.12),
        longitude: Some(77.4126 + (step * 0.0011) % 0.12),
        distance_to_center_km: Some((step * 0.37) % 14.0),
        metrics,
    }
}

fn create_query(top_n: usize) -> RecommendationQuery {
    RecommendationQuery {
        constraint: Constraint {
            city: "Bhopal".to_string(),
            property_type: PropertyType::TwoBhk,
            max_budget: 25000.0,
            max_travel_distance_km: 10.0,
            number_of_people: 2,
            work_point: Some(GeoPoint {
                latitude: 23.2332,
                longitude: 77.4343,
            }),
        },
        weights: WeightVector::default(),
        top_n,
    }
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance(
                black_box(23.2599),
                black_box(77.4126),
                black_box(23.2332),
                black_box(77.4343),
            )
        });
    });
}

fn bench_recommend(c: &mut Criterion) {
    let recommender = Recommender::with_default_limits();
    let query = create_query(10);

    let mut group = c.benchmark_group("recommend");

    for neighborhood_count in [10, 50, 100, 500, 1000].iter() {
        let neighborhoods: Vec<Neighborhood> =
            (0..*neighborhood_count).map(create_neighborhood).collect();

        group.bench_with_input(
            BenchmarkId::new("full_pipeline", neighborhood_count),
            neighborhood_count,
            |b, _| {
                b.iter(|| recommender.recommend(black_box(&neighborhoods), black_box(&query)));
            },
        );
    }

    group.finish();
}

fn bench_filter_and_normalize(c: &mut Criterion) {
    let query = create_query(10);
    let neighborhoods: Vec<Neighborhood> = (0..500).map(create_neighborhood).collect();

    c.bench_function("filter_and_normalize_500_neighborhoods", |b| {
        b.iter(|| {
            let mut candidates = filter_candidates(black_box(&neighborhoods), &query.constraint);
            let ranges = normalize(&mut candidates);
            black_box((candidates.len(), ranges))
        });
    });
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_recommend,
    bench_filter_and_normalize
);

criterion_main!(benches);
