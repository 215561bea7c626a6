use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::models::{AggregateQuery, RecommendationRequest, ValidationError};
use crate::routes::AppState;
use crate::services::RecommendError;

/// Configure recommendation and snapshot routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/recommendations/neighborhoods", web::post().to(recommend_neighborhoods))
        .route("/recommendations/aggregate/{locality_id}", web::post().to(aggregate_locality))
        .route("/recommendations/refresh/{city}", web::post().to(refresh_city))
        .route("/neighborhoods/{city}", web::get().to(list_neighborhoods));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.service.health().await)
}

/// Ranked neighborhood shortlist
///
/// POST /api/v1/recommendations/neighborhoods
///
/// Request body:
/// ```json
/// {
///   "city": "Bhopal",
///   "number_of_people": 2,
///   "max_travel_distance_km": 10,
///   "budget": 25000,
///   "property_type": "2BHK",
///   "top_n": 10,
///   "weights": {"rent": 0.4, "aqi": 0.3, "amenities": 0.3},
///   "work_location": {"latitude": 23.23, "longitude": 77.43}
/// }
/// ```
async fn recommend_neighborhoods(
    state: web::Data<AppState>,
    req: web::Json<RecommendationRequest>,
    http_req: HttpRequest,
) -> Result<HttpResponse, RecommendError> {
    state.authorize(&http_req)?;

    let response = state.service.recommend(req.into_inner()).await.map_err(|e| {
        if let RecommendError::Validation(err) = &e {
            tracing::info!("Validation failed for recommendation request: {}", err);
        }
        e
    })?;

    Ok(HttpResponse::Ok().json(response))
}

/// Recompute one locality's raw metrics
///
/// POST /api/v1/recommendations/aggregate/{locality_id}?city={city}
async fn aggregate_locality(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<AggregateQuery>,
    http_req: HttpRequest,
) -> Result<HttpResponse, RecommendError> {
    state.authorize(&http_req)?;
    query.validate().map_err(ValidationError::from)?;

    let locality_id = path.into_inner();
    tracing::info!("Aggregating locality {} in {}", locality_id, query.city);

    let response = state.service.aggregate_locality(locality_id, &query.city).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Start a background refresh of every locality in a city
///
/// POST /api/v1/recommendations/refresh/{city}
async fn refresh_city(
    state: web::Data<AppState>,
    path: web::Path<String>,
    http_req: HttpRequest,
) -> Result<HttpResponse, RecommendError> {
    state.authorize(&http_req)?;

    let city = path.into_inner();
    if city.trim().is_empty() {
        return Err(ValidationError::Fields("city is required".to_string()).into());
    }

    let response = state.service.refresh_city_in_background(city);
    tracing::info!("Started refresh job {} for {}", response.job_id, response.city);

    Ok(HttpResponse::Accepted().json(response))
}

/// Raw snapshot browse
///
/// GET /api/v1/neighborhoods/{city}
async fn list_neighborhoods(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, RecommendError> {
    let response = state.service.neighborhoods(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}
