use actix_web::{web, HttpRequest, HttpResponse};

use crate::models::ClassifyRentRequest;
use crate::routes::AppState;
use crate::services::RecommendError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/rent/classify", web::post().to(classify_rent));
}

/// Fair-rent check for a single listing
///
/// POST /api/v1/rent/classify
async fn classify_rent(
    state: web::Data<AppState>,
    req: web::Json<ClassifyRentRequest>,
    http_req: HttpRequest,
) -> Result<HttpResponse, RecommendError> {
    state.authorize(&http_req)?;

    let assessment = state.service.classify_rent(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(assessment))
}
