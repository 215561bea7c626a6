use actix_web::{web, HttpResponse};
use serde::Serialize;
use validator::Validate;

use crate::models::{ValidationError, VerifyTokenRequest};
use crate::routes::AppState;
use crate::services::RecommendError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/token/verify", web::post().to(verify_token));
}

#[derive(Debug, Serialize)]
struct VerifyTokenResponse {
    valid: bool,
    subject: String,
    expires_at: i64,
}

/// Validate an access token issued by the login flow
///
/// POST /api/v1/auth/token/verify
async fn verify_token(
    state: web::Data<AppState>,
    req: web::Json<VerifyTokenRequest>,
) -> Result<HttpResponse, RecommendError> {
    req.validate().map_err(ValidationError::from)?;

    let claims = state
        .tokens
        .verify(req.token.trim())
        .map_err(|e| RecommendError::Unauthorized(e.to_string()))?;

    Ok(HttpResponse::Ok().json(VerifyTokenResponse {
        valid: true,
        subject: claims.sub,
        expires_at: claims.exp,
    }))
}
