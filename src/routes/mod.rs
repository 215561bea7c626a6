// Route exports
pub mod auth;
pub mod recommendations;
pub mod rent;

use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse, ResponseError};
use std::sync::Arc;

use crate::models::ErrorResponse;
use crate::services::{RecommendError, RecommendationService, TokenService};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: RecommendationService,
    pub tokens: Arc<TokenService>,
    /// Recommendation routes demand a bearer token when set
    pub require_token: bool,
}

impl AppState {
    /// Check the caller's bearer token when tokens are required
    pub fn authorize(&self, req: &HttpRequest) -> Result<(), RecommendError> {
        if !self.require_token {
            return Ok(());
        }

        let header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        self.tokens
            .verify_bearer(header)
            .map(|claims| tracing::debug!("Authorized request for {}", claims.sub))
            .map_err(|e| RecommendError::Unauthorized(e.to_string()))
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(recommendations::configure)
            .configure(rent::configure)
            .configure(auth::configure),
    );
}

impl ResponseError for RecommendError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.error_code().to_string(),
            message: self.to_string(),
            status_code: self.http_status(),
            retryable: self.retryable(),
        })
    }
}

/// JSON error response for payload errors raised before a handler runs
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    pub retryable: bool,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "validation_error".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
        retryable: false,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    JsonError {
        error: "validation_error".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
        retryable: false,
    }
    .into()
}

/// Handle path parameter errors
pub fn handle_path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    JsonError {
        error: "validation_error".to_string(),
        message: format!("Invalid path parameter: {}", err),
        status_code: 400,
        retryable: false,
    }
    .into()
}
