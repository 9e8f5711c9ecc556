use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::models::MissingFields;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<MissingFields>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            missing_fields: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_missing_fields(mut self, missing: MissingFields) -> Self {
        self.missing_fields = Some(missing);
        self
    }
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message)))
}

pub fn forbidden() -> ApiError {
    (StatusCode::FORBIDDEN, Json(ErrorResponse::new("Forbidden")))
}

pub fn unauthorized() -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Unauthorized")))
}

/// Log the cause server-side and return a generic 500
pub fn internal(message: &str, cause: impl std::fmt::Display) -> ApiError {
    error!("{}: {}", message, cause);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message)),
    )
}

/// Unwrap a JSON body, turning a malformed or mistyped payload into a 400
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Invalid request body").with_details(vec![rejection.body_text()])),
            ))
        }
    }
}

/// Unwrap a query string, turning an undecodable one into a 400
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    match query {
        Ok(Query(value)) => Ok(value),
        Err(rejection) => {
            warn!("Rejected query string: {}", rejection.body_text());
            Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Invalid query parameters").with_details(vec![rejection.body_text()])),
            ))
        }
    }
}
