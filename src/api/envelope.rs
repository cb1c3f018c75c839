//! Response envelope of the consumer API.
//!
//! The HMI reads `data` on success and `error.code` otherwise; `meta` tells
//! it when the answer was produced, which matters for telemetry that goes
//! stale within seconds.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

/// Version of the consumer contract, bumped on breaking changes.
pub const API_VERSION: &str = "1";

/// Attached to every response.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    /// Server time at which the response was built (RFC 3339)
    pub timestamp: String,
    pub version: &'static str,
}

impl ResponseMeta {
    fn now() -> Self {
        Self { timestamp: Utc::now().to_rfc3339(), version: API_VERSION }
    }
}

/// `{ "data": T, "meta": { ... } }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        (StatusCode::OK, axum::Json(Self { data, meta: ResponseMeta::now() })).into_response()
    }
}

/// Failure classes the HMI distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request itself is unusable (e.g. a command with no writes)
    BadRequest,
    Internal,
    /// Neither the stream nor the HTTP fallback took the command
    BadGateway,
    /// No telemetry yet, or the link owner has stopped
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::BadGateway => StatusCode::BAD_GATEWAY,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

/// `{ "error": { "code", "message" }, "meta": { ... } }`
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    pub fn respond(code: ErrorCode, message: impl Into<String>) -> Response {
        let body = Self {
            error: ErrorDetail { code, message: message.into() },
            meta: ResponseMeta::now(),
        };
        (code.status(), axum::Json(body)).into_response()
    }

    pub fn bad_request(message: impl Into<String>) -> Response {
        Self::respond(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Response {
        Self::respond(ErrorCode::Internal, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Response {
        Self::respond(ErrorCode::BadGateway, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Response {
        Self::respond(ErrorCode::ServiceUnavailable, message)
    }
}
