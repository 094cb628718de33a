//! Object Gateway error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Early validation failures (missing or invalid token, missing parameters)
//! are answered with plain-text bodies; everything else is JSON. Messages
//! returned to clients are generic and never reveal whether an object exists
//! before ownership has been established. Backend details are logged
//! server-side only.

use crate::auth::AuthError;
use crate::policy::AuthzError;
use crate::storage::StorageError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every token failure other than a missing token.
pub const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// Message returned when no bearer token was supplied.
pub const MISSING_TOKEN_MESSAGE: &str = "Missing bearer token";

/// Object Gateway error type.
///
/// Maps to HTTP status codes:
/// - MissingToken, InvalidToken: 401 Unauthorized (plain text)
/// - BadRequest: 400 Bad Request (plain text)
/// - PayloadTooLarge: 413 Payload Too Large (plain text)
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found, with `exists: false`
/// - Storage: 500 Internal Server Error
///
/// Readiness failures are not errors here; `/ready` answers its own 503.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MissingToken | GatewayError::InvalidToken(_) => 401,
            GatewayError::Forbidden(_) => 403,
            GatewayError::BadRequest(_) => 400,
            GatewayError::PayloadTooLarge(_) => 413,
            GatewayError::NotFound(_) => 404,
            GatewayError::Storage(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,

    #[serde(skip_serializing_if = "Option::is_none")]
    exists: Option<bool>,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::MissingToken => {
                unauthorized(MISSING_TOKEN_MESSAGE.to_string(), "invalid_request")
            }
            GatewayError::InvalidToken(reason) => unauthorized(reason, "invalid_token"),
            GatewayError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            GatewayError::PayloadTooLarge(reason) => {
                (StatusCode::PAYLOAD_TOO_LARGE, reason).into_response()
            }
            GatewayError::Forbidden(reason) => {
                json_error(StatusCode::FORBIDDEN, "FORBIDDEN", reason, None)
            }
            GatewayError::NotFound(resource) => {
                json_error(StatusCode::NOT_FOUND, "NOT_FOUND", resource, Some(false))
            }
            GatewayError::Storage(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "og.storage", error = %err, "Storage operation failed");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "An internal storage error occurred".to_string(),
                    None,
                )
            }
        }
    }
}

fn json_error(
    status: StatusCode,
    code: &str,
    message: String,
    exists: Option<bool>,
) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            code: code.to_string(),
            message,
        },
        exists,
    };

    (status, Json(body)).into_response()
}

/// Plain-text 401 carrying a `WWW-Authenticate` challenge.
fn unauthorized(message: String, error_code: &str) -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, message).into_response();

    let challenge = format!("Bearer realm=\"object-gateway\", error=\"{}\"", error_code);
    if let Ok(header_value) = HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, header_value);
    }

    response
}

/// Every verification failure other than a missing token collapses into one
/// generic 401; the specific reason stays in the server logs.
impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => GatewayError::MissingToken,
            AuthError::MalformedToken
            | AuthError::DisallowedAlgorithm(_)
            | AuthError::KeyResolutionError(_)
            | AuthError::InvalidSignature
            | AuthError::InvalidClaims(_) => {
                GatewayError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
            }
        }
    }
}

impl From<AuthzError> for GatewayError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden => {
                GatewayError::Forbidden("Access to this object is not permitted".to_string())
            }
        }
    }
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => GatewayError::NotFound("Object not found".to_string()),
            StorageError::Backend(detail) => GatewayError::Storage(detail),
        }
    }
}
