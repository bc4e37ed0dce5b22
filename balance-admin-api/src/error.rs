/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; every failure becomes a JSON body with a
/// stable shape:
///
/// ```json
/// { "status": "error", "message": "Validation failed", "errors": [{ "path": "body.amount", "message": "..." }] }
/// ```
///
/// | Variant            | Status |
/// |--------------------|--------|
/// | `BadRequest`       | 400    |
/// | `Validation`       | 400    |
/// | `NotFound`         | 404    |
/// | `Internal`         | 500    |
///
/// Internal errors are logged with their cause; clients only see a generic
/// message unless the server runs in development mode (see
/// [`attach_error_detail`]).

use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use balance_admin_shared::db::error::StoreError;
use balance_admin_shared::ledger::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidationErrors;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400), e.g. insufficient balance
    BadRequest(String),

    /// Request failed validation (400)
    Validation(Vec<ValidationErrorDetail>),

    /// Not found (404)
    NotFound(String),

    /// Internal server error (500); the message is logged, not returned
    Internal(String),
}

/// One failed validation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Location of the offending value, e.g. `body.amount` or `query.page`
    pub path: String,

    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `"error"`
    pub status: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationErrorDetail>>,

    /// Internal error description, development mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Cause of a 500, carried in response extensions for [`attach_error_detail`]
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Validation(errors) => write!(f, "Validation failed: {} errors", errors.len()),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, errors, internal) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None, None),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(errors),
                None,
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None, None),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong!".to_string(),
                    None,
                    Some(msg),
                )
            }
        };

        let body = Json(ErrorResponse {
            status: "error".to_string(),
            message,
            errors,
            detail: None,
        });

        let mut response = (status, body).into_response();
        if let Some(detail) = internal {
            response.extensions_mut().insert(InternalErrorDetail(detail));
        }
        response
    }
}

/// Development-mode middleware that copies the cause of a 500 into the body
pub async fn attach_error_detail(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let Some(InternalErrorDetail(detail)) = response.extensions().get::<InternalErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    let body = ErrorResponse {
        status: "error".to_string(),
        message: "Something went wrong!".to_string(),
        errors: None,
        detail: Some(detail),
    };

    match serde_json::to_vec(&body) {
        Ok(bytes) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(_) => Response::from_parts(parts, Body::empty()),
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) => ApiError::NotFound("User not found".to_string()),
            LedgerError::InsufficientBalance { .. } => {
                ApiError::BadRequest("Insufficient balance".to_string())
            }
            LedgerError::InvalidAmount(_) => ApiError::Validation(vec![ValidationErrorDetail::new(
                "body.amount",
                "Amount must be a positive number.",
            )]),
            LedgerError::Store(err) => err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(format!("Database error: {}", err))
    }
}

/// Flattens `validator` errors into `{ path, message }` details
///
/// `prefix` names the request part (`body`, `query`, `params`).
pub fn validation_details(prefix: &str, errors: &ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                ValidationErrorDetail::new(
                    format!("{}.{}", prefix, field),
                    error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Invalid value".to_string()),
                )
            })
        })
        .collect();

    // HashMap iteration order is arbitrary
    details.sort_by(|a, b| a.path.cmp(&b.path));
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use balance_admin_shared::db::error::StoreError;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Insufficient balance".to_string());
        assert_eq!(err.to_string(), "Bad request: Insufficient balance");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_ledger_error_mapping() {
        let err: ApiError = LedgerError::NotFound(Uuid::new_v4()).into();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "User not found"));

        let err: ApiError = LedgerError::InsufficientBalance {
            user_id: Uuid::new_v4(),
            requested: Decimal::ONE,
        }
        .into();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Insufficient balance"));

        let err: ApiError = LedgerError::Store(StoreError::RetriesExhausted(3)).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[tokio::test]
    async fn test_validation_response_shape() {
        let response = ApiError::Validation(vec![ValidationErrorDetail::new(
            "body.amount",
            "Amount must be a positive number.",
        )])
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(json["errors"][0]["path"], "body.amount");
        assert_eq!(json["errors"][0]["message"], "Amount must be a positive number.");
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let response = ApiError::Internal("connection refused".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<InternalErrorDetail>().is_some());

        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert!(json.get("detail").is_none());
        assert!(!json.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let response = ApiError::NotFound("User not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["message"], "User not found");
        assert!(json.get("errors").is_none());
    }
}
