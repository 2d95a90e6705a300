//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use service::ServiceError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// The request was rejected before reaching the bus.
    BadRequest(String),
    /// A downstream consumer is not accepting work.
    Unavailable(String),
    /// Message handling failed.
    Service(ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Service(err) => service_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn service_error_to_response(err: ServiceError) -> (StatusCode, String) {
    match &err {
        ServiceError::InvalidSku(_) | ServiceError::Allocation(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        _ if err.is_conflict() => (StatusCode::CONFLICT, err.to_string()),
        _ => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{Sku, Version};
    use store::StoreError;

    use super::*;

    fn status_of(err: ServiceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn invalid_sku_is_bad_request() {
        assert_eq!(
            status_of(ServiceError::InvalidSku(Sku::new("NOPE"))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn conflict_is_409() {
        let err = ServiceError::Store(StoreError::ConcurrencyConflict {
            sku: Sku::new("LAMP"),
            expected: Version::new(1),
            actual: Version::new(2),
        });
        assert_eq!(status_of(err), StatusCode::CONFLICT);
    }

    #[test]
    fn collaborator_failure_is_500() {
        assert_eq!(
            status_of(ServiceError::Publish("down".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
