//! API error translation
//!
//! Maps core errors onto HTTP status codes and a JSON error body. Per-request
//! failures never crash the process; they surface here as failed responses.

use http::StatusCode;
use serde_json::json;

use crate::module::traits::ModuleError;
use crate::modules::auth::AuthenticationError;
use crate::query::QueryResolutionError;

/// An API-facing error: status code plus message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// JSON body for the response.
    pub fn body(&self) -> String {
        json!({ "error": self.message }).to_string()
    }
}

impl From<QueryResolutionError> for ApiError {
    fn from(e: QueryResolutionError) -> Self {
        let status = match &e {
            QueryResolutionError::UnknownEntryPoint(_)
            | QueryResolutionError::UnresolvableField { .. }
            | QueryResolutionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            QueryResolutionError::ModuleUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            QueryResolutionError::Fetch(module_error) => return module_error_status(module_error),
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<ModuleError> for ApiError {
    fn from(e: ModuleError) -> Self {
        module_error_status(&e)
    }
}

fn module_error_status(e: &ModuleError) -> ApiError {
    let status = match e {
        ModuleError::NotFound(_) | ModuleError::UnknownEntity { .. } => StatusCode::NOT_FOUND,
        ModuleError::Conflict(_) => StatusCode::CONFLICT,
        ModuleError::Configuration(_) => StatusCode::BAD_REQUEST,
        ModuleError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::new(status, e.to_string())
}

impl From<AuthenticationError> for ApiError {
    fn from(e: AuthenticationError) -> Self {
        let status = match &e {
            AuthenticationError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            AuthenticationError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
        };
        ApiError::new(status, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_errors_map_to_expected_statuses() {
        let bad: ApiError = QueryResolutionError::UnknownEntryPoint("x".into()).into();
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let unavailable: ApiError = QueryResolutionError::ModuleUnavailable("inventory".into()).into();
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn auth_errors_map_to_unauthorized() {
        let unauthorized: ApiError =
            AuthenticationError::InvalidCredentials("bad key".into()).into();
        assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

        let missing: ApiError = AuthenticationError::UnknownProvider("oauth".into()).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let conflict: ApiError = ModuleError::Conflict("edit running".into()).into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);
    }
}
