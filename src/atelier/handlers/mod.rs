pub mod health;
pub use self::health::health;

pub mod register;
pub mod session;
pub mod types;
pub mod visits;

// common functions for the handlers
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use secrecy::SecretString;

use crate::gate::FlowError;
use types::ErrorBody;

/// Status code a failed user action is answered with.
#[must_use]
pub fn flow_error_status(err: &FlowError) -> StatusCode {
    match err {
        FlowError::Validation(_) => StatusCode::BAD_REQUEST,
        FlowError::EmailNotVerified => StatusCode::FORBIDDEN,
        FlowError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FlowError::CoolingDown { .. } => StatusCode::TOO_MANY_REQUESTS,
        FlowError::Backend(_) => StatusCode::BAD_GATEWAY,
    }
}

pub fn flow_error_response(err: &FlowError) -> Response {
    (
        flow_error_status(err),
        Json(ErrorBody {
            error: err.kind().to_string(),
            message: err.to_string(),
        }),
    )
        .into_response()
}

pub fn visit_not_found(visit_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "not_found".to_string(),
            message: format!("visit {visit_id} not found"),
        }),
    )
        .into_response()
}

pub fn missing_payload() -> Response {
    (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response()
}

/// Id token from `Authorization: Bearer <token>`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| SecretString::from(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::BackendError;
    use secrecy::ExposeSecret;

    #[test]
    fn test_flow_error_status() {
        assert_eq!(
            flow_error_status(&FlowError::Validation("Enter a password.")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            flow_error_status(&FlowError::CoolingDown { remaining: 12 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            flow_error_status(&FlowError::Backend(BackendError::new("EMAIL_EXISTS"))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            flow_error_status(&FlowError::Rejected("expired".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            flow_error_status(&FlowError::EmailNotVerified),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", "Bearer  ".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", "Bearer memory:abc".parse().unwrap());
        assert_eq!(
            bearer_token(&headers).map(|t| t.expose_secret().to_string()),
            Some("memory:abc".to_string())
        );
    }
}
