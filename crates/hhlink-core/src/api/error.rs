use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Token missing, invalid, expired or revoked, or an authorization code
    /// that was rejected. Re-authorization or a refresh is required.
    #[error("Authorization rejected: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The platform refused the request for business reasons. Not retryable.
    #[error("Request refused by platform: {0}")]
    PolicyRejection(Value),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// hh.ru reports bearer-token problems as `{"errors": [{"type": "oauth", ...}]}`,
    /// usually under 403.
    fn is_oauth_error(body: &Value) -> bool {
        body.get("errors")
            .and_then(Value::as_array)
            .is_some_and(|errors| {
                errors
                    .iter()
                    .any(|e| e.get("type").and_then(Value::as_str) == Some("oauth"))
            })
    }

    fn body_as_value(body: &str) -> Value {
        serde_json::from_str(body).unwrap_or_else(|_| Value::String(Self::truncate_body(body)))
    }

    /// Classify a failed resource call (`/me`, `/resumes`, `/negotiations`, ...).
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Auth(truncated),
            403 => {
                let payload = Self::body_as_value(body);
                if Self::is_oauth_error(&payload) {
                    ApiError::Auth(truncated)
                } else {
                    ApiError::PolicyRejection(payload)
                }
            }
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::Server(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Classify a failed call to the token endpoint. Anything the platform
    /// rejects there (bad credentials, consumed code, dead refresh token)
    /// is an authorization failure.
    pub fn from_token_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => ApiError::RateLimited,
            500..=599 => ApiError::Server(Self::truncate_body(body)),
            _ => ApiError::Auth(format!("Status {}: {}", status, Self::truncate_body(body))),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_forbidden_is_auth() {
        let body = r#"{"errors":[{"type":"oauth","value":"token_expired"}],"request_id":"1"}"#;
        let err = ApiError::from_status(StatusCode::FORBIDDEN, body);
        assert!(err.is_auth(), "got {err:?}");
    }

    #[test]
    fn test_business_forbidden_is_policy_rejection() {
        let body = r#"{"errors":[{"type":"negotiations","value":"already_applied"}]}"#;
        match ApiError::from_status(StatusCode::FORBIDDEN, body) {
            ApiError::PolicyRejection(payload) => {
                assert_eq!(payload["errors"][0]["value"], "already_applied");
            }
            other => panic!("expected policy rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_non_json_forbidden_keeps_text() {
        match ApiError::from_status(StatusCode::FORBIDDEN, "nope") {
            ApiError::PolicyRejection(Value::String(s)) => assert_eq!(s, "nope"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_auth());
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, "gone"),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::Server(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_token_endpoint_rejections_are_auth() {
        let body = r#"{"error":"invalid_grant","error_description":"code has already been used"}"#;
        assert!(ApiError::from_token_status(StatusCode::BAD_REQUEST, body).is_auth());
        assert!(ApiError::from_token_status(StatusCode::FORBIDDEN, body).is_auth());
        assert!(matches!(
            ApiError::from_token_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            ApiError::Server(_)
        ));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.contains("600 total bytes"));

        // Never splits a multi-byte character
        let cyrillic = "я".repeat(400);
        let truncated = ApiError::truncate_body(&cyrillic);
        assert!(truncated.contains("800 total bytes"));
    }
}
