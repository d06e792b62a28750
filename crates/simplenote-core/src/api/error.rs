use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    Unprocessable(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

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

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(truncated),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            409 => ApiError::Conflict(truncated),
            422 => ApiError::Unprocessable(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(format!("Status {}: {}", status, truncated)),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn network(err: impl std::fmt::Display) -> Self {
        ApiError::NetworkError(err.to_string())
    }

    /// True for failures where the server was never reached
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(ApiError::from_status(StatusCode::BAD_REQUEST, ""), ApiError::BadRequest(_)));
        assert!(matches!(ApiError::from_status(StatusCode::UNAUTHORIZED, "x"), ApiError::Unauthorized));
        assert!(matches!(ApiError::from_status(StatusCode::CONFLICT, ""), ApiError::Conflict(_)));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, ""),
            ApiError::Unprocessable(_)
        ));
        assert!(matches!(ApiError::from_status(StatusCode::BAD_GATEWAY, ""), ApiError::ServerError(_)));
        assert!(matches!(ApiError::from_status(StatusCode::IM_A_TEAPOT, ""), ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert!(ApiError::truncate_body("short").eq("short"));
    }
}
