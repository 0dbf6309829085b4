use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected status: {0}")]
    UnexpectedStatus(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
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
            401 => FetchError::Unauthorized,
            403 => FetchError::AccessDenied(truncated),
            404 => FetchError::NotFound(truncated),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::UnexpectedStatus(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True when no HTTP response was received at all.
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::NetworkFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            FetchError::from_status(StatusCode::UNAUTHORIZED, ""),
            FetchError::Unauthorized
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::NOT_FOUND, "gone"),
            FetchError::NotFound(body) if body == "gone"
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            FetchError::ServerError(_)
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::IM_A_TEAPOT, ""),
            FetchError::UnexpectedStatus(_)
        ));
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(400);
        let truncated = FetchError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert!(FetchError::truncate_body("short") == "short");
    }
}
