use reqwest::StatusCode;
use thiserror::Error;

/// Failures that make a single source unable to report earnings.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{0} is not set")]
    MissingConfig(&'static str),

    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Could not decode response: {0}")]
    Decode(String),
}

impl SourceError {
    /// Reads a non-success response into an `Http` error, keeping the body for logs.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = match response.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => format!("<unreadable body: {}>", err),
        };
        SourceError::Http { status, body }
    }
}

/// Returns the response when it is a success, otherwise an `Http` error.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(SourceError::from_response(response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            SourceError::MissingConfig("AD_MOB_ACCOUNT_ID").to_string(),
            "AD_MOB_ACCOUNT_ID is not set"
        );
        let err = SourceError::Http {
            status: StatusCode::UNAUTHORIZED,
            body: "{\"error\":\"invalid_grant\"}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 401 Unauthorized: {\"error\":\"invalid_grant\"}"
        );
    }
}
