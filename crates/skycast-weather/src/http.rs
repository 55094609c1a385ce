//! Shared reqwest-to-`FetchError` mapping for both provider clients.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use skycast_core::FetchError;

/// Classify a transport-level reqwest error.
pub fn fetch_error_from(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        return FetchError::Timeout;
    }
    FetchError::Network(error.to_string())
}

/// Map a non-success HTTP status to a `FetchError`.
///
/// 429 carries the server-advised wait from `Retry-After` when the header
/// holds whole seconds; HTTP-date forms are ignored and the caller falls
/// back to its normal backoff.
pub fn status_error(response: &Response) -> FetchError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return FetchError::RateLimited { retry_after };
    }
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return FetchError::Timeout;
    }
    FetchError::Network(format!("HTTP status {}", status))
}

/// Check the response status, producing the mapped error on failure.
pub fn check_status(response: Response) -> Result<Response, FetchError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let err = status_error(&response);
        tracing::debug!("Provider returned {}: {}", response.status(), err);
        Err(err)
    }
}
