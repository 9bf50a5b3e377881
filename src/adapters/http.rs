//! Shared request plumbing for the HTTP adapters
//!
//! Rate-limited requests back off exponentially, server errors and
//! transport failures back off linearly. Client errors return at once.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::RateLimited => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// Send `request`, retrying up to `max_retries` attempts in total
pub async fn send_with_retry(request: RequestBuilder, max_retries: u32) -> Result<Response, HttpError> {
    let attempts = max_retries.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        let req = request
            .try_clone()
            .ok_or_else(|| HttpError::Transport("request body cannot be retried".into()))?;

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let backoff = Duration::from_secs(2u64.pow(attempt + 1));
                    tracing::warn!(
                        "Rate limited (429), backing off for {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        attempts
                    );
                    last_error = Some(HttpError::RateLimited);
                    tokio::time::sleep(backoff).await;
                    continue;
                }

                if status.is_server_error() {
                    tracing::debug!("Server error {} (attempt {}/{})", status, attempt + 1, attempts);
                    last_error = Some(HttpError::Status {
                        status: status.as_u16(),
                        body: status.canonical_reason().unwrap_or_default().to_string(),
                    });
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                    continue;
                }

                return Ok(response);
            }
            Err(e) => {
                tracing::debug!("Transport error (attempt {}/{}): {}", attempt + 1, attempts, e);
                last_error = Some(HttpError::Transport(e.to_string()));
                tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| HttpError::Transport("Max retries exceeded".into())))
}

/// Map a non-success status to `HttpError::Status` and decode the body
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, HttpError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(HttpError::RateLimited);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HttpError::Status { status: status.as_u16(), body });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| HttpError::Decode(e.to_string()))
}
