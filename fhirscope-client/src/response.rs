use crate::error::{FhirError, Result};
use reqwest::header::HeaderMap;
use std::time::Duration;

/// A fully-read HTTP response. The status is not checked on construction;
/// callers pick how strict they want to be.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

impl RawResponse {
    pub fn new(url: String, status: u16) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
            elapsed: Duration::from_secs(0),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fails unless the status is 2xx.
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.unexpected_status())
        }
    }

    /// Fails when the status is `limit` or above.
    pub fn ensure_below(self, limit: u16) -> Result<Self> {
        if self.status < limit {
            Ok(self)
        } else {
            Err(self.unexpected_status())
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|source| FhirError::Decode {
            url: self.url.clone(),
            source,
        })
    }

    fn unexpected_status(&self) -> FhirError {
        FhirError::UnexpectedStatus {
            url: self.url.clone(),
            status: self.status,
        }
    }
}
