use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FhirError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Pagination did not terminate within {0} pages")]
    PageLimitExceeded(usize),
}

/// Coarse classification used by the top-level handler when reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Protocol,
    Io,
    Runtime,
}

impl FhirError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FhirError::Configuration(_) | FhirError::InvalidUrl(_) => ErrorKind::Configuration,
            FhirError::HttpError(e) if e.is_decode() || e.is_status() => ErrorKind::Protocol,
            FhirError::HttpError(_) => ErrorKind::Transport,
            FhirError::UnexpectedStatus { .. } | FhirError::Decode { .. } => ErrorKind::Protocol,
            FhirError::IoError(_) => ErrorKind::Io,
            FhirError::JoinError(_) | FhirError::PageLimitExceeded(_) => ErrorKind::Runtime,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Io => "io",
            ErrorKind::Runtime => "runtime",
        };
        f.write_str(label)
    }
}

pub type Result<T> = std::result::Result<T, FhirError>;
