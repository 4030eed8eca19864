use crate::error::{FhirError, Result};
use crate::response::RawResponse;
use reqwest::header::HeaderMap;
use reqwest::{Client, Identity};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub const USER_AGENT: &str = concat!("fhirscope/", env!("CARGO_PKG_VERSION"));

/// Settings used to build an [`AuthenticatedClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    identity_pem: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single PEM buffer holding both the client certificate chain and its
    /// private key.
    pub fn with_identity_pem(mut self, pem: Vec<u8>) -> Self {
        self.identity_pem = Some(pem);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// GET-only HTTP client that presents a client certificate and skips server
/// certificate verification.
///
/// Verification is off because the targets are internal test environments
/// whose chains this tool does not validate. Do not point it at anything
/// whose identity matters.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    client: Client,
}

impl AuthenticatedClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60));

        if let Some(ref pem) = config.identity_pem {
            let identity = Identity::from_pem(pem).map_err(|e| {
                FhirError::Configuration(format!("Invalid client certificate/key: {}", e))
            })?;
            builder = builder.identity(identity);
        } else {
            warn!("No client certificate configured; requests will not use mutual TLS");
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            FhirError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::new(ClientConfig::new().with_identity_pem(pem.to_vec()))
    }

    /// Reads a combined certificate+key PEM file and builds a client from it.
    pub fn from_pem_file(path: &Path, timeout: Option<Duration>) -> Result<Self> {
        let pem = std::fs::read(path).map_err(|e| {
            FhirError::Configuration(format!(
                "Failed to read client certificate {}: {}",
                path.display(),
                e
            ))
        })?;
        info!("Loaded client certificate from {}", path.display());

        let mut config = ClientConfig::new().with_identity_pem(pem);
        if let Some(timeout) = timeout {
            config = config.with_timeout(timeout);
        }
        Self::new(config)
    }

    /// Same transport settings, no client certificate. Useful against
    /// plain-HTTP servers.
    pub fn without_identity() -> Result<Self> {
        Self::new(ClientConfig::new())
    }

    /// Issues a GET and reads the whole body. Any status is returned as-is;
    /// only transport failures and malformed URLs are errors here.
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<RawResponse> {
        let parsed =
            Url::parse(url).map_err(|e| FhirError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!("GET {}", parsed);
        let start = Instant::now();
        let response = self
            .client
            .get(parsed)
            .headers(headers.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let response_headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        let elapsed = start.elapsed();
        debug!("{} {} ({} bytes in {:?})", status, url, body.len(), elapsed);

        let mut raw = RawResponse::new(url.to_string(), status);
        raw.headers = response_headers;
        raw.body = body;
        raw.elapsed = elapsed;
        Ok(raw)
    }
}
