// Endpoints document loading and header parsing for the latency prober

use fhirscope_client::error::{FhirError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// One endpoint as written in the endpoints document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointSpec {
    #[serde(alias = "name")]
    pub label: String,
    pub path: String,
    /// `"Name: value"` strings, applied in order
    #[serde(default)]
    pub headers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EndpointsDocument {
    pub endpoints: Vec<EndpointSpec>,
}

/// A validated endpoint ready to be probed
#[derive(Debug, Clone)]
pub struct PreparedEndpoint {
    pub label: String,
    pub path: String,
    pub url: String,
    pub headers: HeaderMap,
}

/// Parse endpoints from the JSON text of an endpoints document
pub fn parse_endpoints(content: &str) -> Result<Vec<EndpointSpec>> {
    let document: EndpointsDocument = serde_json::from_str(content)
        .map_err(|e| FhirError::Configuration(format!("Malformed endpoints document: {}", e)))?;

    if document.endpoints.is_empty() {
        warn!("Endpoints document lists no endpoints; the report will be empty");
    }

    Ok(document.endpoints)
}

/// Load endpoints from a file
pub fn load_endpoints(path: &Path) -> Result<Vec<EndpointSpec>> {
    let content = fs::read_to_string(path).map_err(|e| {
        FhirError::Configuration(format!(
            "Failed to read endpoints file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_endpoints(&content)
}

/// Splits a `"Name: value"` header string on `:`.
///
/// Exactly one colon is allowed. The value is returned as written, leading
/// space included.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 2 {
        return Err(FhirError::Configuration(format!(
            "Malformed header '{}': expected exactly one ':'",
            raw
        )));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Turns configured header strings into a header map. Values are trimmed
/// before they go on the wire.
pub fn build_header_map(raw_headers: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for raw in raw_headers {
        let (name, value) = parse_header(raw)?;
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
            FhirError::Configuration(format!("Invalid header name in '{}': {}", raw, e))
        })?;
        let value = HeaderValue::from_str(value.trim()).map_err(|e| {
            FhirError::Configuration(format!("Invalid header value in '{}': {}", raw, e))
        })?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// Validates every endpoint up front so configuration mistakes surface
/// before any request is sent. URLs are `base_url + path`, concatenated.
pub fn prepare_endpoints(base_url: &str, specs: &[EndpointSpec]) -> Result<Vec<PreparedEndpoint>> {
    specs
        .iter()
        .map(|spec| {
            let url = format!("{}{}", base_url, spec.path);
            url::Url::parse(&url)
                .map_err(|e| FhirError::InvalidUrl(format!("{} ({}): {}", url, spec.label, e)))?;
            Ok(PreparedEndpoint {
                label: spec.label.clone(),
                path: spec.path.clone(),
                url,
                headers: build_header_map(&spec.headers)?,
            })
        })
        .collect()
}
