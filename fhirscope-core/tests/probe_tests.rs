// Tests for latency probing

use fhirscope_client::{AuthenticatedClient, FhirError};
use fhirscope_core::endpoints::{
    EndpointSpec, load_endpoints, parse_endpoints, parse_header, prepare_endpoints,
};
use fhirscope_core::probe::{
    EndpointResult, NUMBER_OF_TRIES, ProbeOptions, average_millis, probe_endpoints, sort_results,
};
use fhirscope_core::report::generate_latency_report;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn client() -> AuthenticatedClient {
    AuthenticatedClient::without_identity().unwrap()
}

fn spec(label: &str, path: &str, headers: &[&str]) -> EndpointSpec {
    EndpointSpec {
        label: label.to_string(),
        path: path.to_string(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
    }
}

fn millis(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|v| Duration::from_millis(*v)).collect()
}

// ============================================================================
// Header Parsing Tests
// ============================================================================

#[test]
fn test_parse_header_authorization() {
    let (name, value) = parse_header("Authorization: Bearer xyz").unwrap();
    assert_eq!(name, "Authorization");
    assert_eq!(value, " Bearer xyz");
}

#[test]
fn test_parse_header_without_colon() {
    let result = parse_header("NoColonHere");
    assert!(matches!(result, Err(FhirError::Configuration(_))));
}

#[test]
fn test_parse_header_with_extra_colons() {
    assert!(parse_header("X-Time: 12:30").is_err());
    assert!(parse_header("a:b:c").is_err());
}

#[test]
fn test_parse_header_empty_value() {
    let (name, value) = parse_header("X-Empty:").unwrap();
    assert_eq!(name, "X-Empty");
    assert_eq!(value, "");
}

#[test]
fn test_prepare_endpoints_rejects_malformed_header() {
    let specs = vec![
        spec("good", "/v1/fhir/Patient", &["IncludeIdentifiers: true"]),
        spec("bad", "/v1/fhir/Coverage", &["NoColonHere"]),
    ];
    let result = prepare_endpoints("https://fhir.example.com", &specs);
    assert!(matches!(result, Err(FhirError::Configuration(_))));
}

#[test]
fn test_prepare_endpoints_rejects_invalid_header_name() {
    let specs = vec![spec("bad", "/x", &["Bad Name: value"])];
    let result = prepare_endpoints("https://fhir.example.com", &specs);
    assert!(matches!(result, Err(FhirError::Configuration(_))));
}

#[test]
fn test_prepare_endpoints_concatenates_url() {
    let specs = vec![spec("eob", "/v2/fhir/ExplanationOfBenefit?patient=1", &[])];
    let prepared = prepare_endpoints("https://fhir.example.com:7443", &specs).unwrap();
    assert_eq!(
        prepared[0].url,
        "https://fhir.example.com:7443/v2/fhir/ExplanationOfBenefit?patient=1"
    );
    assert_eq!(prepared[0].label, "eob");
}

// ============================================================================
// Endpoints Document Tests
// ============================================================================

#[test]
fn test_load_endpoints_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("endpoints.json");
    fs::write(
        &file,
        r#"{
            "endpoints": [
                { "label": "patient", "path": "/v1/fhir/Patient?_id=1", "headers": ["IncludeIdentifiers: mbi"] },
                { "label": "coverage", "path": "/v1/fhir/Coverage?beneficiary=1" }
            ]
        }"#,
    )?;

    let specs = load_endpoints(&file)?;
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].headers, vec!["IncludeIdentifiers: mbi".to_string()]);
    assert!(specs[1].headers.is_empty());
    Ok(())
}

#[test]
fn test_load_endpoints_missing_file() {
    let result = load_endpoints(std::path::Path::new("/nonexistent/endpoints.json"));
    assert!(matches!(result, Err(FhirError::Configuration(_))));
}

#[test]
fn test_parse_endpoints_malformed() {
    assert!(parse_endpoints("endpoints: []").is_err());
    assert!(parse_endpoints(r#"{"endpoints": [{"label": "x"}]}"#).is_err());
}

#[tokio::test]
async fn test_empty_endpoints_document_gives_header_only_report() {
    let specs = parse_endpoints(r#"{"endpoints": []}"#).unwrap();
    assert!(specs.is_empty());

    let endpoints = prepare_endpoints("https://fhir.example.com", &specs).unwrap();
    let results = probe_endpoints(&client(), endpoints, &ProbeOptions::default(), None)
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(generate_latency_report(&results), "Avg(ms)\tEndpoint\n");
}

// ============================================================================
// Averaging and Ordering Tests
// ============================================================================

#[test]
fn test_average_even() {
    assert_eq!(average_millis(&millis(&[10, 20, 30, 40, 50])), 30);
}

#[test]
fn test_average_truncates() {
    assert_eq!(average_millis(&millis(&[1, 1, 1, 1, 2])), 1);
}

#[test]
fn test_average_sums_before_truncating() {
    let durations = vec![Duration::from_micros(1_600); 5];
    assert_eq!(average_millis(&durations), 1);
    let durations = vec![Duration::from_micros(999), Duration::from_micros(1_001)];
    assert_eq!(average_millis(&durations), 1);
}

#[test]
fn test_average_empty() {
    assert_eq!(average_millis(&[]), 0);
}

#[test]
fn test_sort_results_by_path() {
    let mut results = vec![
        EndpointResult { path: "/z".to_string(), avg_duration_millis: 1 },
        EndpointResult { path: "/a".to_string(), avg_duration_millis: 2 },
        EndpointResult { path: "/m".to_string(), avg_duration_millis: 3 },
    ];
    sort_results(&mut results);
    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/a", "/m", "/z"]);
}

// ============================================================================
// Probe Tests
// ============================================================================

#[tokio::test]
async fn test_probe_sends_headers_each_trial() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/fhir/Patient"))
        .and(header("authorization", "Bearer xyz"))
        .and(header("bulk-clientid", "fhirscope"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(NUMBER_OF_TRIES as u64)
        .mount(&server)
        .await;

    let specs = vec![spec("patient", "/v1/fhir/Patient", &["Authorization: Bearer xyz"])];
    let endpoints = prepare_endpoints(&server.uri(), &specs).unwrap();

    let results = probe_endpoints(&client(), endpoints, &ProbeOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path, "/v1/fhir/Patient");
}

#[tokio::test]
async fn test_probe_measures_delay() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(40)))
        .mount(&server)
        .await;

    let endpoints = prepare_endpoints(&server.uri(), &[spec("slow", "/slow", &[])]).unwrap();
    let options = ProbeOptions { tries: 2, concurrency: None };

    let results = probe_endpoints(&client(), endpoints, &options, None)
        .await
        .unwrap();

    assert!(results[0].avg_duration_millis >= 40);
}

#[tokio::test]
async fn test_probe_report_sorted_regardless_of_completion_order() {
    let server = MockServer::start().await;

    for (p, delay) in [("/z", 0u64), ("/a", 120), ("/m", 60)] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(delay)))
            .mount(&server)
            .await;
    }

    let specs = vec![spec("z", "/z", &[]), spec("a", "/a", &[]), spec("m", "/m", &[])];
    let endpoints = prepare_endpoints(&server.uri(), &specs).unwrap();

    let completed = Arc::new(Mutex::new(Vec::new()));
    let completed_clone = completed.clone();
    let options = ProbeOptions { tries: 1, concurrency: None };

    let results = probe_endpoints(
        &client(),
        endpoints,
        &options,
        Some(Arc::new(move |result: &EndpointResult| {
            completed_clone.lock().unwrap().push(result.path.clone());
        })),
    )
    .await
    .unwrap();

    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/a", "/m", "/z"]);
    assert_eq!(completed.lock().unwrap().first().map(String::as_str), Some("/z"));

    let report = generate_latency_report(&results);
    let rows: Vec<&str> = report.lines().collect();
    assert_eq!(rows[0], "Avg(ms)\tEndpoint");
    assert!(rows[1].ends_with("\t/a"));
    assert!(rows[2].ends_with("\t/m"));
    assert!(rows[3].ends_with("\t/z"));
}

#[tokio::test]
async fn test_probe_fails_fast_on_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let specs = vec![spec("ok", "/ok", &[]), spec("broken", "/broken", &[])];
    let endpoints = prepare_endpoints(&server.uri(), &specs).unwrap();

    let result = probe_endpoints(&client(), endpoints, &ProbeOptions::default(), None).await;

    match result {
        Err(FhirError::UnexpectedStatus { status, url }) => {
            assert_eq!(status, 500);
            assert!(url.ends_with("/broken"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_probe_rejects_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let endpoints = prepare_endpoints(&server.uri(), &[spec("missing", "/missing", &[])]).unwrap();
    let result = probe_endpoints(&client(), endpoints, &ProbeOptions::default(), None).await;
    assert!(matches!(result, Err(FhirError::UnexpectedStatus { status: 404, .. })));
}

#[tokio::test]
async fn test_probe_with_concurrency_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(50)))
        .expect(6)
        .mount(&server)
        .await;

    let specs = vec![spec("a", "/a", &[]), spec("b", "/b", &[]), spec("c", "/c", &[])];
    let endpoints = prepare_endpoints(&server.uri(), &specs).unwrap();
    let options = ProbeOptions { tries: 2, concurrency: Some(1) };

    let start = Instant::now();
    let results = probe_endpoints(&client(), endpoints, &options, None)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 3);
    // One endpoint at a time: six 50ms requests back to back
    assert!(elapsed >= Duration::from_millis(300), "finished in {:?}", elapsed);
    for result in &results {
        assert!(result.avg_duration_millis >= 50);
    }
}

#[tokio::test]
async fn test_probe_rejects_zero_tries() {
    let options = ProbeOptions { tries: 0, concurrency: None };
    let result = probe_endpoints(&client(), Vec::new(), &options, None).await;
    assert!(matches!(result, Err(FhirError::Configuration(_))));
}
