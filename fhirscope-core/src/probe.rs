// Latency probing across configured endpoints

use crate::endpoints::PreparedEndpoint;
use fhirscope_client::error::{FhirError, Result};
use fhirscope_client::AuthenticatedClient;
use reqwest::header::{HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub const NUMBER_OF_TRIES: usize = 5;
pub const CLIENT_ID_HEADER: &str = "bulk-clientid";
pub const CLIENT_ID: &str = "fhirscope";

/// Requests with a status at or above this fail the run.
const FAILURE_STATUS: u16 = 400;

/// Average latency of one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResult {
    pub path: String,
    pub avg_duration_millis: u64,
}

/// Options for configuring a probe run
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub tries: usize,
    /// Maximum number of endpoints probed at once. `None` probes all of them
    /// together.
    pub concurrency: Option<usize>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            tries: NUMBER_OF_TRIES,
            concurrency: None,
        }
    }
}

/// Called as each endpoint finishes
pub type ProbeProgressCallback = Arc<dyn Fn(&EndpointResult) + Send + Sync>;

/// Whole milliseconds of the mean duration, truncated.
pub fn average_millis(durations: &[Duration]) -> u64 {
    if durations.is_empty() {
        return 0;
    }
    let total: Duration = durations.iter().sum();
    (total.as_millis() / durations.len() as u128) as u64
}

/// Orders results by endpoint path.
pub fn sort_results(results: &mut [EndpointResult]) {
    results.sort_by(|a, b| a.path.cmp(&b.path));
}

/// Time `tries` sequential requests against one endpoint.
pub async fn measure_endpoint(
    client: &AuthenticatedClient,
    endpoint: &PreparedEndpoint,
    tries: usize,
) -> Result<EndpointResult> {
    let mut headers = endpoint.headers.clone();
    headers.insert(
        HeaderName::from_static(CLIENT_ID_HEADER),
        HeaderValue::from_static(CLIENT_ID),
    );

    let mut durations = Vec::with_capacity(tries);
    for trial in 1..=tries {
        let start = Instant::now();
        client
            .get(&endpoint.url, &headers)
            .await?
            .ensure_below(FAILURE_STATUS)?;
        let elapsed = start.elapsed();
        debug!("{} trial {}/{} took {:?}", endpoint.label, trial, tries, elapsed);
        durations.push(elapsed);
    }

    Ok(EndpointResult {
        path: endpoint.path.clone(),
        avg_duration_millis: average_millis(&durations),
    })
}

/// Probe every endpoint concurrently and return results sorted by path.
///
/// The first failure ends the run; workers still in flight are aborted.
pub async fn probe_endpoints(
    client: &AuthenticatedClient,
    endpoints: Vec<PreparedEndpoint>,
    options: &ProbeOptions,
    progress_callback: Option<ProbeProgressCallback>,
) -> Result<Vec<EndpointResult>> {
    if options.tries == 0 {
        return Err(FhirError::Configuration(
            "Number of tries must be at least 1".to_string(),
        ));
    }

    let total = endpoints.len();
    info!(
        "Probing {} endpoints with {} tries each",
        total, options.tries
    );

    let semaphore = options
        .concurrency
        .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

    let mut workers = JoinSet::new();
    for endpoint in endpoints {
        let client = client.clone();
        let semaphore = semaphore.clone();
        let tries = options.tries;

        workers.spawn(async move {
            let _permit = match semaphore {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            measure_endpoint(&client, &endpoint, tries).await
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = workers.join_next().await {
        let result = joined??;
        debug!(
            "{} averaged {} ms ({}/{})",
            result.path,
            result.avg_duration_millis,
            results.len() + 1,
            total
        );
        if let Some(ref callback) = progress_callback {
            callback(&result);
        }
        results.push(result);
    }

    sort_results(&mut results);
    Ok(results)
}
