// Cursor walking over the Patient search endpoint

use fhirscope_client::error::{FhirError, Result};
use fhirscope_client::{AuthenticatedClient, RawResponse};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const PATIENT_SEARCH_PATH: &str = "/v1/fhir/Patient";
pub const PAGE_SIZE: usize = 500;
pub const NEXT_RELATION: &str = "next";
pub const CURSOR_PARAM: &str = "cursor";

const CONTRACT_EXTENSION_PARAM: &str = "_has:Coverage.extension";
const REFERENCE_YEAR_PARAM: &str = "_has:Coverage.rfrncyr";
const CONTRACT_VARIABLE_BASE: &str = "https://bluebutton.cms.gov/resources/variables/ptdcntrct";
const REFERENCE_YEAR_VARIABLE: &str = "https://bluebutton.cms.gov/resources/variables/rfrnc_yr";

/// Options for a cursor walk
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Scheme and authority of the target, e.g. `https://host:443`
    pub base_url: String,
    pub contract_id: String,
    /// Contract month, `1` through `12`
    pub contract_month: u8,
    pub reference_year: Option<String>,
    /// Abort once this many pages were fetched without reaching the end.
    /// `None` walks until the server stops returning a next link.
    pub page_limit: Option<usize>,
}

impl WalkOptions {
    pub fn new(
        base_url: impl Into<String>,
        contract_id: impl Into<String>,
        contract_month: u8,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            contract_id: contract_id.into(),
            contract_month,
            reference_year: None,
            page_limit: None,
        }
    }

    /// `https://{host}:{port}`
    pub fn for_host(
        host: &str,
        port: u16,
        contract_id: impl Into<String>,
        contract_month: u8,
    ) -> Self {
        Self::new(format!("https://{}:{}", host, port), contract_id, contract_month)
    }

    pub fn with_reference_year(mut self, year: impl Into<String>) -> Self {
        self.reference_year = Some(year.into());
        self
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }
}

/// One entry of a search bundle's `link` array
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageLink {
    pub relation: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SearchBundle {
    #[serde(default)]
    link: Vec<PageLink>,
}

/// Outcome of a walk that reached the last page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub cursors: Vec<String>,
    pub pages: usize,
}

/// Called after every page with (pages fetched, cursors found)
pub type WalkProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Validates a month setting such as `"3"` or `"03"`.
pub fn parse_contract_month(raw: &str) -> Result<u8> {
    let month: u8 = raw
        .trim()
        .parse()
        .map_err(|_| FhirError::Configuration(format!("Invalid contract month '{}'", raw)))?;
    if !(1..=12).contains(&month) {
        return Err(FhirError::Configuration(format!(
            "Contract month must be between 1 and 12, got {}",
            month
        )));
    }
    Ok(month)
}

/// Builds the search URL for one page. An empty cursor means the first page.
pub fn build_page_url(options: &WalkOptions, cursor: &str) -> Result<Url> {
    let base = Url::parse(&options.base_url)
        .map_err(|e| FhirError::InvalidUrl(format!("{}: {}", options.base_url, e)))?;
    let mut url = base
        .join(PATIENT_SEARCH_PATH)
        .map_err(|e| FhirError::InvalidUrl(format!("{}: {}", options.base_url, e)))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair(
            CONTRACT_EXTENSION_PARAM,
            &format!(
                "{}{:02}|{}",
                CONTRACT_VARIABLE_BASE, options.contract_month, options.contract_id
            ),
        );
        if let Some(ref year) = options.reference_year {
            query.append_pair(
                REFERENCE_YEAR_PARAM,
                &format!("{}|{}", REFERENCE_YEAR_VARIABLE, year),
            );
        }
        query.append_pair("_count", &PAGE_SIZE.to_string());
        query.append_pair("_format", "json");
        if !cursor.is_empty() {
            query.append_pair(CURSOR_PARAM, cursor);
        }
    }

    Ok(url)
}

/// Decodes the `link` array of a search response.
pub fn parse_page_links(response: &RawResponse) -> Result<Vec<PageLink>> {
    Ok(response.json::<SearchBundle>()?.link)
}

pub fn has_next_link(links: &[PageLink]) -> bool {
    links.iter().any(|link| link.relation == NEXT_RELATION)
}

/// Reads the `cursor` query parameter of a link. Relative links resolve
/// against `page_url`. A missing parameter yields an empty string.
pub fn extract_cursor(link_url: &str, page_url: &Url) -> Result<String> {
    let resolved = page_url
        .join(link_url)
        .map_err(|e| FhirError::InvalidUrl(format!("{}: {}", link_url, e)))?;

    Ok(resolved
        .query_pairs()
        .find(|(key, _)| key == CURSOR_PARAM)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default())
}

/// Follows next links until a page has none, writing each non-empty cursor
/// to `log` as one line.
///
/// A next link without a cursor keeps the walk going and sends the first
/// page request again. Without a `page_limit` that repeats for as long as
/// the server keeps answering the same way.
pub async fn walk_cursors<W: Write>(
    client: &AuthenticatedClient,
    options: &WalkOptions,
    log: &mut W,
    progress_callback: Option<WalkProgressCallback>,
) -> Result<WalkSummary> {
    info!(
        "Walking cursors for contract {} month {:02}",
        options.contract_id, options.contract_month
    );

    let headers = HeaderMap::new();
    let mut summary = WalkSummary::default();
    let mut cursor = String::new();

    loop {
        if let Some(limit) = options.page_limit
            && summary.pages >= limit
        {
            return Err(FhirError::PageLimitExceeded(limit));
        }

        let page_url = build_page_url(options, &cursor)?;
        let response = client
            .get(page_url.as_str(), &headers)
            .await?
            .ensure_success()?;
        summary.pages += 1;
        debug!(
            "Page {} fetched in {:?} ({})",
            summary.pages,
            response.elapsed,
            response.content_type().unwrap_or("no content type")
        );

        let links = parse_page_links(&response)?;
        let has_next = has_next_link(&links);

        for link in links.iter().filter(|l| l.relation == NEXT_RELATION) {
            cursor = extract_cursor(&link.url, &page_url)?;
            if cursor.is_empty() {
                warn!(
                    "Next link without a cursor on page {}; the first page will be requested again",
                    summary.pages
                );
                continue;
            }
            writeln!(log, "{}", cursor)?;
            log.flush()?;
            summary.cursors.push(cursor.clone());
        }

        if let Some(ref callback) = progress_callback {
            callback(summary.pages, summary.cursors.len());
        }

        if !has_next {
            break;
        }
    }

    info!(
        "Walk complete: {} pages, {} cursors",
        summary.pages,
        summary.cursors.len()
    );
    Ok(summary)
}
