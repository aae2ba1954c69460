//! Nonprofit registry search (ProPublica Nonprofit Explorer API).
//!
//! For each company search term up to three queries are issued:
//!
//! | Strategy | Query | Subsection |
//! |----------|-------|------------|
//! | [`SearchStrategy::Basic`] | `"term" -x -y` | 501(c)(3) |
//! | [`SearchStrategy::Foundation`] | `"term" Foundation -x -y` | 501(c)(3) |
//! | [`SearchStrategy::TradeAssociation`] | `"term" -x -y` | 501(c)(6) |
//!
//! A failed query never stops the run; the term is recorded with a
//! placeholder row so the gap shows up in the output.

use std::time::Duration;

use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::RegistryConfig;
use crate::error::PipelineError;
use crate::models::{RegistryRow, SearchStrategy};
use crate::outputs::csv::write_records_to_path;
use crate::frame::{is_truthy, read_csv, require_columns, strings, table_name, unique_first};

/// Column order of the registry output.
pub const REGISTRY_HEADERS: [&str; 11] = [
    "search_term",
    "full_name",
    "result_id",
    "ein",
    "name",
    "sub_name",
    "city",
    "state",
    "501c",
    "propublica_queried",
    "query",
];

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

/// One organization in a search response. The API sends EINs as numbers.
#[derive(Debug, Deserialize)]
pub struct Organization {
    pub ein: serde_json::Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sub_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl Organization {
    fn ein_string(&self) -> String {
        match &self.ein {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Full-text query for `term` under `strategy`, excluding `ignore` words.
pub fn build_query(term: &str, strategy: SearchStrategy, ignore: &[String]) -> String {
    let mut q = format!("\"{term}\"");
    if strategy == SearchStrategy::Foundation {
        q.push_str(" Foundation");
    }
    for word in ignore {
        q.push_str(" -");
        q.push_str(word);
    }
    q
}

pub fn http_client(timeout_seconds: u64) -> Result<Client, PipelineError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

/// Fetch up to `max_pages` pages of results for one query.
///
/// # Arguments
///
/// * `client` - HTTP client carrying the request timeout
/// * `api_root` - search endpoint, e.g. `https://projects.propublica.org/nonprofits/api/v2/search.json`
/// * `term` - company search term, quoted in the query
/// * `strategy` - picks the query suffix and the 501(c) subsection
/// * `ignore` - words excluded from the results
/// * `max_pages` - upper bound on zero-based `page` requests
///
/// # Returns
///
/// Every organization on the pages fetched, in response order, or the first
/// transport or decoding error.
#[instrument(level = "debug", skip(client, ignore))]
pub async fn query_organizations(
    client: &Client,
    api_root: &str,
    term: &str,
    strategy: SearchStrategy,
    ignore: &[String],
    max_pages: u32,
) -> Result<Vec<Organization>, PipelineError> {
    let q = build_query(term, strategy, ignore);
    let c_code = strategy.c_code().to_string();
    let mut organizations = Vec::new();
    let mut page = 0u32;
    loop {
        let page_param = page.to_string();
        let response: SearchResponse = client
            .get(api_root)
            .query(&[("q", q.as_str()), ("c_code[id]", c_code.as_str()), ("page", page_param.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(page, total_results = response.total_results, num_pages = response.num_pages, "Registry page");
        organizations.extend(response.organizations);
        page += 1;
        if page >= max_pages || page >= response.num_pages {
            break;
        }
    }
    Ok(organizations)
}

fn strategies(cfg: &RegistryConfig) -> Vec<SearchStrategy> {
    let mut out = vec![SearchStrategy::Basic];
    if cfg.test_just_foundation_first {
        out.push(SearchStrategy::Foundation);
    }
    if cfg.include_501c6 {
        out.push(SearchStrategy::TradeAssociation);
    }
    out
}

/// Rows for every organization a term's queries return, in strategy order.
pub async fn search_term(
    client: &Client,
    cfg: &RegistryConfig,
    input_row: usize,
    term: &str,
    full_name: &str,
) -> Vec<RegistryRow> {
    let mut rows = Vec::new();
    for strategy in strategies(cfg) {
        match query_organizations(client, &cfg.api_root, term, strategy, &cfg.ignore_results_with, cfg.max_pages).await {
            Ok(orgs) => {
                info!(%term, ?strategy, count = orgs.len(), "Registry results");
                rows.extend(orgs.iter().enumerate().map(|(i, org)| RegistryRow {
                    search_term: term.to_string(),
                    full_name: full_name.to_string(),
                    result_id: i,
                    ein: org.ein_string(),
                    name: org.name.clone().unwrap_or_default(),
                    sub_name: org.sub_name.clone().unwrap_or_default(),
                    city: org.city.clone().unwrap_or_default(),
                    state: org.state.clone().unwrap_or_default(),
                    c_code: strategy.c_code(),
                    propublica_queried: 1,
                    query: strategy,
                }));
            }
            Err(e) => {
                warn!(%term, ?strategy, error = %e, "Registry query failed; recording placeholder");
                rows.push(RegistryRow::placeholder(input_row, term, full_name));
            }
        }
    }
    rows
}

/// Keep the first row per EIN. Placeholder rows share the empty EIN, so
/// only the first of them survives.
pub fn dedup_by_ein(rows: Vec<RegistryRow>) -> Vec<RegistryRow> {
    rows.into_iter().unique_by(|r| r.ein.clone()).collect()
}

/// Run the search for every unique, enabled term in the search-string file.
///
/// # Arguments
///
/// * `client` - HTTP client used for every query
/// * `cfg` - input file, column names, strategies and paging
///
/// # Returns
///
/// One row per distinct EIN found, in term and strategy order. Terms not
/// marked for search, and queries that failed, contribute a placeholder row.
#[instrument(level = "info", skip_all, fields(input = %cfg.search_string_file.display()))]
pub async fn search_registry(client: &Client, cfg: &RegistryConfig) -> Result<Vec<RegistryRow>, PipelineError> {
    let terms = read_csv(&cfg.search_string_file)?;
    require_columns(
        &terms,
        &table_name(&cfg.search_string_file),
        &[&cfg.search_string_col, &cfg.company_col, &cfg.run_col],
    )?;
    let terms = unique_first(&terms, &cfg.search_string_col)?;
    let search_terms = strings(&terms, &cfg.search_string_col)?;
    let companies = strings(&terms, &cfg.company_col)?;
    let run_flags = strings(&terms, &cfg.run_col)?;

    let mut rows = Vec::new();
    for (i, ((term, full_name), run)) in search_terms.iter().zip(&companies).zip(&run_flags).enumerate() {
        if is_truthy(run) {
            rows.extend(search_term(client, cfg, i, term, full_name).await);
        } else {
            debug!(%term, "Term not marked for search");
            rows.push(RegistryRow::placeholder(i, term, full_name));
        }
    }

    let before = rows.len();
    let rows = dedup_by_ein(rows);
    info!(terms = terms.height(), rows = rows.len(), duplicates = before - rows.len(), "Registry search complete");
    Ok(rows)
}

/// [`search_registry`] and write the result to `cfg.output_file`.
pub async fn run_registry_search(cfg: &RegistryConfig) -> Result<Vec<RegistryRow>, PipelineError> {
    let client = http_client(cfg.request_timeout_seconds)?;
    let rows = search_registry(&client, cfg).await?;
    write_records_to_path(&rows, &REGISTRY_HEADERS, &cfg.output_file)?;
    Ok(rows)
}
