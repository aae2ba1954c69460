//! Batch driver: log in once, search every configured EIN, write results.

use std::path::Path;

use tracing::{error, info, instrument, warn};

use super::{PortalDriver, PortalScraper, SearchOutcome};
use crate::config::ScrapeConfig;
use crate::ein::{company_slug, pad_ein};
use crate::error::ScrapeError;
use crate::outputs::csv::write_records_to_path;
use crate::outputs::followup::append_ein_list;

/// Column order of a per-EIN scrape file.
pub const GRANT_ROW_HEADERS: [&str; 10] = [
    "Grantmaker",
    "Recipient",
    "Recipient City",
    "Recipient State",
    "Recipient Country",
    "Primary Subject",
    "Year",
    "Grant Amount",
    "ein",
    "search_result_page",
];

/// What happened to each EIN in a run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    /// `(ein, rows written)` for every completed search.
    pub scraped: Vec<(String, usize)>,
    pub no_results: Vec<String>,
    pub too_many_pages: Vec<String>,
    /// Only populated with `continue_on_error`.
    pub failed: Vec<String>,
}

/// Scrape every EIN in `cfg` and write one CSV per EIN under `output_dir`.
///
/// By default the first failing EIN ends the run with its error. With
/// `continue_on_error` the failure is recorded and the next EIN is tried.
/// Either way the no-result and too-many-pages lists gathered so far are
/// persisted before returning, even when empty.
///
/// # Arguments
///
/// * `scraper` - engine over a browser driver; it is logged in here
/// * `cfg` - EINs to search, list file names and failure policy
/// * `output_dir` - where per-EIN CSVs and the lists are written
///
/// # Returns
///
/// What happened to each EIN, or the first scrape error. A failure to
/// write the lists after a scrape error is logged and the scrape error is
/// returned.
#[instrument(level = "info", skip_all, fields(eins = cfg.eins.len(), output_dir = %output_dir.display()))]
pub fn run_scrape<D: PortalDriver>(
    scraper: &mut PortalScraper<D>,
    cfg: &ScrapeConfig,
    output_dir: &Path,
) -> Result<RunSummary, ScrapeError> {
    scraper.login()?;

    let mut summary = RunSummary::default();
    let mut fatal = None;

    for entry in &cfg.eins {
        let ein = pad_ein(&entry.ein);
        match scrape_one(scraper, &entry.name, &ein, cfg, output_dir) {
            Ok(SearchOutcome::NoResults) => summary.no_results.push(ein),
            Ok(SearchOutcome::TooManyPages { .. }) => summary.too_many_pages.push(ein),
            Ok(SearchOutcome::Complete(rows)) => summary.scraped.push((ein, rows.len())),
            Err(e) if cfg.continue_on_error => {
                error!(%ein, name = %entry.name, error = %e, "Scrape failed; continuing");
                summary.failed.push(ein);
            }
            Err(e) => {
                error!(%ein, name = %entry.name, error = %e, "Scrape failed; stopping run");
                fatal = Some(e);
                break;
            }
        }
    }

    if let Some(e) = fatal {
        if let Err(persist_err) = persist_lists(&summary, cfg, output_dir) {
            error!(error = %persist_err, "Could not write EIN lists after failed run");
        }
        return Err(e);
    }
    persist_lists(&summary, cfg, output_dir)?;

    info!(
        scraped = summary.scraped.len(),
        no_results = summary.no_results.len(),
        too_many_pages = summary.too_many_pages.len(),
        failed = summary.failed.len(),
        "Scrape run finished"
    );
    if !summary.failed.is_empty() {
        warn!(failed = ?summary.failed, "Some EINs failed");
    }
    Ok(summary)
}

fn scrape_one<D: PortalDriver>(
    scraper: &mut PortalScraper<D>,
    name: &str,
    ein: &str,
    cfg: &ScrapeConfig,
    output_dir: &Path,
) -> Result<SearchOutcome, ScrapeError> {
    let outcome = scraper.search(ein)?;
    if let SearchOutcome::Complete(rows) = &outcome {
        let path = output_dir.join(format!("{}_{}{}", company_slug(name), ein, cfg.suffix));
        write_records_to_path(rows, &GRANT_ROW_HEADERS, &path)?;
    }
    Ok(outcome)
}

fn persist_lists(summary: &RunSummary, cfg: &ScrapeConfig, output_dir: &Path) -> Result<(), ScrapeError> {
    append_ein_list(&summary.no_results, &output_dir.join(&cfg.no_grants_for_ein))?;
    append_ein_list(&summary.too_many_pages, &output_dir.join(&cfg.more_than_100))?;
    if let Some(failed_file) = &cfg.failed_eins {
        append_ein_list(&summary.failed, &output_dir.join(failed_file))?;
    }
    Ok(())
}
