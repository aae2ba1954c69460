//! Scrape Foundation Directory grant results for every EIN in a config.
//!
//! ```sh
//! fd_scrape --config fd_scrape.yml --output_dir ./raw
//! ```
//!
//! Runs a visible Chrome window (unless `headless: true`). When the site
//! shows its verification checkbox the terminal bell rings and the scrape
//! waits for someone to tick it.

use std::error::Error;
use std::io::Write;
use std::time::Instant;

use clap::Parser;
use tracing::{debug, error, info, warn};

use foundation_grants::cli::ScrapeArgs;
use foundation_grants::config::{ScrapeConfig, load_yaml};
use foundation_grants::error::ScrapeError;
use foundation_grants::logging;
use foundation_grants::scrapers::portal::{
    ChromeDriver, PortalScraper, PortalSettings, RunSummary, ScrapeEvent, run_scrape,
};
use foundation_grants::utils::ensure_writable_dir;

fn report(event: &ScrapeEvent, alert: bool) {
    match event {
        ScrapeEvent::LoggedIn { url } => debug!(%url, "Logged in"),
        ScrapeEvent::PagesCounted { ein, total_pages } => info!(%ein, total_pages, "Counted result pages"),
        ScrapeEvent::ChallengeDetected { ein, page } => {
            warn!(%ein, page, "Verification challenge is blocking the page; please tick the checkbox");
            if alert {
                let mut stderr = std::io::stderr();
                let _ = stderr.write_all(b"\x07");
                let _ = stderr.flush();
            }
        }
        ScrapeEvent::ChallengeCleared { ein, page } => info!(%ein, page, "Verification challenge cleared"),
        ScrapeEvent::ChallengeTimedOut { ein, page, waited } => {
            warn!(%ein, page, ?waited, "Challenge still showing; continuing to wait for results")
        }
        ScrapeEvent::PageScraped {
            ein,
            page,
            total_pages,
            rows,
        } => info!(%ein, page, total_pages, rows, "Scraped page"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let start_time = Instant::now();
    info!("fd_scrape starting up");

    let args = ScrapeArgs::parse();
    debug!(config = %args.config.display(), output_dir = %args.output_dir.display(), "Parsed CLI arguments");

    let cfg: ScrapeConfig = load_yaml(&args.config).inspect_err(|e| {
        error!(path = %args.config.display(), error = %e, "Failed to load configuration");
    })?;
    info!(eins = cfg.eins.len(), "Loaded configuration");

    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let output_dir = args.output_dir.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<RunSummary, ScrapeError> {
        let driver = ChromeDriver::launch(cfg.headless)?;
        let alert = cfg.alert_on_challenge;
        let mut scraper =
            PortalScraper::new(driver, PortalSettings::from(&cfg)).with_observer(move |e| report(e, alert));
        run_scrape(&mut scraper, &cfg, &output_dir)
    })
    .await?;

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, browser = e.is_browser_fault(), "Scrape aborted");
            return Err(e.into());
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        scraped = summary.scraped.len(),
        no_results = summary.no_results.len(),
        too_many_pages = summary.too_many_pages.len(),
        failed = summary.failed.len(),
        "Execution complete"
    );
    Ok(())
}
