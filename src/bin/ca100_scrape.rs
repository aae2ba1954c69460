//! Collect the Climate Action 100+ focus company list.
//!
//! ```sh
//! ca100_scrape --output ca100_companies.csv
//! ```

use std::error::Error;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};

use foundation_grants::cli::Ca100Args;
use foundation_grants::logging;
use foundation_grants::outputs::csv::write_records_to_path;
use foundation_grants::scrapers::ca100::{http_client, scrape_companies};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let start_time = Instant::now();
    let args = Ca100Args::parse();

    let client = http_client()?;
    let companies = scrape_companies(&client, &args.base_url).await.inspect_err(|e| {
        error!(base_url = %args.base_url, error = %e, "CA100 scrape failed");
    })?;
    write_records_to_path(&companies, &["company", "ca100_sector"], &args.output)?;

    info!(elapsed = ?start_time.elapsed(), companies = companies.len(), "Execution complete");
    Ok(())
}
