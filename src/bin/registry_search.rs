//! Search the ProPublica Nonprofit Explorer API for foundation EINs.
//!
//! ```sh
//! registry_search --config propublica.yml
//! ```

use std::error::Error;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};

use foundation_grants::cli::ConfigArgs;
use foundation_grants::config::{RegistryConfig, load_yaml};
use foundation_grants::logging;
use foundation_grants::registry::run_registry_search;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let start_time = Instant::now();
    let args = ConfigArgs::parse();

    let cfg: RegistryConfig = load_yaml(&args.config).inspect_err(|e| {
        error!(path = %args.config.display(), error = %e, "Failed to load configuration");
    })?;

    let rows = run_registry_search(&cfg).await.inspect_err(|e| {
        error!(error = %e, "Registry search failed");
    })?;

    let elapsed = start_time.elapsed();
    info!(?elapsed, rows = rows.len(), output = %cfg.output_file.display(), "Execution complete");
    Ok(())
}
