//! Merge compiled grants with reference tables into the analysis dataset.
//!
//! ```sh
//! merge_grants --config merge_data.yml
//! ```

use std::error::Error;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};

use foundation_grants::cli::ConfigArgs;
use foundation_grants::config::{MergeConfig, load_yaml};
use foundation_grants::logging;
use foundation_grants::merge::run_merge;

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let start_time = Instant::now();
    let args = ConfigArgs::parse();

    let cfg: MergeConfig = load_yaml(&args.config).inspect_err(|e| {
        error!(path = %args.config.display(), error = %e, "Failed to load configuration");
    })?;
    let merged = run_merge(&cfg).inspect_err(|e| error!(error = %e, "Merge failed"))?;

    info!(elapsed = ?start_time.elapsed(), rows = merged.height(), "Execution complete");
    Ok(())
}
