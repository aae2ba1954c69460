//! Compile per-EIN scrape files into one grants CSV.
//!
//! ```sh
//! compile_grants --config compile.yml
//! ```

use std::error::Error;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};

use foundation_grants::cli::ConfigArgs;
use foundation_grants::compile::compile_grants;
use foundation_grants::config::{CompileConfig, load_yaml};
use foundation_grants::logging;

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let start_time = Instant::now();
    let args = ConfigArgs::parse();

    let cfg: CompileConfig = load_yaml(&args.config).inspect_err(|e| {
        error!(path = %args.config.display(), error = %e, "Failed to load configuration");
    })?;
    let grants = compile_grants(&cfg).inspect_err(|e| error!(error = %e, "Compile failed"))?;

    info!(elapsed = ?start_time.elapsed(), rows = grants.len(), "Execution complete");
    Ok(())
}
