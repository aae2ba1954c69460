//! Propose reference-institution matches for a rankings table.
//!
//! ```sh
//! match_names --config match_names.yml
//! ```

use std::error::Error;

use clap::Parser;
use tracing::{error, info};

use foundation_grants::cli::ConfigArgs;
use foundation_grants::config::{MatchConfig, load_yaml};
use foundation_grants::logging;
use foundation_grants::matching::match_names;

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let args = ConfigArgs::parse();

    let cfg: MatchConfig = load_yaml(&args.config).inspect_err(|e| {
        error!(path = %args.config.display(), error = %e, "Failed to load configuration");
    })?;
    let matched = match_names(&cfg).inspect_err(|e| error!(error = %e, "Name matching failed"))?;
    info!(rows = matched.height(), "Execution complete");
    Ok(())
}
