//! Clean hand-reviewed registry results into the EIN list for `fd_scrape`.
//!
//! Prints a YAML fragment to paste under `eins:` and writes
//! `eins_for_fdo_query.csv` to the output directory.
//!
//! ```sh
//! process_eins --input reviewed.csv --output_dir .
//! ```

use std::error::Error;

use clap::Parser;
use tracing::error;

use foundation_grants::cli::ProcessEinsArgs;
use foundation_grants::logging;
use foundation_grants::matching::process_eins;
use foundation_grants::utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    let args = ProcessEinsArgs::parse();
    ensure_writable_dir(&args.output_dir).await?;

    let (_, lines) = process_eins(&args.input, &args.output_dir).inspect_err(|e| {
        error!(input = %args.input.display(), error = %e, "Failed to process EINs");
    })?;
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
