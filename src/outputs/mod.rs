//! Output writers for CSV tables and persisted follow-up lists.
//!
//! # Submodules
//!
//! - [`csv`]: serialise record slices to CSV, header included even when empty
//! - [`followup`]: YAML lists of EINs that need manual attention
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── exxonmobil_foundation_136083566.csv   # one file per scraped EIN
//! ├── more_than_100.yml                      # EINs over the page ceiling
//! ├── no_grants_for_ein.yml                  # EINs with no results
//! └── failed_eins.yml                        # only with continue_on_error
//! ```

pub mod csv;
pub mod followup;
