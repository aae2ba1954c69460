//! # Foundation Grants
//!
//! An offline ETL pipeline that collects foundation grant-making data and
//! assembles it into analysis-ready CSV files.
//!
//! ## Pipeline
//!
//! 1. **Registry search** (`registry_search`): query the ProPublica Nonprofit
//!    Explorer API for candidate foundation EINs.
//! 2. **EIN processing** (`process_eins`): normalise hand-reviewed EINs into a
//!    list for the portal scrape.
//! 3. **Portal scrape** (`fd_scrape`): drive a browser through Foundation
//!    Directory search results, one CSV per EIN.
//! 4. **Compile** (`compile_grants`): keep only rows where the EIN is the
//!    grantmaker, normalise recipient names, concatenate.
//! 5. **Merge** (`merge_grants`): join reference tables, adjust for inflation,
//!    compute adjacency flags and distances.
//!
//! `ca100_scrape` and `match_names` are independent helpers.

pub mod cli;
pub mod compile;
pub mod config;
pub mod ein;
pub mod error;
pub mod frame;
pub mod inflation;
pub mod logging;
pub mod matching;
pub mod merge;
pub mod models;
pub mod outputs;
pub mod registry;
pub mod scrapers;
pub mod spatial;
pub mod strings;
pub mod utils;
