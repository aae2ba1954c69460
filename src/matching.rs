//! Record-matching helpers that prepare inputs for manual review.
//!
//! - [`process_eins`] turns hand-reviewed registry results into the EIN
//!   list the portal scrape consumes.
//! - [`match_names`] proposes a reference (Carnegie) institution for every
//!   name in a rankings table.

use std::path::Path;

use itertools::Itertools;
use polars::prelude::DataFrame;
use tracing::{debug, info, instrument};

use crate::config::MatchConfig;
use crate::ein::{pad_ein, search_term_key};
use crate::error::PipelineError;
use crate::frame::{
    map_strings, read_csv, rename_columns, require_columns, set_strings, sort_by, strings, table_name, unique_first,
    write_csv,
};
use crate::strings::similar_strings;

/// File written by [`process_eins`] under the output directory.
pub const EIN_QUERY_FILE: &str = "eins_for_fdo_query.csv";

/// Pad, dedup by EIN, and sort by search term.
///
/// # Arguments
///
/// * `input` - hand-reviewed registry results with `ein` and `search_term`
/// * `output_dir` - where [`EIN_QUERY_FILE`] is written
///
/// # Returns
///
/// The cleaned table along with one ` - key : 'ein'` line per row, ready to
/// paste into a scrape config's `eins:` list.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn process_eins(input: &Path, output_dir: &Path) -> Result<(DataFrame, Vec<String>), PipelineError> {
    let mut eins = read_csv(input)?;
    require_columns(&eins, &table_name(input), &["ein", "search_term"])?;
    map_strings(&mut eins, "ein", pad_ein)?;
    let eins = unique_first(&eins, "ein")?;
    let mut eins = sort_by(&eins, "search_term")?;

    let lines = strings(&eins, "search_term")?
        .iter()
        .zip(strings(&eins, "ein")?)
        .map(|(term, ein)| format!(" - {} : '{}'", search_term_key(term), ein))
        .collect();

    write_csv(&mut eins, &output_dir.join(EIN_QUERY_FILE))?;
    info!(rows = eins.height(), "Wrote EIN query list");
    Ok((eins, lines))
}

/// Text before the first occurrence of `marker`, or all of it.
pub fn strip_after<'a>(name: &'a str, marker: &str) -> &'a str {
    if marker.is_empty() {
        return name;
    }
    name.split(marker).next().unwrap_or(name)
}

/// Unique reference names, in file order, whose filter column is positive.
pub fn reference_candidates(reference: &DataFrame, cfg: &MatchConfig) -> Result<Vec<String>, PipelineError> {
    let table = table_name(&cfg.reference_file);
    let mut required = vec![cfg.reference_name_col.as_str()];
    if let Some(filter) = &cfg.reference_filter_col {
        required.push(filter);
    }
    require_columns(reference, &table, &required)?;

    let names = strings(reference, &cfg.reference_name_col)?;
    let keep: Vec<bool> = match &cfg.reference_filter_col {
        Some(col) => strings(reference, col)?
            .iter()
            .map(|v| v.trim().parse::<f64>().is_ok_and(|v| v > 0.0))
            .collect(),
        None => vec![true; names.len()],
    };
    Ok(names
        .into_iter()
        .zip(keep)
        .filter_map(|(name, keep)| keep.then_some(name))
        .filter(|name| !name.is_empty())
        .unique()
        .collect())
}

/// Add a `draft_match` column naming the most similar reference institution.
pub fn attach_draft_matches(
    rankings: &mut DataFrame,
    candidates: &[String],
    cfg: &MatchConfig,
) -> Result<(), PipelineError> {
    require_columns(rankings, &table_name(&cfg.rankings_file), &[&cfg.name_col])?;
    if let Some(marker) = &cfg.strip_after {
        map_strings(rankings, &cfg.name_col, |name| strip_after(name, marker).to_string())?;
    }
    let matches = strings(rankings, &cfg.name_col)?
        .iter()
        .map(|name| {
            let best = similar_strings(name, candidates, 1).first().copied().unwrap_or_default();
            debug!(%name, %best, "Draft match");
            best.to_string()
        })
        .collect();
    set_strings(rankings, "draft_match", matches)
}

/// Read both tables, propose matches, and write `cfg.output_file`.
#[instrument(level = "info", skip_all, fields(rankings = %cfg.rankings_file.display()))]
pub fn match_names(cfg: &MatchConfig) -> Result<DataFrame, PipelineError> {
    let mut rankings = read_csv(&cfg.rankings_file)?;
    if !cfg.rankings_columns.is_empty() {
        rename_columns(&mut rankings, &cfg.rankings_columns)?;
    }
    let reference = read_csv(&cfg.reference_file)?;
    let candidates = reference_candidates(&reference, cfg)?;
    info!(candidates = candidates.len(), names = rankings.height(), "Matching names");

    attach_draft_matches(&mut rankings, &candidates, cfg)?;
    write_csv(&mut rankings, &cfg.output_file)?;
    info!(output = %cfg.output_file.display(), "Wrote draft matches for review");
    Ok(rankings)
}
