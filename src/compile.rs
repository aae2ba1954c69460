//! Combine per-EIN scrape files into one grants table.
//!
//! A Foundation Directory EIN search returns grants where the organization
//! is either the grantmaker or the recipient. Only grantmaker rows are kept,
//! recognised by the grantmaker name containing the organization's search
//! term or alternative name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use tracing::{info, instrument, warn};

use crate::config::CompileConfig;
use crate::ein::pad_ein;
use crate::error::PipelineError;
use crate::models::{CompiledGrant, EinReference};
use crate::outputs::csv::write_records_to_path;
use crate::strings::TermReplacements;
use crate::frame::{column_names, read_csv, rename_columns, require_columns, strings, table_name};

/// Column order of the compiled output.
pub const COMPILED_HEADERS: [&str; 11] = [
    "grantmaker",
    "recipient_original",
    "recipient",
    "recipient_city",
    "recipient_state",
    "recipient_country",
    "primary_subject",
    "year",
    "grant_amount",
    "ein",
    "search_result_page",
];

/// Columns a scrape file must have once headers are normalised.
const SCRAPE_COLUMNS: [&str; 10] = [
    "grantmaker",
    "recipient",
    "recipient_city",
    "recipient_state",
    "recipient_country",
    "primary_subject",
    "year",
    "grant_amount",
    "ein",
    "search_result_page",
];

/// `Recipient City` -> `recipient_city`.
pub fn normalize_header(header: &str) -> String {
    header.to_lowercase().replace(' ', "_")
}

/// EIN reference table keyed by padded EIN; the first row per EIN wins.
pub fn load_ein_references(path: &Path) -> Result<HashMap<String, EinReference>, PipelineError> {
    let df = read_csv(path)?;
    require_columns(&df, &table_name(path), &["ein", "search_term", "alternative_name"])?;

    let mut refs = HashMap::new();
    let eins = strings(&df, "ein")?;
    let terms = strings(&df, "search_term")?;
    let alternatives = strings(&df, "alternative_name")?;
    for ((ein, search_term), alternative_name) in eins.iter().zip(terms).zip(alternatives) {
        let ein = pad_ein(ein);
        refs.entry(ein.clone()).or_insert(EinReference {
            ein,
            search_term,
            alternative_name,
        });
    }
    Ok(refs)
}

/// Scrape CSVs in `dir`, sorted by path.
pub fn scrape_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Grantmaker rows of one scrape table, cleaned.
///
/// # Arguments
///
/// * `table` - one scrape file as read, with portal headers
/// * `name` - label for the table in errors
/// * `refs` - EIN reference rows keyed by padded EIN
/// * `replacements` - ordered substitutions applied to recipient names
/// * `missing_state` - written where the recipient state is blank
///
/// # Returns
///
/// The rows whose grantmaker matches the reference entry for the table's
/// EIN, taken from its first row. A table with no rows yields an empty list.
pub fn compile_table(
    mut table: DataFrame,
    name: &str,
    refs: &HashMap<String, EinReference>,
    replacements: &TermReplacements,
    missing_state: &str,
) -> Result<Vec<CompiledGrant>, PipelineError> {
    let headers: Vec<String> = column_names(&table).iter().map(|h| normalize_header(h)).collect();
    rename_columns(&mut table, &headers)?;
    require_columns(&table, name, &SCRAPE_COLUMNS)?;

    if table.height() == 0 {
        return Ok(Vec::new());
    }
    let column = |c: &str| strings(&table, c);
    let eins = column("ein")?;
    let ein = pad_ein(&eins[0]);
    let reference = refs
        .get(&ein)
        .ok_or_else(|| PipelineError::UnknownIdentifier(ein.clone()))?;

    let grantmakers = column("grantmaker")?;
    let recipients = column("recipient")?;
    let cities = column("recipient_city")?;
    let states = column("recipient_state")?;
    let countries = column("recipient_country")?;
    let subjects = column("primary_subject")?;
    let years = column("year")?;
    let amounts = column("grant_amount")?;
    let pages = column("search_result_page")?;

    let mut grants = Vec::new();
    for i in 0..table.height() {
        if !reference.is_grantmaker(&grantmakers[i]) {
            continue;
        }
        let state = states[i].trim();
        grants.push(CompiledGrant {
            grantmaker: grantmakers[i].clone(),
            recipient: replacements.apply(&recipients[i]).trim().to_string(),
            recipient_original: recipients[i].clone(),
            recipient_city: cities[i].clone(),
            recipient_state: if state.is_empty() { missing_state.to_string() } else { state.to_string() },
            recipient_country: countries[i].clone(),
            primary_subject: subjects[i].clone(),
            year: years[i].clone(),
            grant_amount: amounts[i].clone(),
            ein: pad_ein(&eins[i]),
            search_result_page: pages[i].clone(),
        });
    }
    info!(%ein, search_term = %reference.search_term, read = table.height(), kept = grants.len(), "Filtered to grantmaker rows");
    Ok(grants)
}

/// Compile every scrape file in `cfg.data_dir`. Nothing is written until all
/// files have been processed.
#[instrument(level = "info", skip_all, fields(data_dir = %cfg.data_dir.display()))]
pub fn compile_grants(cfg: &CompileConfig) -> Result<Vec<CompiledGrant>, PipelineError> {
    let refs = load_ein_references(&cfg.ein_data_file)?;
    let mut all = Vec::new();
    for path in scrape_files(&cfg.data_dir)? {
        info!(path = %path.display(), "Reading scrape file");
        let table = read_csv(&path)?;
        if table.height() == 0 {
            warn!(path = %path.display(), "Scrape file has no rows; skipping");
            continue;
        }
        all.extend(compile_table(
            table,
            &table_name(&path),
            &refs,
            &cfg.replacements,
            &cfg.missing_state_string,
        )?);
    }
    write_records_to_path(&all, &COMPILED_HEADERS, &cfg.output_file)?;
    info!(rows = all.len(), output = %cfg.output_file.display(), "Wrote compiled grants");
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRAPE: &str = "\
Grantmaker,Recipient,Recipient City,Recipient State,Recipient Country,Primary Subject,Year,Grant Amount,ein,search_result_page
ExxonMobil Foundation,Univ. of Texas,Austin,TX,USA,Education,2019,\"$10,000\",136083566,1
Ford Foundation,ExxonMobil Foundation,New York,NY,USA,Philanthropy,2019,\"$5,000\",136083566,1
Exxon Mobil Corporation,Rice Univ.,Houston,,USA,Education,2020,\"$2,500\",136083566,2
";

    fn refs() -> HashMap<String, EinReference> {
        HashMap::from([(
            "136083566".to_string(),
            EinReference {
                ein: "136083566".to_string(),
                search_term: "ExxonMobil".to_string(),
                alternative_name: "Exxon Mobil".to_string(),
            },
        )])
    }

    fn replacements() -> TermReplacements {
        TermReplacements::new(vec![("Univ.".to_string(), "University".to_string())])
    }

    fn table(contents: &str) -> DataFrame {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exxon.csv");
        fs::write(&path, contents).unwrap();
        read_csv(&path).unwrap()
    }

    #[test]
    fn test_keeps_only_grantmaker_rows() {
        let grants = compile_table(table(SCRAPE), "exxon.csv", &refs(), &replacements(), "NA").unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].recipient_original, "Univ. of Texas");
        assert_eq!(grants[0].recipient, "University of Texas");
        assert_eq!(grants[1].grantmaker, "Exxon Mobil Corporation");
        assert_eq!(grants[1].recipient_state, "NA");
        assert_eq!(grants[1].search_result_page, "2");
    }

    #[test]
    fn test_unknown_ein_is_error() {
        let err = compile_table(table(SCRAPE), "exxon.csv", &HashMap::new(), &replacements(), "NA").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownIdentifier(e) if e == "136083566"));
    }

    #[test]
    fn test_missing_column_is_error() {
        let err = compile_table(table("Grantmaker,Recipient\nA,B\n"), "bad.csv", &refs(), &replacements(), "NA").unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumns { table, .. } if table == "bad.csv"));
    }

    #[test]
    fn test_reference_rows_keep_first_per_padded_ein() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eins.csv");
        fs::write(
            &path,
            "ein,search_term,alternative_name\n13608356,ExxonMobil,Exxon Mobil\n013608356,Later,\n",
        )
        .unwrap();
        let refs = load_ein_references(&path).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs["013608356"].search_term, "ExxonMobil");
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Recipient Country"), "recipient_country");
        assert_eq!(normalize_header("search_result_page"), "search_result_page");
    }
}
