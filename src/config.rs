//! YAML configuration for every pipeline stage.
//!
//! Each binary reads one YAML file into its own typed struct. Optional keys
//! carry defaults; a missing required key fails at load time with the
//! `serde_yaml` message naming the key.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{DeserializeOwned, Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::PipelineError;
use crate::strings::{TermReplacements, yaml_scalar};

fn check_yaml_extension(path: &Path) -> Result<(), PipelineError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => Ok(()),
        _ => Err(PipelineError::Config {
            path: path.to_path_buf(),
            reason: "expected a .yml or .yaml file".to_string(),
        }),
    }
}

/// Read a YAML file into `T`. The path must end in `.yml` or `.yaml`.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    check_yaml_extension(path)?;
    let text = fs::read_to_string(path)?;
    let value = serde_yaml::from_str(&text)?;
    debug!("Loaded YAML");
    Ok(value)
}

/// Write `value` as block-style YAML. The path must end in `.yml` or `.yaml`.
pub fn write_yaml<T: Serialize>(value: &T, path: &Path) -> Result<(), PipelineError> {
    check_yaml_extension(path)?;
    fs::write(path, serde_yaml::to_string(value)?)?;
    Ok(())
}

/// One `- name: 'ein'` entry of the scrape list.
#[derive(Debug, Clone, PartialEq)]
pub struct EinEntry {
    pub name: String,
    pub ein: String,
}

impl<'de> Deserialize<'de> for EinEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
        let mut entries = mapping.into_iter();
        let (Some((name, ein)), None) = (entries.next(), entries.next()) else {
            return Err(D::Error::custom("each EIN entry must be a single `name: ein` pair"));
        };
        Ok(EinEntry {
            name: yaml_scalar(&name).ok_or_else(|| D::Error::custom("EIN entry name must be a scalar"))?,
            ein: yaml_scalar(&ein).ok_or_else(|| D::Error::custom("EIN must be a scalar"))?,
        })
    }
}

fn default_suffix() -> String {
    ".csv".to_string()
}
fn default_max_pages() -> u32 {
    100
}
fn default_login_wait() -> u64 {
    15
}
fn default_page_wait() -> u64 {
    5
}
fn default_challenge_timeout() -> u64 {
    120
}
fn default_challenge_settle() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

/// Settings for `fd_scrape`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    pub login_url: String,
    pub username: String,
    pub password: String,
    /// Initial search URL; `&ein=` is appended.
    pub target_url: String,
    /// Paged search URL; `&ein=` and `&page=` are appended.
    pub page_url: String,
    /// Seconds to wait for the first results page.
    pub wait_seconds: u64,
    /// File name of the persisted list of EINs with more than `max_pages` pages.
    pub more_than_100: String,
    /// File name of the persisted list of EINs with no results.
    pub no_grants_for_ein: String,
    pub eins: Vec<EinEntry>,
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_login_wait")]
    pub login_wait_seconds: u64,
    #[serde(default = "default_page_wait")]
    pub page_wait_seconds: u64,
    #[serde(default = "default_challenge_timeout")]
    pub challenge_timeout_seconds: u64,
    #[serde(default = "default_challenge_settle")]
    pub challenge_settle_seconds: u64,
    /// Ring the terminal bell when a challenge blocks the page.
    #[serde(default = "default_true")]
    pub alert_on_challenge: bool,
    /// Keep going after an EIN fails instead of stopping the run.
    #[serde(default)]
    pub continue_on_error: bool,
    /// File name of the persisted list of EINs that failed (only with
    /// `continue_on_error`).
    #[serde(default)]
    pub failed_eins: Option<String>,
    #[serde(default)]
    pub headless: bool,
}

fn default_request_timeout() -> u64 {
    15
}
fn default_registry_pages() -> u32 {
    1
}

/// Settings for `registry_search`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub api_root: String,
    pub search_string_file: PathBuf,
    pub search_string_col: String,
    pub company_col: String,
    pub run_col: String,
    #[serde(default)]
    pub ignore_results_with: Vec<String>,
    #[serde(default)]
    pub test_just_foundation_first: bool,
    #[serde(rename = "501c_6", default)]
    pub include_501c6: bool,
    pub output_file: PathBuf,
    #[serde(default = "default_registry_pages")]
    pub max_pages: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_missing_state() -> String {
    "NA".to_string()
}

/// Settings for `compile_grants`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileConfig {
    /// Directory of per-EIN scrape CSVs.
    pub data_dir: PathBuf,
    /// CSV with `ein`, `search_term`, `alternative_name`.
    pub ein_data_file: PathBuf,
    #[serde(default)]
    pub replacements: TermReplacements,
    #[serde(default = "default_missing_state")]
    pub missing_state_string: String,
    pub output_file: PathBuf,
}

fn col(name: &str) -> String {
    name.to_string()
}
fn default_ein_col() -> String {
    col("ein")
}
fn default_year_col() -> String {
    col("year")
}
fn default_amount_col() -> String {
    col("grant_amount")
}
fn default_org_uid_col() -> String {
    col("unitid")
}
fn default_matched_name_col() -> String {
    col("carnegie_matched")
}
fn default_carnegie_name_col() -> String {
    col("instnm")
}
fn default_fossil_col() -> String {
    col("fossil_fuel_tied")
}
fn default_recipient_state_col() -> String {
    col("recipient_state")
}
fn default_org_state_col() -> String {
    col("org_state")
}
fn default_recipient_lat_col() -> String {
    col("recipient_lat")
}
fn default_recipient_lon_col() -> String {
    col("recipient_lon")
}
fn default_org_lat_col() -> String {
    col("org_lat")
}
fn default_org_lon_col() -> String {
    col("org_lon")
}

/// Settings for `merge_grants`.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    pub grant_data: PathBuf,
    pub grantmaker_data_file: PathBuf,
    pub org_mapping_data: PathBuf,
    pub carnegie_data: PathBuf,
    pub school_location_file: PathBuf,
    /// YAML mapping of state to the list of its neighbouring states.
    pub neighbor_states_info: PathBuf,
    pub output_file: PathBuf,

    pub currency_year: i32,
    #[serde(default)]
    pub cpi_table_file: Option<PathBuf>,

    #[serde(default = "default_ein_col")]
    pub ein_col: String,
    #[serde(default = "default_year_col")]
    pub grant_year_col: String,
    #[serde(default = "default_amount_col")]
    pub grant_grant_amt_col: String,
    #[serde(default = "default_org_uid_col")]
    pub org_uid_col: String,
    pub multiple_institutions_bool_col: String,
    pub univ_bool_col: String,
    pub grant_df_cols: Vec<String>,
    pub grantmaker_df_cols: Vec<String>,
    pub cols_to_merge_grants_and_orgs: Vec<String>,
    #[serde(default = "default_matched_name_col")]
    pub matched_name_col: String,
    #[serde(default = "default_carnegie_name_col")]
    pub carnegie_name_col: String,

    #[serde(default)]
    pub keep_only_open_higher_ed_orgs: bool,
    #[serde(default)]
    pub keep_only_definite_fossil_fuel: bool,
    #[serde(default = "default_fossil_col")]
    pub fossil_fuel_col: String,
    #[serde(default)]
    pub min_grant_size: Option<f64>,

    #[serde(default = "default_recipient_state_col")]
    pub recipient_state_col: String,
    #[serde(default = "default_org_state_col")]
    pub org_state_col: String,
    #[serde(default = "default_recipient_lat_col")]
    pub recipient_lat_col: String,
    #[serde(default = "default_recipient_lon_col")]
    pub recipient_lon_col: String,
    #[serde(default = "default_org_lat_col")]
    pub org_lat_col: String,
    #[serde(default = "default_org_lon_col")]
    pub org_lon_col: String,
}

fn default_name_col() -> String {
    col("name")
}
fn default_strip_after() -> Option<String> {
    Some("United States".to_string())
}
fn default_reference_filter_col() -> Option<String> {
    Some(col("research2025"))
}

/// Settings for `match_names`.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchConfig {
    pub rankings_file: PathBuf,
    /// Replacement header for the rankings file, in column order.
    #[serde(default)]
    pub rankings_columns: Vec<String>,
    #[serde(default = "default_name_col")]
    pub name_col: String,
    /// Names are cut at the first occurrence of this text.
    #[serde(default = "default_strip_after")]
    pub strip_after: Option<String>,
    pub reference_file: PathBuf,
    #[serde(default = "default_carnegie_name_col")]
    pub reference_name_col: String,
    /// Only reference rows with a positive value here are candidates.
    #[serde(default = "default_reference_filter_col")]
    pub reference_filter_col: Option<String>,
    pub output_file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCRAPE_YAML: &str = r#"
login_url: https://fdo.example.org/login
username: me@example.org
password: hunter2
target_url: https://fdo.example.org/grants?x=1
page_url: https://fdo.example.org/grants?x=1
wait_seconds: 20
more_than_100: more_than_100.yml
no_grants_for_ein: no_grants.yml
eins:
  - exxon_mobil_foundation: '136083566'
  - ford_foundation: 131684331
"#;

    #[test]
    fn test_scrape_config_defaults() {
        let cfg: ScrapeConfig = serde_yaml::from_str(SCRAPE_YAML).unwrap();
        assert_eq!(cfg.eins.len(), 2);
        assert_eq!(cfg.eins[0].name, "exxon_mobil_foundation");
        assert_eq!(cfg.eins[1].ein, "131684331");
        assert_eq!(cfg.suffix, ".csv");
        assert_eq!(cfg.max_pages, 100);
        assert_eq!(cfg.page_wait_seconds, 5);
        assert!(!cfg.continue_on_error);
        assert!(cfg.alert_on_challenge);
    }

    #[test]
    fn test_ein_entry_rejects_multi_key() {
        let yaml = "- a: '1'\n  b: '2'\n";
        let parsed: Result<Vec<EinEntry>, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_registry_config_501c6_key() {
        let yaml = r#"
api_root: https://projects.propublica.org/nonprofits/api/v2/search.json
search_string_file: terms.csv
search_string_col: search_term
company_col: company
run_col: run
501c_6: true
output_file: out.csv
"#;
        let cfg: RegistryConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.include_501c6);
        assert!(!cfg.test_just_foundation_first);
        assert_eq!(cfg.max_pages, 1);
    }

    #[test]
    fn test_load_yaml_requires_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(&path, "a: 1").unwrap();
        let err = load_yaml::<serde_yaml::Value>(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn test_load_yaml_round_trip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compile.yml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            "data_dir: raw\nein_data_file: eins.csv\noutput_file: out.csv\nreplacements:\n  'Univ.': University\n"
        )
        .unwrap();
        let cfg: CompileConfig = load_yaml(&path).unwrap();
        assert_eq!(cfg.missing_state_string, "NA");
        assert_eq!(cfg.replacements.apply("Univ. X"), "University X");
    }
}
