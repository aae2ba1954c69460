//! Command-line interface definitions for the pipeline programs.
//!
//! Each program is a separate binary; they share these argument structs so
//! flag spelling stays consistent across the pipeline.
//!
//! # Examples
//!
//! ```sh
//! fd_scrape --config fd_scrape.yml --output_dir ./raw
//! compile_grants --config compile.yml
//! process_eins --input reviewed_eins.csv --output_dir .
//! ca100_scrape --output ca100_companies.csv
//! ```

use std::path::PathBuf;

use clap::Parser;

/// Programs driven entirely by a YAML configuration file; every output
/// path comes from the config.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct ConfigArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "FOUNDATION_GRANTS_CONFIG", value_parser = existing_file)]
    pub config: PathBuf,
}

/// Arguments for `fd_scrape`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct ScrapeArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "FOUNDATION_GRANTS_CONFIG", value_parser = existing_file)]
    pub config: PathBuf,

    /// Directory for the per-EIN CSVs and the follow-up EIN lists
    #[arg(long = "output_dir", alias = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,
}

/// Arguments for `process_eins`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct ProcessEinsArgs {
    /// Hand-reviewed registry results; must have `ein` and `search_term` columns
    #[arg(short, long, value_parser = existing_file)]
    pub input: PathBuf,

    /// Directory for the cleaned EIN list
    #[arg(long = "output_dir", alias = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,
}

/// Arguments for `ca100_scrape`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Ca100Args {
    /// Output CSV path
    #[arg(short, long, default_value = "ca100_companies.csv")]
    pub output: PathBuf,

    /// Company directory URL
    #[arg(long, env = "CA100_BASE_URL", default_value = crate::scrapers::ca100::BASE_URL)]
    pub base_url: String,
}

fn existing_file(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("{s} does not exist or is not a file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_args_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("scrape.yml");
        std::fs::write(&config, "a: 1").unwrap();

        let cli = ScrapeArgs::parse_from([
            "fd_scrape",
            "--config",
            config.to_str().unwrap(),
            "--output_dir",
            "/tmp/raw",
        ]);

        assert_eq!(cli.config, config);
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/raw"));
    }

    #[test]
    fn test_scrape_args_default_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("scrape.yaml");
        std::fs::write(&config, "a: 1").unwrap();

        let cli = ScrapeArgs::parse_from(["fd_scrape", "-c", config.to_str().unwrap()]);
        assert_eq!(cli.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_config_only_programs_reject_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("merge.yml");
        std::fs::write(&config, "a: 1").unwrap();

        let cli = ConfigArgs::parse_from(["merge_grants", "-c", config.to_str().unwrap()]);
        assert_eq!(cli.config, config);
        let parsed = ConfigArgs::try_parse_from([
            "merge_grants",
            "--config",
            config.to_str().unwrap(),
            "--output_dir",
            "/tmp/out",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_config_rejected() {
        let parsed = ConfigArgs::try_parse_from(["compile_grants", "--config", "/definitely/not/here.yml"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_ca100_defaults() {
        let cli = Ca100Args::parse_from(["ca100_scrape"]);
        assert_eq!(cli.output, PathBuf::from("ca100_companies.csv"));
        assert!(cli.base_url.starts_with("https://www.climateaction100.org"));
    }
}
