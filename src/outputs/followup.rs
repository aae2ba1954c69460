//! Persisted EIN lists for manual follow-up.
//!
//! Each list is a YAML document `eins: [...]`. Writing uses append
//! semantics: the new entries come first, followed by whatever the file
//! already held, and the whole list is rewritten. Several runs over
//! different EIN batches therefore accumulate into one file.

use std::path::Path;

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::{load_yaml, write_yaml};
use crate::error::PipelineError;
use crate::strings::yaml_scalar;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EinList {
    #[serde(default, deserialize_with = "scalar_list")]
    pub eins: Vec<String>,
}

// Hand-edited lists may hold bare numbers rather than quoted strings.
fn scalar_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Vec::<serde_yaml::Value>::deserialize(deserializer)?
        .iter()
        .map(|v| yaml_scalar(v).ok_or_else(|| D::Error::custom("EIN list entries must be scalars")))
        .collect()
}

/// Merge `new_eins` with the list stored at `path` and rewrite it.
///
/// Returns the full list as written.
#[instrument(level = "info", skip_all, fields(path = %path.display(), new = new_eins.len()))]
pub fn append_ein_list(new_eins: &[String], path: &Path) -> Result<Vec<String>, PipelineError> {
    let mut eins = new_eins.to_vec();
    if path.exists() {
        let existing: EinList = load_yaml(path)?;
        eins.extend(existing.eins);
    }
    write_yaml(&EinList { eins: eins.clone() }, path)?;
    info!(total = eins.len(), "Updated EIN list");
    Ok(eins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_grants.yml");
        let written = append_ein_list(&["012345678".to_string()], &path).unwrap();
        assert_eq!(written, vec!["012345678"]);
        let back: EinList = load_yaml(&path).unwrap();
        assert_eq!(back.eins, vec!["012345678"]);
    }

    #[test]
    fn test_appends_to_existing_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("more_than_100.yml");
        append_ein_list(&["111111111".to_string()], &path).unwrap();
        let written = append_ein_list(&["222222222".to_string()], &path).unwrap();
        assert_eq!(written, vec!["222222222", "111111111"]);
    }

    #[test]
    fn test_reads_unquoted_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hand_edited.yml");
        std::fs::write(&path, "eins:\n- 131684331\n").unwrap();
        let written = append_ein_list(&[], &path).unwrap();
        assert_eq!(written, vec!["131684331"]);
    }

    #[test]
    fn test_empty_list_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        append_ein_list(&[], &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_rejects_non_yaml_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        assert!(append_ein_list(&[], &path).is_err());
    }
}
