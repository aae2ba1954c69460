//! Polars helpers for the CSV tables the pipeline stages exchange.
//!
//! Reference tables are produced independently and only agree on column
//! names, so every stage reads them with all columns as strings, checks the
//! columns it needs up front, and joins on named keys. Identifiers such as
//! EINs keep their leading zeros this way. Empty cells stand in for missing
//! values; nulls introduced by joins read back as empty strings.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::PipelineError;

const LEFT_ROW: &str = "__left_row";
const RIGHT_ROW: &str = "__right_row";

/// File name of `path`, used to label a table in errors and logs.
pub fn table_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// Polars pads short rows with nulls, so field counts are checked separately.
fn check_row_lengths(path: &Path) -> Result<(), PipelineError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(false).from_path(path)?;
    let mut record = csv::ByteRecord::new();
    loop {
        match rdr.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => {
                return Err(match e.kind() {
                    csv::ErrorKind::UnequalLengths { pos, expected_len, len } => PipelineError::RaggedRow {
                        table: table_name(path),
                        line: pos.as_ref().map_or(0, |p| p.line()),
                        expected: *expected_len,
                        found: *len,
                    },
                    _ => e.into(),
                });
            }
        }
    }
}

/// Read a CSV file with every column as a string.
///
/// # Arguments
///
/// * `path` - CSV file with a header row
///
/// # Returns
///
/// The table, or [`PipelineError::RaggedRow`] naming the first line whose
/// field count differs from the header.
pub fn read_csv(path: &Path) -> Result<DataFrame, PipelineError> {
    check_row_lengths(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_missing_is_null(false))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    debug!(path = %path.display(), rows = df.height(), "Read table");
    Ok(df)
}

pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), PipelineError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    debug!(path = %path.display(), rows = df.height(), "Wrote table");
    Ok(())
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().into_iter().map(|c| c.to_string()).collect()
}

/// Fail with every missing column named, not just the first.
pub fn require_columns<S: AsRef<str>>(df: &DataFrame, table: &str, columns: &[S]) -> Result<(), PipelineError> {
    let missing: Vec<String> = columns
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| df.get_column_index(c).is_none())
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumns {
            table: table.to_string(),
            missing,
        })
    }
}

/// Cells of `column` as text; nulls become empty strings.
pub fn strings(df: &DataFrame, column: &str) -> Result<Vec<String>, PipelineError> {
    let values = df.column(column)?.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

/// Replace `column` with `values`, appending it if absent.
pub fn set_strings(df: &mut DataFrame, column: &str, values: Vec<String>) -> Result<(), PipelineError> {
    df.with_column(Series::new(column.into(), values))?;
    Ok(())
}

/// Rewrite every cell of `column`.
pub fn map_strings<F>(df: &mut DataFrame, column: &str, mut f: F) -> Result<(), PipelineError>
where
    F: FnMut(&str) -> String,
{
    let values = strings(df, column)?.iter().map(|v| f(v.as_str())).collect();
    set_strings(df, column, values)
}

/// Rename columns by position; extra names are ignored.
pub fn rename_columns(df: &mut DataFrame, names: &[String]) -> Result<(), PipelineError> {
    for (old, new) in column_names(df).iter().zip(names) {
        if old != new {
            df.rename(old, new.as_str().into())?;
        }
    }
    Ok(())
}

/// Project onto `columns`, in that order.
pub fn select<S: AsRef<str>>(df: &DataFrame, table: &str, columns: &[S]) -> Result<DataFrame, PipelineError> {
    require_columns(df, table, columns)?;
    Ok(df.select(columns.iter().map(|c| c.as_ref()))?)
}

/// Rows whose flag in `keep` is true.
pub fn retain(df: &DataFrame, keep: &[bool]) -> Result<DataFrame, PipelineError> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}

/// First row for each distinct value of `column`, in original order.
pub fn unique_first(df: &DataFrame, column: &str) -> Result<DataFrame, PipelineError> {
    Ok(df.unique_stable(Some(&[column.to_string()]), UniqueKeepStrategy::First, None)?)
}

/// Stable ascending sort on the text of `column`.
pub fn sort_by(df: &DataFrame, column: &str) -> Result<DataFrame, PipelineError> {
    Ok(df.sort([column], SortMultipleOptions::default().with_maintain_order(true))?)
}

/// Number of distinct non-empty values in `column`.
pub fn n_unique(df: &DataFrame, column: &str) -> Result<usize, PipelineError> {
    Ok(strings(df, column)?
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect::<HashSet<_>>()
        .len())
}

/// Rows of `column` holding a 1-like flag.
pub fn count_truthy(df: &DataFrame, column: &str) -> Result<usize, PipelineError> {
    Ok(strings(df, column)?.iter().filter(|c| is_truthy(c)).count())
}

fn key_exprs(cols: &[&str]) -> Vec<Expr> {
    cols.iter().map(|c| col(*c)).collect()
}

/// Join `right` onto `left` where `left_on` equals `right_on`.
///
/// Right key columns are coalesced into the left keys. Other columns
/// present on both sides get `_x` (left) and `_y` (right) suffixes. Left
/// rows keep their order, each followed by its matches in right order; for
/// full joins the unmatched right rows come last.
///
/// # Arguments
///
/// * `left`, `right` - tables to join
/// * `left_on`, `right_on` - key columns, paired by position
/// * `how` - `JoinType::Inner`, `JoinType::Left` or `JoinType::Full`
pub fn join(
    left: &DataFrame,
    right: &DataFrame,
    left_on: &[&str],
    right_on: &[&str],
    how: JoinType,
) -> Result<DataFrame, PipelineError> {
    let mut left_df = left.clone();
    let mut right_df = right.clone();

    let left_names: HashSet<String> = column_names(left).into_iter().collect();
    let overlapping: Vec<String> = column_names(right)
        .into_iter()
        .filter(|c| !right_on.contains(&c.as_str()) && left_names.contains(c))
        .collect();
    for c in &overlapping {
        if !left_on.contains(&c.as_str()) {
            left_df.rename(c, format!("{c}_x").into())?;
        }
        right_df.rename(c, format!("{c}_y").into())?;
    }

    let joined = left_df
        .lazy()
        .with_row_index(LEFT_ROW, None)
        .join(
            right_df.lazy().with_row_index(RIGHT_ROW, None),
            key_exprs(left_on),
            key_exprs(right_on),
            JoinArgs::new(how.clone()).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .sort(
            [LEFT_ROW, RIGHT_ROW],
            SortMultipleOptions::default()
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()?
        .drop_many([LEFT_ROW, RIGHT_ROW]);

    debug!(left = left.height(), right = right.height(), joined = joined.height(), ?how, "Joined tables");
    Ok(joined)
}

/// Render a float the way downstream tools read it back: integers with a
/// single trailing zero, everything else at full precision.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// 0/1 flag cell.
pub fn format_flag(flag: bool) -> String {
    let cell = if flag { "1" } else { "0" };
    cell.to_string()
}

/// True for cells holding a 1-like flag (`1`, `1.0`, `true`).
pub fn is_truthy(cell: &str) -> bool {
    let cell = cell.trim();
    cell.eq_ignore_ascii_case("true") || cell.parse::<f64>().map(|v| v == 1.0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_require_columns_names_all_missing() {
        let df = df!("ein" => &["1"], "year" => &["2020"]).unwrap();
        let err = require_columns(&df, "grants", &["ein", "amount", "state"]).unwrap_err();
        match err {
            PipelineError::MissingColumns { table, missing } => {
                assert_eq!(table, "grants");
                assert_eq!(missing, vec!["amount", "state"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_read_keeps_leading_zero_and_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "eins.csv", "ein,state\n012345678,\n987654321,TX\n");
        let df = read_csv(&path).unwrap();
        assert_eq!(strings(&df, "ein").unwrap(), vec!["012345678", "987654321"]);
        assert_eq!(strings(&df, "state").unwrap(), vec!["", "TX"]);
    }

    #[test]
    fn test_extra_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "grants.csv", "recipient,amount\nRice University,1000,EXTRA\n");
        match read_csv(&path).unwrap_err() {
            PipelineError::RaggedRow {
                table,
                line,
                expected,
                found,
            } => {
                assert_eq!(table, "grants.csv");
                assert_eq!(line, 2);
                assert_eq!((expected, found), (2, 3));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_short_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "grants.csv", "recipient,amount\nRice University,1000\nYale\n");
        assert!(matches!(
            read_csv(&path),
            Err(PipelineError::RaggedRow { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_write_then_read_preserves_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut df = df!("ein" => &["012345678"], "recipient" => &["Univ. of Texas, Austin"]).unwrap();
        write_csv(&mut df, &path).unwrap();
        let back = read_csv(&path).unwrap();
        assert_eq!(strings(&back, "ein").unwrap(), vec!["012345678"]);
        assert_eq!(strings(&back, "recipient").unwrap(), vec!["Univ. of Texas, Austin"]);
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let left = df!("id" => &["1", "2"], "a" => &["x", "y"]).unwrap();
        let right = df!("id" => &["2", "3"], "b" => &["z", "w"]).unwrap();
        let joined = join(&left, &right, &["id"], &["id"], JoinType::Inner).unwrap();
        assert_eq!(column_names(&joined), vec!["id", "a", "b"]);
        assert_eq!(strings(&joined, "b").unwrap(), vec!["z"]);
    }

    #[test]
    fn test_left_join_keeps_left_rows_in_order() {
        let left = df!("id" => &["1", "2"], "a" => &["x", "y"]).unwrap();
        let right = df!("id" => &["2", "2"], "b" => &["z", "q"]).unwrap();
        let joined = join(&left, &right, &["id"], &["id"], JoinType::Left).unwrap();
        assert_eq!(strings(&joined, "id").unwrap(), vec!["1", "2", "2"]);
        assert_eq!(strings(&joined, "b").unwrap(), vec!["", "z", "q"]);
    }

    #[test]
    fn test_full_join_fills_key_from_right() {
        let left = df!("ein" => &["1"], "amount" => &["10"]).unwrap();
        let right = df!("ein" => &["1", "9"], "org_state" => &["TX", "CA"]).unwrap();
        let joined = join(&left, &right, &["ein"], &["ein"], JoinType::Full).unwrap();
        assert_eq!(column_names(&joined), vec!["ein", "amount", "org_state"]);
        assert_eq!(strings(&joined, "ein").unwrap(), vec!["1", "9"]);
        assert_eq!(strings(&joined, "amount").unwrap(), vec!["10", ""]);
    }

    #[test]
    fn test_join_suffixes_overlapping_columns() {
        let left = df!("id" => &["1"], "name" => &["left"]).unwrap();
        let right = df!("id" => &["1"], "name" => &["right"]).unwrap();
        let joined = join(&left, &right, &["id"], &["id"], JoinType::Inner).unwrap();
        assert_eq!(column_names(&joined), vec!["id", "name_x", "name_y"]);
    }

    #[test]
    fn test_join_with_different_key_names() {
        let left = df!("unitid" => &["7"], "carnegie_matched" => &["Rice University"]).unwrap();
        let right = df!("unitid" => &["7"], "instnm" => &["Rice University"], "rank" => &["R1"]).unwrap();
        let joined = join(
            &left,
            &right,
            &["unitid", "carnegie_matched"],
            &["unitid", "instnm"],
            JoinType::Left,
        )
        .unwrap();
        assert_eq!(strings(&joined, "rank").unwrap(), vec!["R1"]);
        assert_eq!(strings(&joined, "carnegie_matched").unwrap(), vec!["Rice University"]);
    }

    #[test]
    fn test_unique_keeps_first() {
        let df = df!("ein" => &["1", "1", "2"], "name" => &["first", "second", "other"]).unwrap();
        let unique = unique_first(&df, "ein").unwrap();
        assert_eq!(strings(&unique, "name").unwrap(), vec!["first", "other"]);
    }

    #[test]
    fn test_retain_and_sort() {
        let df = df!("term" => &["shell", "bp", "eni"]).unwrap();
        let kept = retain(&df, &[true, true, false]).unwrap();
        let sorted = sort_by(&kept, "term").unwrap();
        assert_eq!(strings(&sorted, "term").unwrap(), vec!["bp", "shell"]);
    }

    #[test]
    fn test_flags_and_numbers() {
        assert!(is_truthy("1"));
        assert!(is_truthy("1.0"));
        assert!(is_truthy("True"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
        assert_eq!(format_number(1500.0), "1500.0");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_flag(true), "1");
    }
}
