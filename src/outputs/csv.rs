//! CSV serialisation for record types.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::PipelineError;

/// Serialise `rows` to `writer`.
///
/// `headers` is written explicitly when `rows` is empty so that downstream
/// readers still see the column contract; otherwise headers come from the
/// record's serde field names.
pub fn write_records<T, W>(rows: &[T], headers: &[&str], writer: W) -> Result<(), PipelineError>
where
    T: Serialize,
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        wtr.write_record(headers)?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// [`write_records`] to a file path.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_records_to_path<T: Serialize>(
    rows: &[T],
    headers: &[&str],
    path: &Path,
) -> Result<(), PipelineError> {
    write_records(rows, headers, File::create(path)?)?;
    info!("Wrote CSV");
    Ok(())
}
