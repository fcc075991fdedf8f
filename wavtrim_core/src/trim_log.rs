use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;

use crate::{TrimResult, WavTrimError};

/// File name of the CSV log written into the target directory.
pub const LOG_FILE_NAME: &str = "Wav_file_trim_log.csv";

const HEADER: [&str; 4] = ["Original", "Trimmed", "Duration_orig", "Duration_trimmed"];

/// One rendered line of the trim log.
///
/// Field order matches the header, and rows sort by their rendered text.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LogRow {
    pub original: String,
    pub trimmed: String,
    pub duration_orig: String,
    pub duration_trimmed: String,
}

impl From<&TrimResult> for LogRow {
    fn from(result: &TrimResult) -> Self {
        Self {
            original: result.source.display().to_string(),
            trimmed: result.output.display().to_string(),
            duration_orig: format!("{:.3}", result.source_duration),
            duration_trimmed: format!("{:.3}", result.output_duration),
        }
    }
}

/// Render `results` as sorted rows.
pub fn log_rows(results: &[TrimResult]) -> Vec<LogRow> {
    let mut rows: Vec<LogRow> = results.iter().map(LogRow::from).collect();
    rows.sort();
    rows
}

/// Write the header and one sorted row per result to `out`.
pub fn write_rows<W: Write>(out: W, results: &[TrimResult]) -> Result<(), csv::Error> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(HEADER)?;
    for row in log_rows(results) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the trim log for `results` into `target_dir`, returning its path.
pub fn write_log(target_dir: &Path, results: &[TrimResult]) -> Result<PathBuf, WavTrimError> {
    let path = target_dir.join(LOG_FILE_NAME);
    let wrap = |source: csv::Error| WavTrimError::WriteLog {
        path: path.clone(),
        source,
    };

    let file = File::create(&path).map_err(|err| wrap(err.into()))?;
    write_rows(file, results).map_err(wrap)?;

    Ok(path)
}
