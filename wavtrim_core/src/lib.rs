mod dispatch;
mod error;
mod scan;
mod trim;
mod trim_log;

use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

pub use crate::dispatch::{Dispatched, Dispatcher, TrimFailure};
pub use crate::error::WavTrimError;
pub use crate::scan::scan_dir;
pub use crate::trim::{
    frames_for, rounded_duration, trim_file, trim_file_with, trimmed_path, TrimRequest,
    TrimResult, TRIMMED_POSTFIX,
};
pub use crate::trim_log::{log_rows, write_log, write_rows, LogRow, LOG_FILE_NAME};

/// File name suffix of the files picked up by the scanner.
pub const WAV_EXTENSION: &str = ".wav";

/// Number of worker threads used when none is configured.
pub const DEFAULT_THREADS: usize = 4;

/// Audio removed from the start of each file when none is configured.
pub const DEFAULT_TRIM: Duration = Duration::from_secs(1);

/// Whether originals are deleted after a successful trim by default.
pub const DEFAULT_DELETE_ORIGINALS: bool = true;

/// Configuration for a batch trim.
#[derive(Clone, Debug)]
pub struct Config {
    /// Canonicalized directory whose tree is scanned and where the log goes.
    pub target_dir: PathBuf,
    /// Number of worker threads.
    pub threads: NonZeroUsize,
    /// Audio removed from the start of every file.
    pub trim: Duration,
    /// Remove each original once its trimmed copy is on disk.
    pub delete_originals: bool,
}

impl Config {
    /// Construct a [`Config`] with the default parameters.
    pub fn new<P: AsRef<Path>>(target_dir: P) -> Result<Self, WavTrimError> {
        Self::builder(target_dir).build()
    }

    /// Start building a [`Config`] for `target_dir`.
    pub fn builder<P: AsRef<Path>>(target_dir: P) -> ConfigBuilder {
        ConfigBuilder {
            target_dir: target_dir.as_ref().to_path_buf(),
            threads: NonZeroUsize::new(DEFAULT_THREADS).unwrap_or(NonZeroUsize::MIN),
            trim: DEFAULT_TRIM,
            delete_originals: DEFAULT_DELETE_ORIGINALS,
        }
    }

    /// One request per file, in the given order.
    pub fn requests(&self, files: Vec<PathBuf>) -> Vec<TrimRequest> {
        files
            .into_iter()
            .map(|source| TrimRequest::new(source, self.trim, self.delete_originals))
            .collect()
    }
}

/// Builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    target_dir: PathBuf,
    threads: NonZeroUsize,
    trim: Duration,
    delete_originals: bool,
}

impl ConfigBuilder {
    pub fn threads(mut self, threads: NonZeroUsize) -> Self {
        self.threads = threads;
        self
    }

    pub fn trim(mut self, trim: Duration) -> Self {
        self.trim = trim;
        self
    }

    pub fn delete_originals(mut self, delete_originals: bool) -> Self {
        self.delete_originals = delete_originals;
        self
    }

    /// Validate the target directory and produce the [`Config`].
    pub fn build(self) -> Result<Config, WavTrimError> {
        let access_error = |source: io::Error| WavTrimError::DirectoryAccess {
            path: self.target_dir.clone(),
            source,
        };
        let target_dir = fs::canonicalize(&self.target_dir).map_err(access_error)?;
        if !target_dir.is_dir() {
            return Err(access_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a directory",
            )));
        }

        Ok(Config {
            target_dir,
            threads: self.threads,
            trim: self.trim,
            delete_originals: self.delete_originals,
        })
    }
}

/// Receives progress notifications while a batch runs.
///
/// Methods are called from the worker threads, hence the `Sync` bound.
pub trait ProgressReporter: Sync {
    /// Work is about to start on `total` files.
    fn start(&self, _total: usize) {}

    /// A file was trimmed successfully.
    fn trimmed(&self, _result: &TrimResult) {}

    /// A file was skipped because of `error`.
    fn failed(&self, _path: &Path, _error: &WavTrimError) {}

    /// Every worker has finished.
    fn finish(&self) {}
}

/// [`ProgressReporter`] that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Summary of a batch that found at least one file.
#[derive(Debug)]
pub struct BatchReport {
    /// Number of files the scanner returned.
    pub discovered: usize,
    /// Successful trims sorted by source path.
    pub results: Vec<TrimResult>,
    /// Skipped files sorted by source path.
    pub failures: Vec<TrimFailure>,
    /// Location of the CSV log.
    pub log_path: PathBuf,
}

#[derive(Debug)]
pub enum BatchOutcome {
    /// The scan found nothing; no log was written.
    NothingFound { target_dir: PathBuf },
    Completed(BatchReport),
}

/// Trim every WAV file below `config.target_dir` without progress reporting.
pub fn run(config: Config) -> Result<BatchOutcome, WavTrimError> {
    run_with_progress(config, &NoProgress)
}

/// Scan, trim on the worker pool and write the log.
///
/// Only scanning and log writing errors are returned; per-file errors are
/// collected in [`BatchReport::failures`].
pub fn run_with_progress<P>(config: Config, progress: &P) -> Result<BatchOutcome, WavTrimError>
where
    P: ProgressReporter + ?Sized,
{
    let files = scan_dir(&config.target_dir, WAV_EXTENSION)?;
    if files.is_empty() {
        info!(
            "no '{WAV_EXTENSION}' files found under '{}'",
            config.target_dir.display()
        );
        return Ok(BatchOutcome::NothingFound {
            target_dir: config.target_dir,
        });
    }

    let discovered = files.len();
    let dispatcher = Dispatcher::new(config.threads);
    info!(
        "trimming {:.3}s from {discovered} file(s) with up to {} worker(s)",
        config.trim.as_secs_f64(),
        dispatcher.threads()
    );

    let requests = config.requests(files);
    let Dispatched { results, failures } = dispatcher.dispatch(requests, progress);

    let log_path = write_log(&config.target_dir, &results)?;
    info!(
        "trimmed {} of {discovered} file(s), log written to '{}'",
        results.len(),
        log_path.display()
    );

    Ok(BatchOutcome::Completed(BatchReport {
        discovered,
        results,
        failures,
        log_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_constants() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path()).unwrap();

        assert_eq!(config.threads.get(), DEFAULT_THREADS);
        assert_eq!(config.trim, DEFAULT_TRIM);
        assert_eq!(config.delete_originals, DEFAULT_DELETE_ORIGINALS);
        assert_eq!(config.target_dir, fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn builder_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = Config::new(&missing).unwrap_err();
        match err {
            WavTrimError::DirectoryAccess { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn requests_carry_configured_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::builder(dir.path())
            .trim(Duration::from_millis(250))
            .delete_originals(false)
            .build()
            .unwrap();

        let requests = config.requests(vec![PathBuf::from("x.wav")]);
        assert_eq!(
            requests,
            vec![TrimRequest::new("x.wav", Duration::from_millis(250), false)]
        );
    }
}
