use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while trimming a batch of WAV files.
///
/// Scanning and log-writing errors abort the batch. Everything else is tied
/// to a single file and ends up in [`crate::BatchReport::failures`].
#[derive(Debug, Error)]
pub enum WavTrimError {
    /// The target directory is missing, unreadable or not a directory.
    #[error("cannot access directory '{}'", .path.display())]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Walking the directory tree failed somewhere below the root.
    #[error("failed to scan directory '{}'", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The source file is not a readable, uncompressed PCM WAV container.
    #[error("'{}' is not a readable PCM WAV file", .path.display())]
    ContainerFormat {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// The requested trim is longer than the audio in the file.
    #[error(
        "cannot remove {:.3}s from '{}': it only holds {available:.3}s of audio",
        .requested.as_secs_f64(),
        .path.display()
    )]
    TrimExceedsDuration {
        path: PathBuf,
        requested: Duration,
        available: f64,
    },

    /// The derived output path is already taken.
    #[error("output file '{}' already exists", .path.display())]
    OutputExists { path: PathBuf },

    /// Creating or writing the trimmed file failed.
    #[error("failed to write '{}'", .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// The trimmed file was written but the original could not be removed.
    #[error("trimmed copy written but failed to remove original '{}'", .path.display())]
    RemoveOriginal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No output name can be derived from the input path.
    #[error("failed to derive an output name for '{}'", .path.display())]
    InvalidInputName { path: PathBuf },

    /// The worker processing this file panicked.
    #[error("worker panicked while trimming '{}': {message}", .path.display())]
    WorkerPanic { path: PathBuf, message: String },

    /// The CSV log could not be written.
    #[error("failed to write log file '{}'", .path.display())]
    WriteLog {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
