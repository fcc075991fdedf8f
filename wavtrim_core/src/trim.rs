use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::{Sample, SampleFormat, WavReader, WavWriter};
use log::debug;

use crate::WavTrimError;

/// Postfix inserted between the file stem and the extension of every output.
pub const TRIMMED_POSTFIX: &str = "_trimmed";

/// A single unit of work: trim `trim` from the start of `source`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrimRequest {
    pub source: PathBuf,
    pub trim: Duration,
    pub delete_original: bool,
}

impl TrimRequest {
    pub fn new<P: Into<PathBuf>>(source: P, trim: Duration, delete_original: bool) -> Self {
        Self {
            source: source.into(),
            trim,
            delete_original,
        }
    }
}

/// Outcome of a successful [`trim_file`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct TrimResult {
    /// Path of the file that was trimmed. It no longer exists when the
    /// request asked for the original to be deleted.
    pub source: PathBuf,
    /// Path of the newly written file.
    pub output: PathBuf,
    pub sample_rate: u32,
    pub source_frames: u64,
    pub skipped_frames: u64,
    pub output_frames: u64,
    /// Duration of the source in seconds, rounded to milliseconds.
    pub source_duration: f64,
    /// Duration of the output in seconds, rounded to milliseconds.
    pub output_duration: f64,
}

/// Derive the sibling path the trimmed copy of `source` is written to.
///
/// `take.wav` becomes `take_trimmed.wav` in the same directory.
pub fn trimmed_path(source: &Path) -> Result<PathBuf, WavTrimError> {
    let invalid = || WavTrimError::InvalidInputName {
        path: source.to_path_buf(),
    };
    let stem = source.file_stem().ok_or_else(invalid)?;
    let extension = source.extension().ok_or_else(invalid)?;

    let mut name = OsString::from(stem);
    name.push(TRIMMED_POSTFIX);
    name.push(".");
    name.push(extension);
    Ok(source.with_file_name(name))
}

/// Number of whole frames covered by `duration` at `sample_rate`.
pub fn frames_for(sample_rate: u32, duration: Duration) -> u64 {
    let frames = u128::from(sample_rate) * duration.as_nanos() / 1_000_000_000;
    u64::try_from(frames).unwrap_or(u64::MAX)
}

/// Duration of `frames` at `sample_rate` in seconds, rounded to three decimals.
pub fn rounded_duration(frames: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    let seconds = frames as f64 / f64::from(sample_rate);
    (seconds * 1_000.0).round() / 1_000.0
}

/// Write a copy of `request.source` without its first `request.trim` of audio.
///
/// The output keeps every format parameter of the source except the frame
/// count. It is created next to the source and never replaces an existing
/// file. The source is only removed once the copy has been finalized and
/// synced to disk; any earlier failure leaves the source untouched and
/// removes the partial output.
///
/// Samples are re-encoded by `hound` from the source spec, so a plain PCM
/// source with more than two channels or more than 16 bits per sample is
/// written with a `WAVE_FORMAT_EXTENSIBLE` header. Rate, channels, bit depth
/// and sample values are unchanged.
///
/// A trim longer than the file fails with
/// [`WavTrimError::TrimExceedsDuration`] before anything is written. A trim
/// of exactly the file length produces a valid, empty WAV file.
pub fn trim_file(request: &TrimRequest) -> Result<TrimResult, WavTrimError> {
    trim_file_with(request, |path: &Path| fs::remove_file(path))
}

/// [`trim_file`] with a custom way of removing the original.
///
/// `remove_original` is only called when the request asks for the original
/// to be deleted, after the output is on disk. When it fails the output is
/// kept and [`WavTrimError::RemoveOriginal`] is returned.
pub fn trim_file_with<F>(
    request: &TrimRequest,
    remove_original: F,
) -> Result<TrimResult, WavTrimError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let source = request.source.as_path();
    let output = trimmed_path(source)?;

    let reader = WavReader::open(source).map_err(|err| container_error(source, err))?;
    let spec = reader.spec();
    let source_frames = u64::from(reader.duration());
    let skipped_frames = frames_for(spec.sample_rate, request.trim);

    let output_frames = source_frames.checked_sub(skipped_frames).ok_or_else(|| {
        WavTrimError::TrimExceedsDuration {
            path: source.to_path_buf(),
            requested: request.trim,
            available: rounded_duration(source_frames, spec.sample_rate),
        }
    })?;

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&output)
        .map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => WavTrimError::OutputExists {
                path: output.clone(),
            },
            _ => write_error(&output, hound::Error::IoError(err)),
        })?;

    let written = write_trimmed(reader, file, source, &output, skipped_frames, output_frames);
    if let Err(err) = written {
        if let Err(cleanup) = fs::remove_file(&output) {
            debug!(
                "failed to remove partial output '{}': {cleanup}",
                output.display()
            );
        }
        return Err(err);
    }

    if request.delete_original {
        remove_original(source).map_err(|err| WavTrimError::RemoveOriginal {
            path: source.to_path_buf(),
            source: err,
        })?;
    }

    debug!(
        "trimmed '{}' -> '{}' ({source_frames} -> {output_frames} frames)",
        source.display(),
        output.display()
    );

    Ok(TrimResult {
        source: source.to_path_buf(),
        output,
        sample_rate: spec.sample_rate,
        source_frames,
        skipped_frames,
        output_frames,
        source_duration: rounded_duration(source_frames, spec.sample_rate),
        output_duration: rounded_duration(output_frames, spec.sample_rate),
    })
}

fn write_trimmed<R: Read + Seek>(
    mut reader: WavReader<R>,
    file: File,
    source: &Path,
    output: &Path,
    skipped_frames: u64,
    output_frames: u64,
) -> Result<(), WavTrimError> {
    let spec = reader.spec();

    // bounded by the frame count the reader reported as a u32
    let skip = u32::try_from(skipped_frames).unwrap_or(u32::MAX);
    reader
        .seek(skip)
        .map_err(|err| container_error(source, hound::Error::IoError(err)))?;

    let mut out = BufWriter::new(file);
    let mut writer = WavWriter::new(&mut out, spec).map_err(|err| write_error(output, err))?;

    let samples = output_frames.saturating_mul(u64::from(spec.channels));
    match spec.sample_format {
        SampleFormat::Int => {
            copy_samples::<i32, _, _>(&mut reader, &mut writer, samples, source, output)?
        }
        SampleFormat::Float => {
            copy_samples::<f32, _, _>(&mut reader, &mut writer, samples, source, output)?
        }
    }

    writer.finalize().map_err(|err| write_error(output, err))?;
    let file = out
        .into_inner()
        .map_err(|err| write_error(output, hound::Error::IoError(err.into_error())))?;
    file.sync_all()
        .map_err(|err| write_error(output, hound::Error::IoError(err)))?;

    Ok(())
}

fn copy_samples<S, R, W>(
    reader: &mut WavReader<R>,
    writer: &mut WavWriter<W>,
    count: u64,
    source: &Path,
    output: &Path,
) -> Result<(), WavTrimError>
where
    S: Sample,
    R: Read,
    W: Write + Seek,
{
    let count = usize::try_from(count).unwrap_or(usize::MAX);
    for sample in reader.samples::<S>().take(count) {
        let sample = sample.map_err(|err| container_error(source, err))?;
        writer
            .write_sample(sample)
            .map_err(|err| write_error(output, err))?;
    }
    Ok(())
}

fn container_error(path: &Path, source: hound::Error) -> WavTrimError {
    WavTrimError::ContainerFormat {
        path: path.to_path_buf(),
        source,
    }
}

fn write_error(path: &Path, source: hound::Error) -> WavTrimError {
    WavTrimError::WriteOutput {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trimmed_path_inserts_postfix_before_extension() {
        let path = trimmed_path(Path::new("/audio/take 1.wav")).unwrap();
        assert_eq!(path, PathBuf::from("/audio/take 1_trimmed.wav"));
    }

    #[test]
    fn trimmed_path_keeps_inner_dots() {
        let path = trimmed_path(Path::new("mix.v2.wav")).unwrap();
        assert_eq!(path, PathBuf::from("mix.v2_trimmed.wav"));
    }

    #[test]
    fn trimmed_path_requires_an_extension() {
        let err = trimmed_path(Path::new("/audio/.wav")).unwrap_err();
        assert!(matches!(err, WavTrimError::InvalidInputName { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn trimmed_path_keeps_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let source = Path::new("/audio").join(OsStr::from_bytes(b"caf\xe9.wav"));
        let path = trimmed_path(&source).unwrap();
        assert_eq!(
            path,
            Path::new("/audio").join(OsStr::from_bytes(b"caf\xe9_trimmed.wav"))
        );
    }

    #[test]
    fn frames_for_whole_and_fractional_seconds() {
        assert_eq!(frames_for(44_100, Duration::from_secs(1)), 44_100);
        assert_eq!(frames_for(44_100, Duration::from_millis(500)), 22_050);
        assert_eq!(frames_for(8_000, Duration::ZERO), 0);
        // 1ms at 22.05kHz is 22.05 frames, the partial frame is kept
        assert_eq!(frames_for(22_050, Duration::from_millis(1)), 22);
    }

    #[test]
    fn rounded_duration_keeps_three_decimals() {
        assert_eq!(rounded_duration(441_000, 44_100), 10.0);
        assert_eq!(rounded_duration(1, 3), 0.333);
        assert_eq!(rounded_duration(2, 3), 0.667);
        assert_eq!(rounded_duration(100, 0), 0.0);
    }
}
