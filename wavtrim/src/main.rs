mod cli;

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;
use wavtrim_core::{
    run_with_progress, BatchOutcome, Config, ProgressReporter, TrimResult, WavTrimError,
    WAV_EXTENSION,
};

use crate::cli::build_cli;

struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn start(&self, total: usize) {
        println!("Trimming {total} {WAV_EXTENSION} files...");
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn trimmed(&self, result: &TrimResult) {
        self.bar.inc(1);
        self.bar.set_message(file_label(&result.source));
    }

    fn failed(&self, path: &Path, _error: &WavTrimError) {
        self.bar.inc(1);
        self.bar.set_message(format!("skipped {}", file_label(path)));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn program_dir() -> anyhow::Result<PathBuf> {
    let exe = env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("'{}' has no parent directory", exe.display()))
}

/// Print `message` and keep an interactive console open until Enter is hit.
///
/// When stdin or stdout is not a terminal (scripts, redirected output) the
/// prompt is skipped.
fn finish_with(message: &str) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "{message}")?;

    if !(stdin.is_terminal() && stdout.is_terminal()) {
        return Ok(());
    }

    write!(stdout, "Press Enter to close.")?;
    stdout.flush()?;
    stdin.lock().read_line(&mut String::new())?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();

    let target_dir = match matches.get_one::<PathBuf>("target_dir") {
        Some(dir) => dir.clone(),
        None => program_dir().context("failed to locate the directory of this program")?,
    };
    let config = Config::new(&target_dir).with_context(|| {
        format!(
            "failed to open target directory '{}'",
            target_dir.display()
        )
    })?;
    debug!("using {config:?}");

    let progress = ProgressBar::new(0);
    progress.set_draw_target(ProgressDrawTarget::stderr());
    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(bar_style);

    let reporter = BarReporter {
        bar: progress.clone(),
    };
    let outcome = run_with_progress(config, &reporter).with_context(|| {
        format!(
            "failed to trim {WAV_EXTENSION} files in '{}'",
            target_dir.display()
        )
    });

    progress.finish_and_clear();

    let message = match outcome? {
        BatchOutcome::NothingFound { .. } => format!("No {WAV_EXTENSION} files found."),
        BatchOutcome::Completed(report) => {
            println!(
                "Trimmed {} of {} {WAV_EXTENSION} files.",
                report.results.len(),
                report.discovered
            );
            for failure in report.failures {
                let path = failure.source.display().to_string();
                eprintln!("Skipped '{path}': {:#}", anyhow::Error::new(failure.error));
            }
            format!("Log file written to {}.", report.log_path.display())
        }
    };

    finish_with(&message).context("failed to interact with the console")?;

    Ok(())
}
