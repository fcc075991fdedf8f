use std::path::PathBuf;

use clap::{value_parser, Arg, Command};

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Remove the first second of every .wav file in a directory tree")
        .long_about(
            "Remove the first second of every .wav file in a directory tree.\n\n\
             Each file is copied to <name>_trimmed.wav next to it and the original \
             is deleted once the copy is on disk. A summary is written to \
             Wav_file_trim_log.csv in the target directory.",
        )
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("target_dir")
                .value_name("TARGET_DIR")
                .help("Directory to scan (defaults to the directory containing this program)")
                .value_parser(value_parser!(PathBuf)),
        )
}
