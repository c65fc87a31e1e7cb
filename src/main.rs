use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use exeprobe::logging::{init_tracing, init_tracing_json, level_for_verbosity};
use exeprobe::{inspect_path, ProbeConfig, ProbeError, SectionRecord};

/// List the sections of a PE, ELF32 or ELF64 executable
#[derive(Parser)]
#[command(name = "exeprobe", version, about)]
struct Cli {
    /// Path to the executable
    path: PathBuf,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print one JSON object per section
    #[arg(long)]
    json: bool,

    /// Print format, OS, architecture and bitness to stderr
    #[arg(long)]
    info: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let rendered = e.render().to_string();
            let line = rendered.lines().next().unwrap_or("invalid arguments");
            eprintln!("exeprobe: {line}");
            return ExitCode::FAILURE;
        }
    };

    let level = level_for_verbosity(cli.verbose);
    if cli.log_json {
        init_tracing_json(level);
    } else {
        init_tracing(level);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("exeprobe: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let summary = inspect_path(&cli.path, &config, |record| {
        let line = render(record, cli.json)?;
        writeln!(out, "{line}").map_err(write_error)
    })?;

    out.flush().map_err(write_error)?;

    if cli.info {
        eprintln!("{}", summary.info);
    }
    tracing::debug!(format = %summary.format, sections = summary.sections, "Done");
    Ok(())
}

fn render(record: &SectionRecord<'_>, json: bool) -> exeprobe::Result<String> {
    if json {
        serde_json::to_string(&record.to_row()).map_err(|e| write_error(e.into()))
    } else {
        Ok(record.to_string())
    }
}

fn write_error(source: io::Error) -> ProbeError {
    ProbeError::Io {
        op: "write",
        path: PathBuf::from("<stdout>"),
        source,
    }
}
