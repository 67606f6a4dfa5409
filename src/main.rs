use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use ofx2qfx::{
    Conversion, RunOptions,
    errors::{ConvertError, ConvertResult},
    run,
    traits::{ConversionReporter, PathProvider},
};
use tracing_subscriber::EnvFilter;

/// Convert a bank-exported OFX statement into a QFX file Quicken will import
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// OFX file to convert; asked for on stdin when omitted
    input: Option<PathBuf>,

    /// Write the QFX file here instead of next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the converted file to stdout and write nothing
    #[arg(long)]
    dry_run: bool,

    /// Report the result as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

/// Takes the path from the command line, or prompts for it.
struct ArgOrPrompt(Option<PathBuf>);

impl PathProvider for ArgOrPrompt {
    fn input_path(&mut self) -> ConvertResult<PathBuf> {
        if let Some(path) = self.0.take() {
            return Ok(path);
        }

        eprint!("Select OFX file: ");
        if let Err(e) = io::stderr().flush() {
            tracing::debug!("could not flush prompt: {e}");
        }

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|_| ConvertError::NoInputSelected)?;

        match line.trim() {
            "" => Err(ConvertError::NoInputSelected),
            path => Ok(PathBuf::from(path)),
        }
    }
}

struct ConsoleReporter {
    json: bool,
    dry_run: bool,
}

impl ConversionReporter for ConsoleReporter {
    fn success(&mut self, conversion: &Conversion) {
        if self.dry_run {
            print!("{}", conversion.content);
            return;
        }
        if self.json {
            match serde_json::to_string_pretty(conversion) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!("failed to serialize report: {e}"),
            }
            return;
        }

        let show = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        println!(
            "Successfully converted {} to QFX format: {}",
            show(&conversion.input),
            show(&conversion.output)
        );
    }

    fn failure(&mut self, error: &ConvertError) {
        if self.json {
            let report = serde_json::json!({ "error": error.title(), "message": error.to_string() });
            println!("{report}");
            return;
        }
        eprintln!("{}: {}", error.title(), error);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = RunOptions {
        output: cli.output,
        dry_run: cli.dry_run,
    };
    let mut provider = ArgOrPrompt(cli.input);
    let mut reporter = ConsoleReporter {
        json: cli.json,
        dry_run: cli.dry_run,
    };

    match run(&mut provider, &mut reporter, &options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
