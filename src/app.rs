//! Wiring between a [`PathProvider`], the converter and a [`ConversionReporter`].

use std::path::PathBuf;

use tracing::debug;

use crate::{
    builder::{Conversion, ConverterBuilder},
    errors::ConvertResult,
    traits::{ConversionReporter, PathProvider},
};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write here instead of next to the input
    pub output: Option<PathBuf>,
    /// Convert without writing anything
    pub dry_run: bool,
}

/// Converts the file named by `provider` and reports the outcome.
///
/// The error is handed to the reporter and also returned, so the caller can
/// pick an exit status.
pub fn run<P, R>(provider: &mut P, reporter: &mut R, options: &RunOptions) -> ConvertResult<Conversion>
where
    P: PathProvider + ?Sized,
    R: ConversionReporter + ?Sized,
{
    let result = provider.input_path().and_then(|input| {
        debug!(input = %input.display(), dry_run = options.dry_run, "converting");

        let mut builder = ConverterBuilder::new().input(&input);
        if let Some(output) = &options.output {
            builder = builder.output(output);
        }

        if options.dry_run {
            builder.convert()
        } else {
            builder.write()
        }
    });

    match &result {
        Ok(conversion) => reporter.success(conversion),
        Err(error) => reporter.failure(error),
    }
    result
}
