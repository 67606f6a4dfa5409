use std::path::PathBuf;

use crate::{builder::Conversion, errors::{ConvertError, ConvertResult}};

/// Supplies the OFX file to convert.
pub trait PathProvider {
    fn input_path(&mut self) -> ConvertResult<PathBuf>;
}

/// Receives the outcome of a conversion run.
pub trait ConversionReporter {
    fn success(&mut self, conversion: &Conversion);

    fn failure(&mut self, error: &ConvertError);
}

impl PathProvider for Option<PathBuf> {
    fn input_path(&mut self) -> ConvertResult<PathBuf> {
        self.take().ok_or(ConvertError::NoInputSelected)
    }
}
