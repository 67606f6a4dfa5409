use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Whether a file was being opened for reading or for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileMode::Read => f.write_str("reading"),
            FileMode::Write => f.write_str("writing"),
        }
    }
}

/// Errors that can abort an OFX to QFX conversion
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Input could not be read or output could not be written
    #[error("Unable to open {} for {mode}: {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        mode: FileMode,
        #[source]
        source: io::Error,
    },

    /// The XML body of the statement is malformed
    #[error("{message}; line {line}, column {column}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    /// A node on the sign-on path is missing
    #[error("Error reading node {0}")]
    NodeNotFound(String),

    /// The path provider returned without a file
    #[error("No file selected")]
    NoInputSelected,

    /// The converter was run with neither content nor an input path
    #[error("Content or input path is required")]
    MissingInput,

    /// The derived output path points back at the input file
    #[error("Output {} would overwrite the input file", .0.display())]
    OutputOverwritesInput(PathBuf),
}

impl ConvertError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::FileOpen {
            path: path.into(),
            mode: FileMode::Read,
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::FileOpen {
            path: path.into(),
            mode: FileMode::Write,
            source,
        }
    }

    /// Short title for the operator-facing report
    pub fn title(&self) -> &'static str {
        match self {
            ConvertError::FileOpen { mode: FileMode::Read, .. } => "Unable to open file for reading",
            ConvertError::FileOpen { mode: FileMode::Write, .. } => "Unable to open file for writing",
            ConvertError::Parse { .. } => "Error reading file",
            ConvertError::NodeNotFound(_) => "Node Error",
            ConvertError::NoInputSelected => "OFX File Selection",
            ConvertError::MissingInput => "OFX File Selection",
            ConvertError::OutputOverwritesInput(_) => "Unable to open file for writing",
        }
    }
}

/// Convenience alias for results carrying [`ConvertError`]
pub type ConvertResult<T> = Result<T, ConvertError>;
