use std::fmt;
use std::io;

use crate::util;

/// The taxonomy from the core's error handling design: every fatal condition
/// the pipeline can raise falls into exactly one of these buckets. Only
/// `InputError` has a case that is *not* fatal (a declared filter), and that
/// distinction is made by the caller (`InputStage::next`), not here.
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    /// Mutually exclusive options, unknown column reference, unsupported
    /// type length, or any other misconfiguration caught before I/O starts.
    Config(String),
    /// A single record could not be decoded: short record for declared
    /// offsets, malformed date, or the underlying reader's own I/O error.
    Input {
        message: String,
        record_number: Option<u64>,
        source_name: Option<String>,
    },
    /// Write, rename, or ordering self-check failure. Always fatal.
    Output(String),
    /// WHERE/STOP equation did not return a Boolean (or Null, which has its
    /// own asymmetric handling documented on `crate::predicate`).
    Predicate(String),
    /// Tournament invariant violation: a state the orchestrator should be
    /// able to prove impossible but checks anyway.
    Internal(String),
    Flag(docopt::Error),
    Csv(csv::Error),
    Io(io::Error),
    Help(String, i32),
}

impl CliError {
    pub fn input(message: impl Into<String>) -> Self {
        CliError::Input {
            message: message.into(),
            record_number: None,
            source_name: None,
        }
    }

    pub fn input_at(message: impl Into<String>, record_number: u64, source_name: &str) -> Self {
        CliError::Input {
            message: message.into(),
            record_number: Some(record_number),
            source_name: Some(source_name.to_string()),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CliError::Config(s) => write!(f, "configuration error: {}", s),
            CliError::Input {
                message,
                record_number,
                source_name,
            } => match (record_number, source_name) {
                (Some(n), Some(name)) => {
                    write!(f, "input error at record {} of {}: {}", n, name, message)
                }
                (Some(n), None) => write!(f, "input error at record {}: {}", n, message),
                _ => write!(f, "input error: {}", message),
            },
            CliError::Output(s) => write!(f, "output error: {}", s),
            CliError::Predicate(s) => write!(f, "predicate error: {}", s),
            CliError::Internal(s) => write!(f, "internal error (this is a bug): {}", s),
            CliError::Flag(e) => e.fmt(f),
            CliError::Csv(e) => e.fmt(f),
            CliError::Io(e) => e.fmt(f),
            CliError::Help(s, _) => f.write_str(s),
        }
    }
}

impl From<docopt::Error> for CliError {
    fn from(err: docopt::Error) -> CliError {
        use colored::Colorize;

        match err {
            docopt::Error::WithProgramUsage(kind, usage) => {
                let usage = util::colorize_help(&usage);

                match kind.as_ref() {
                    docopt::Error::Help => CliError::Help(usage, 0),
                    _ => CliError::Help(
                        format!(
                            "{}\n\n{} Use the {} flag for more information.",
                            usage,
                            "Invalid command!".red(),
                            "-h,--help".cyan()
                        ),
                        1,
                    ),
                }
            }
            _ => CliError::Flag(err),
        }
    }
}

impl From<csv::Error> for CliError {
    fn from(err: csv::Error) -> CliError {
        if !err.is_io_error() {
            return CliError::Csv(err);
        }
        match err.into_kind() {
            csv::ErrorKind::Io(v) => From::from(v),
            _ => unreachable!(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> CliError {
        CliError::Io(err)
    }
}

impl From<String> for CliError {
    fn from(err: String) -> CliError {
        CliError::Config(err)
    }
}

impl<'a> From<&'a str> for CliError {
    fn from(err: &'a str) -> CliError {
        CliError::Config(err.to_owned())
    }
}

impl std::error::Error for CliError {}
