use std::io;

use thiserror::Error;

/// Errors produced while indexing, training, evaluating or persisting models
#[derive(Debug, Error)]
pub enum Error {
    /// The model stream is malformed, truncated or of an unknown kind
    #[error("invalid model format: {0}")]
    Format(String),
    /// Training input or parameters are unusable
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// A non-finite value showed up during training
    #[error("numerical error: {0}")]
    Numerical(String),
    /// The quasi-Newton optimizer gave up
    #[error("optimization failed: {0}")]
    Optimization(String),
    /// A line of an event file could not be parsed
    #[error("malformed event at line {line}: {message}")]
    Event { line: usize, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn format<S: Into<String>>(message: S) -> Self {
        Error::Format(message.into())
    }

    pub(crate) fn config<S: Into<String>>(message: S) -> Self {
        Error::Configuration(message.into())
    }

    pub(crate) fn numerical<S: Into<String>>(message: S) -> Self {
        Error::Numerical(message.into())
    }

    /// Map a transport error raised while reading a model.
    ///
    /// Running out of bytes means the stream itself is truncated, which is a
    /// format problem rather than an I/O one.
    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::Format("truncated model stream".to_string())
        } else {
            Error::Io(err)
        }
    }
}
