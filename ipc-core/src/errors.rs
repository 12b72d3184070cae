use std::{
    fmt::{Display, Formatter},
    io, result,
};

use arrow_schema::ArrowError;
use flatbuffers::InvalidFlatbuffer;

/// The error taxonomy for the reader. Every fallible operation in this crate
/// returns one of these variants rather than panicking on file content.
#[derive(Debug)]
pub enum Error {
    /// Magic bytes missing or mismatched.
    NotArrowFile(String),
    /// Structural inconsistency: short footer, bad size, body length
    /// mismatch, unexpected message type, short decompress.
    Malformed(String),
    /// Block or buffer offset/length not a multiple of 8.
    Misaligned(String),
    /// Caller-supplied expected schema disagrees with the file schema.
    SchemaMismatch(String),
    /// A logical type the loader does not implement.
    Unsupported(String),
    /// Recursion depth exceeded `max_nesting_depth`.
    NestingTooDeep(usize),
    /// Underlying source or decompressor failure.
    Io(io::Error),
    /// Out-of-range record index, or other caller contract violation.
    ProgrammerError(String),
}

pub type Result<T, E = Error> = result::Result<T, E>;

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotArrowFile(msg) => write!(f, "not an Arrow IPC file: {msg}"),
            Error::Malformed(msg) => write!(f, "malformed Arrow IPC file: {msg}"),
            Error::Misaligned(msg) => write!(f, "misaligned Arrow IPC file: {msg}"),
            Error::SchemaMismatch(msg) => write!(f, "schema mismatch: {msg}"),
            Error::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Error::NestingTooDeep(depth) => {
                write!(f, "nesting exceeds maximum depth ({depth})")
            }
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::ProgrammerError(msg) => write!(f, "programmer error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<ArrowError> for Error {
    fn from(e: ArrowError) -> Error {
        Error::Malformed(e.to_string())
    }
}

impl From<InvalidFlatbuffer> for Error {
    fn from(e: InvalidFlatbuffer) -> Error {
        Error::Malformed(format!("unable to parse flatbuffer: {e}"))
    }
}

impl From<object_store::Error> for Error {
    fn from(e: object_store::Error) -> Error {
        Error::Io(io::Error::other(e))
    }
}

/// Shorthand for constructing a [`Error::Malformed`] from a format string.
#[macro_export]
macro_rules! malformed {
    ($($arg:tt)*) => {
        $crate::errors::Error::Malformed(format!($($arg)*))
    };
}
