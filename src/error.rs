//! Typed errors for stream-level operations.
//!
//! Reaching the end of a stream is not an error: readers return `Ok(None)`
//! when no records remain. Everything else surfaces as an [`Error`].

use thiserror::Error;

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while framing, decoding or moving records.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed length header, truncated record, or a record that cannot be framed.
    #[error("framing error: {0}")]
    Framing(String),

    /// Bytes do not conform to the requested type.
    #[error("decode error: {0}")]
    Decode(String),

    /// A value could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// Underlying open/read/write/close failure, compression layer included.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV part carries a different header than the first part of a join.
    #[error("CSV header mismatch: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Split limits must allow at least one record per part.
    #[error("split limit must be greater than zero")]
    InvalidLimit,

    /// The requested codec is not compiled in.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn framing(msg: impl Into<String>) -> Self {
        Error::Framing(msg.into())
    }

    pub(crate) fn decode(msg: impl std::fmt::Display) -> Self {
        Error::Decode(msg.to_string())
    }

    pub(crate) fn encode(msg: impl std::fmt::Display) -> Self {
        Error::Encode(msg.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::Io(e.into())
        } else if e.is_syntax() || e.is_eof() || e.is_data() {
            Error::decode(e)
        } else {
            Error::encode(e)
        }
    }
}

#[cfg(feature = "io-csv")]
impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            match e.into_kind() {
                csv::ErrorKind::Io(io) => Error::Io(io),
                other => Error::Decode(format!("{other:?}")),
            }
        } else {
            Error::decode(e)
        }
    }
}

#[cfg(feature = "io-proto")]
impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::decode(e)
    }
}

#[cfg(feature = "io-proto")]
impl From<prost::EncodeError> for Error {
    fn from(e: prost::EncodeError) -> Self {
        Error::encode(e)
    }
}
