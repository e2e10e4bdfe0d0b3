//! Error types for retroarc operations.
//!
//! Every fallible operation in the workspace returns [`Error`]. The
//! variants map one-to-one onto the failure families surfaced by the
//! archive engine, the stream layer and the filter codecs.

use std::io;
use thiserror::Error;

/// The main error type for retroarc operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The data was recognised but is inconsistent beyond the header
    /// (truncated directory, offset past EOF, corrupt codeword table).
    #[error("invalid or corrupt archive: {message}")]
    InvalidFormat {
        /// Description of the inconsistency.
        message: String,
    },

    /// The caller violated a contract (name too long, illegal
    /// character, attribute out of its declared range).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violated contract.
        message: String,
    },

    /// The format does not support the requested change (insert on a
    /// fixed archive, rename on a nameless format).
    #[error("operation not supported by this format: {message}")]
    InvalidOperation {
        /// Description of the refused operation.
        message: String,
    },

    /// The underlying byte stream failed.
    #[error("I/O error at offset {position}: {source}")]
    Io {
        /// Stream position at which the failure occurred.
        position: u64,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A filter codec detected corrupt encoded input.
    #[error("codec error at offset {offset}: {message}")]
    CodecFailed {
        /// Decoder byte offset at which corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A recognised format or codec direction whose writer is not
    /// implemented.
    #[error("unsupported: {message}")]
    Unsupported {
        /// What is missing.
        message: String,
    },
}

/// Result type alias for retroarc operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid-format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create an I/O error carrying the failing stream position.
    pub fn io(position: u64, source: io::Error) -> Self {
        Self::Io { position, source }
    }

    /// Create an I/O error for a short read or write at `position`.
    pub fn short_io(position: u64) -> Self {
        Self::Io {
            position,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of stream"),
        }
    }

    /// Create a codec error carrying the decoder's byte offset.
    pub fn codec(offset: u64, message: impl Into<String>) -> Self {
        Self::CodecFailed {
            offset,
            message: message.into(),
        }
    }

    /// Create an unsupported-feature error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}
