use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Error type for keyv operations.
#[derive(Error, Debug)]
pub enum KeyvError {
    /// An adapter is already registered under this scheme name.
    #[error("Adapter already registered: {0}")]
    AdapterAlreadyRegistered(String),

    /// No adapter is registered under this scheme name.
    #[error("Adapter not found: {0}")]
    AdapterNotFound(String),

    /// The adapter factory could not establish the backend.
    #[error("Connection to {uri} failed: {reason}")]
    ConnectionFailed {
        /// The connection string passed to the factory.
        uri: String,
        /// Backend-supplied cause.
        reason: String,
    },

    /// Key not found in the current namespace.
    #[error("Key not found")]
    KeyNotFound,

    /// A value could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A stored value could not be decoded into the requested type.
    #[error("Deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// IO error from file or network operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error from the sled embedded database.
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Stored bytes are not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// Malformed log record or wire message.
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Unexpected command type encountered in a log file.
    #[error("Unexpected command type")]
    UnexpectedCommandType,

    /// Log file not found for the given generation.
    #[error("Log file not found for generation {0}")]
    LogFileNotFound(u64),

    /// Error with a plain message, e.g. reported by a remote server.
    #[error("{0}")]
    StringError(String),
}

impl KeyvError {
    /// Builds a [`KeyvError::ConnectionFailed`] for `uri`.
    pub fn connection_failed(uri: &str, reason: impl ToString) -> Self {
        KeyvError::ConnectionFailed {
            uri: uri.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for keyv operations.
pub type Result<T> = std::result::Result<T, KeyvError>;
