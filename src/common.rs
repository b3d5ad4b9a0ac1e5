use serde::{Deserialize, Serialize};

/// Request sent from a remote adapter to a server.
///
/// Keys are already fully qualified; the server applies them to its
/// backend verbatim.
#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    /// Check whether a key exists.
    Has {
        /// The key to look up.
        key: String,
    },
    /// Get the raw value for a key.
    Get {
        /// The key to look up.
        key: String,
    },
    /// Store a raw value.
    Set {
        /// The key to set.
        key: String,
        /// The value to associate with the key.
        value: String,
    },
    /// Remove a key.
    Remove {
        /// The key to remove.
        key: String,
    },
    /// Remove every key with the given prefix.
    Clear {
        /// Prefix of the keys to remove.
        prefix: String,
    },
    /// List every key in the backend.
    Keys,
}

/// Response sent from server to client.
#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    /// Operation succeeded, optionally with a value.
    Ok(Option<String>),
    /// Answer to [`Request::Has`].
    Bool(bool),
    /// Answer to [`Request::Keys`].
    Keys(Vec<String>),
    /// Operation failed with an error message.
    Err(String),
}
