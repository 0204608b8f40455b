//! Error types for the IPFS RPC client.
//!
//! # Design
//! Local validation errors are raised while building a request and never
//! reach the transport. Daemon errors are not interpreted: any non-200 status
//! lands in `Remote` with the raw status and body. Malformed payloads end up
//! in `Deserialization`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A local path handed to `add` does not exist.
    #[error("local path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    /// `add` was given a directory without `recursive`.
    #[error("{} is a directory, set `recursive` to add it", .0.display())]
    DirectoryNotRecursive(PathBuf),

    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A single file passed to `add` is excluded by the pattern set.
    #[error("{} does not match any pattern", .0.display())]
    NoMatchingFiles(PathBuf),

    /// A name under an added path is not valid UTF-8 and cannot be sent
    /// as a part name.
    #[error("{} is not valid UTF-8", .0.display())]
    NonUtf8Path(PathBuf),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// The daemon answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Deserialization(e.to_string())
    }
}
