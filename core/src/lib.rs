//! Synchronous request-shaping core for the IPFS HTTP RPC API.
//!
//! # Overview
//! Builds `HttpRequest` values for the daemon's Mutable File System and
//! content retrieval endpoints and parses the matching `HttpResponse` values,
//! without touching the network (host-does-IO pattern). The caller executes
//! the actual HTTP round trip.
//!
//! # Design
//! - `IpfsClient` is immutable: it holds only the base URL and chunk size.
//! - Each operation is split into `build_*` (produces a request) and
//!   `parse_*` (consumes a response), so the I/O boundary is explicit.
//! - Option maps are built fresh per call from typed option records.
//! - Request bodies are multipart streams produced lazily from a reader or a
//!   local file tree.

pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod multipart;
pub mod options;
pub mod pattern;
pub mod types;

pub use client::IpfsClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use files::Files;
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseKind};
pub use multipart::MultipartBody;
pub use options::{
    AddOptions, CatOptions, MkdirOptions, OptionValue, Options, ReadOptions, RmOptions, WriteOptions,
    UNBOUNDED_LENGTH,
};
pub use pattern::Pattern;
pub use types::{
    AddedNode, FileLs, FileStat, FilesLs, Flushed, ListedObject, MfsEntry, ObjectLink, ObjectLs, UnixfsLink,
    UnixfsObject,
};
