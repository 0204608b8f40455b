//! Per-client configuration.
//!
//! A client is immutable once built, so the chunk size used for streamed
//! bodies can be shared across threads without synchronisation.

use std::env;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001/api/v0";
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

const BASE_URL_VAR: &str = "IPFS_API_URL";
const CHUNK_SIZE_VAR: &str = "IPFS_CHUNK_SIZE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// RPC root, e.g. `http://127.0.0.1:5001/api/v0`.
    pub base_url: String,
    /// Upper bound for each streamed chunk of file content.
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ClientConfig {
    /// Read `IPFS_API_URL` and `IPFS_CHUNK_SIZE`, falling back to the defaults
    /// for unset or unusable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let chunk_size = match lookup(CHUNK_SIZE_VAR).map(|v| v.trim().parse::<usize>()) {
            Some(Ok(n)) if n > 0 => n,
            Some(_) => {
                log::warn!("ignoring invalid {CHUNK_SIZE_VAR}, using {DEFAULT_CHUNK_SIZE}");
                DEFAULT_CHUNK_SIZE
            }
            None => DEFAULT_CHUNK_SIZE,
        };
        Self { base_url, chunk_size }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(ClientConfig::from_lookup(lookup(&[])), ClientConfig::default());
    }

    #[test]
    fn reads_both_variables() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("IPFS_API_URL", "http://node:5001/api/v0"),
            ("IPFS_CHUNK_SIZE", "65536"),
        ]));
        assert_eq!(config.base_url, "http://node:5001/api/v0");
        assert_eq!(config.chunk_size, 65536);
    }

    #[test]
    fn bad_chunk_size_falls_back() {
        for bad in ["0", "-3", "lots"] {
            let config = ClientConfig::from_lookup(lookup(&[("IPFS_CHUNK_SIZE", bad)]));
            assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE, "{bad}");
        }
    }
}
