//! Stateless request builder and response parser for the RPC API.
//!
//! # Design
//! `IpfsClient` holds only its base URL and chunk size and carries no mutable
//! state between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The caller executes the round trip in between, keeping the
//! core deterministic and free of network I/O.
//!
//! Top-level operations live here; the MFS operations are grouped under
//! `IpfsClient::files`.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::config::{ClientConfig, DEFAULT_CHUNK_SIZE};
use crate::error::ApiError;
use crate::files::Files;
use crate::http::{HttpRequest, HttpResponse, ResponseKind};
use crate::multipart::MultipartBody;
use crate::options::{AddOptions, CatOptions, Options};
use crate::pattern::PatternSet;
use crate::types::{AddedNode, FileLs, ObjectLs};

/// Synchronous, stateless client for the RPC API.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values without
/// touching the network.
#[derive(Debug, Clone)]
pub struct IpfsClient {
    base_url: String,
    chunk_size: usize,
}

impl IpfsClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(ClientConfig {
            base_url: base_url.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chunk_size: config.chunk_size.max(1),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Operations on the daemon's Mutable File System.
    pub fn files(&self) -> Files<'_> {
        Files::new(self)
    }

    pub(crate) fn request(
        &self,
        endpoint: &str,
        args: Vec<String>,
        opts: Options,
        response: ResponseKind,
    ) -> HttpRequest {
        log::debug!("building {endpoint} request: {} arg(s), {} option(s)", args.len(), opts.len());
        HttpRequest::new(format!("{}{endpoint}", self.base_url), args, opts, response)
    }

    /// Add a local file, or with `recursive` a directory tree, to the store.
    ///
    /// Fails locally if `path` does not exist, is a directory while
    /// `recursive` is off, or if a pattern does not compile. Use
    /// `build_add_paths` for several roots.
    pub fn build_add(&self, path: impl AsRef<Path>, opts: &AddOptions) -> Result<HttpRequest, ApiError> {
        let patterns = PatternSet::new(&opts.pattern)?;
        let body = MultipartBody::from_path(path.as_ref(), opts.recursive, &patterns, self.chunk_size)?;
        Ok(self
            .request("/add", Vec::new(), opts.to_options(), ResponseKind::Json)
            .with_body(body))
    }

    /// Add several local files or trees in one request, each filtered as in
    /// `build_add`. Files the patterns exclude are skipped; the build fails
    /// with `NoMatchingFiles` only when nothing is left to send.
    pub fn build_add_paths<P: AsRef<Path>>(&self, paths: &[P], opts: &AddOptions) -> Result<HttpRequest, ApiError> {
        let patterns = PatternSet::new(&opts.pattern)?;
        let body = MultipartBody::from_paths(paths, opts.recursive, &patterns, self.chunk_size)?;
        Ok(self
            .request("/add", Vec::new(), opts.to_options(), ResponseKind::Json)
            .with_body(body))
    }

    /// List UnixFS directory contents. A reference without `/ipfs/` or
    /// `/ipns/` prefix is resolved by the daemon as an `/ipfs/` path.
    pub fn build_file_ls(&self, multihash: &str) -> HttpRequest {
        self.request("/file/ls", vec![multihash.to_string()], Options::new(), ResponseKind::Json)
    }

    /// Download a file or directory. The host writes the returned archive
    /// into its working directory.
    pub fn build_get(&self, multihash: &str) -> HttpRequest {
        self.request("/get", vec![multihash.to_string()], Options::new(), ResponseKind::Download)
    }

    pub fn build_cat(&self, multihash: &str, opts: &CatOptions) -> HttpRequest {
        self.request("/cat", vec![multihash.to_string()], opts.to_options(), ResponseKind::Raw)
    }

    /// List the links of a DAG object.
    pub fn build_ls(&self, multihash: &str) -> HttpRequest {
        self.request("/ls", vec![multihash.to_string()], Options::new(), ResponseKind::Json)
    }

    /// One record per added node, in the order the daemon reported them.
    pub fn parse_add(&self, response: HttpResponse) -> Result<Vec<AddedNode>, ApiError> {
        check_status(&response)?;
        serde_json::Deserializer::from_slice(&response.body)
            .into_iter::<AddedNode>()
            .map(|node| node.map_err(ApiError::from))
            .collect()
    }

    pub fn parse_file_ls(&self, response: HttpResponse) -> Result<FileLs, ApiError> {
        parse_json(response)
    }

    pub fn parse_get(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_cat(&self, response: HttpResponse) -> Result<Vec<u8>, ApiError> {
        parse_raw(response)
    }

    pub fn parse_ls(&self, response: HttpResponse) -> Result<ObjectLs, ApiError> {
        parse_json(response)
    }
}

impl Default for IpfsClient {
    fn default() -> Self {
        Self::with_config(ClientConfig::default())
    }
}

/// Anything but 200 is a daemon error, passed through uninterpreted.
pub(crate) fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == 200 {
        return Ok(());
    }
    Err(ApiError::Remote {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}

pub(crate) fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    Ok(serde_json::from_slice(&response.body)?)
}

pub(crate) fn parse_raw(response: HttpResponse) -> Result<Vec<u8>, ApiError> {
    check_status(&response)?;
    Ok(response.body)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::options::OptionValue;

    fn client() -> IpfsClient {
        IpfsClient::new("http://localhost:5001/api/v0")
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = IpfsClient::new("http://localhost:5001/api/v0/");
        let req = client.build_ls("QmA");
        assert_eq!(req.path, "http://localhost:5001/api/v0/ls");
    }

    #[test]
    fn default_client_targets_local_daemon() {
        let client = IpfsClient::default();
        assert_eq!(client.base_url(), "http://127.0.0.1:5001/api/v0");
        assert_eq!(client.chunk_size(), 4096);
    }

    #[test]
    fn cat_defaults_send_no_options() {
        let req = client().build_cat("QmA", &CatOptions::default());
        assert_eq!(req.path, "http://localhost:5001/api/v0/cat");
        assert_eq!(req.args, vec!["QmA"]);
        assert!(req.opts.is_empty());
        assert_eq!(req.response, ResponseKind::Raw);
    }

    #[test]
    fn cat_sends_non_default_range() {
        let req = client().build_cat("QmA", &CatOptions { offset: 10, length: 5, ..Default::default() });
        assert_eq!(req.opts.get("offset"), Some(&OptionValue::Uint(10)));
        assert_eq!(req.opts.get("length"), Some(&OptionValue::Int(5)));
        assert_eq!(req.url(), "http://localhost:5001/api/v0/cat?arg=QmA&length=5&offset=10");
    }

    #[test]
    fn file_ls_passes_reference_through() {
        let req = client().build_file_ls("QmTkzDwWqPbnAh5YiV5VwcTLnGdwSNsNTn2aDxdXBFca7D");
        assert_eq!(req.path, "http://localhost:5001/api/v0/file/ls");
        assert_eq!(req.args, vec!["QmTkzDwWqPbnAh5YiV5VwcTLnGdwSNsNTn2aDxdXBFca7D"]);
        assert_eq!(req.response, ResponseKind::Json);
    }

    #[test]
    fn get_is_a_download() {
        let req = client().build_get("/ipfs/QmA");
        assert_eq!(req.path, "http://localhost:5001/api/v0/get");
        assert_eq!(req.response, ResponseKind::Download);
        assert!(req.body.is_none());
    }

    #[test]
    fn add_streams_body_with_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nurseryrhyme.txt");
        fs::write(&file, "Mary had a little lamb").unwrap();

        let req = client()
            .build_add(&file, &AddOptions { only_hash: true, ..Default::default() })
            .unwrap();
        assert!(req.args.is_empty());
        assert_eq!(req.opts.get("only-hash"), Some(&OptionValue::Bool(true)));
        let body = req.body.as_ref().unwrap();
        assert_eq!(body.part_names().collect::<Vec<_>>(), vec!["nurseryrhyme.txt"]);
        assert_eq!(req.headers, vec![("content-type".to_string(), body.content_type())]);
    }

    #[test]
    fn add_paths_sends_every_kept_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.log");
        let c = dir.path().join("c.txt");
        for f in [&a, &b, &c] {
            fs::write(f, "x").unwrap();
        }

        let opts = AddOptions { pattern: vec!["*.txt".into()], ..Default::default() };
        let req = client().build_add_paths(&[&a, &b, &c], &opts).unwrap();
        assert_eq!(req.path, "http://localhost:5001/api/v0/add");
        let body = req.body.as_ref().unwrap();
        assert_eq!(body.part_names().collect::<Vec<_>>(), vec!["a.txt", "c.txt"]);

        let err = client().build_add_paths(&[&b], &opts).unwrap_err();
        assert!(matches!(err, ApiError::NoMatchingFiles(_)));
    }

    #[test]
    fn add_directory_without_recursive_fails_locally() {
        let dir = tempfile::tempdir().unwrap();
        let err = client().build_add(dir.path(), &AddOptions::default()).unwrap_err();
        assert!(matches!(err, ApiError::DirectoryNotRecursive(_)));
    }

    #[test]
    fn add_rejects_bad_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let opts = AddOptions {
            recursive: true,
            pattern: vec!["{unclosed".into()],
            ..Default::default()
        };
        let err = client().build_add(dir.path(), &opts).unwrap_err();
        assert!(matches!(err, ApiError::InvalidPattern { .. }));
    }

    #[test]
    fn parse_add_reads_every_record() {
        let body = concat!(
            r#"{"Name":"docs/a.txt","Hash":"QmA","Size":"9"}"#,
            "\n",
            r#"{"Name":"docs","Hash":"QmD","Size":"60"}"#,
            "\n"
        );
        let nodes = client().parse_add(ok(body)).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "docs/a.txt");
        assert_eq!(nodes[1].hash, "QmD");
        assert_eq!(nodes[1].size.as_deref(), Some("60"));
    }

    #[test]
    fn parse_add_bad_json() {
        let err = client().parse_add(ok("{\"Name\":")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn remote_errors_are_opaque() {
        let response = HttpResponse {
            status: 500,
            headers: Vec::new(),
            body: br#"{"Message":"this dag node is a directory","Code":0,"Type":"error"}"#.to_vec(),
        };
        let err = client().parse_cat(response).unwrap_err();
        match err {
            ApiError::Remote { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("this dag node is a directory"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_cat_returns_raw_bytes() {
        let bytes = client().parse_cat(ok("<!DOCTYPE html>")).unwrap();
        assert_eq!(bytes, b"<!DOCTYPE html>");
    }

    #[test]
    fn parse_ls_decodes_links() {
        let body = r#"{"Objects":[{"Hash":"QmTk","Links":[{"Name":"Makefile","Hash":"Qmd2","Size":174,"Type":2}]}]}"#;
        let ls = client().parse_ls(ok(body)).unwrap();
        assert_eq!(ls.objects[0].hash, "QmTk");
        assert_eq!(ls.objects[0].links[0].link_type, 2);
    }

    #[test]
    fn parse_get_checks_status() {
        assert!(client().parse_get(ok("")).is_ok());
        let response = HttpResponse { status: 404, headers: Vec::new(), body: Vec::new() };
        assert!(matches!(client().parse_get(response), Err(ApiError::Remote { status: 404, .. })));
    }
}
