//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe RPC requests and responses as plain data. The core
//! crate builds `HttpRequest` values and parses `HttpResponse` values without
//! ever touching the network; the caller (host) executes the actual I/O.
//!
//! Positional arguments and options are kept structured on the request so
//! callers and tests can inspect them. `query_pairs` and `url` render them in
//! the daemon's wire form: every positional argument becomes a repeated `arg`
//! parameter, every option a same-named parameter.

use url::form_urlencoded;

use crate::multipart::MultipartBody;
use crate::options::Options;

/// HTTP method for a request. The RPC API only accepts POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HttpMethod {
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
        }
    }
}

/// How the host should treat the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Opaque bytes, returned as-is.
    Raw,
    /// A JSON record, or newline-delimited JSON records for `/add`.
    Json,
    /// An archive the host's download collaborator writes to disk.
    Download,
}

/// A single RPC call described as plain data.
///
/// Built by the client's `build_*` methods. The caller executes it against the
/// daemon and hands the resulting `HttpResponse` to the matching `parse_*`.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Endpoint URL without the query string.
    pub path: String,
    pub args: Vec<String>,
    pub opts: Options,
    pub headers: Vec<(String, String)>,
    pub body: Option<MultipartBody>,
    pub response: ResponseKind,
}

impl HttpRequest {
    pub(crate) fn new(path: String, args: Vec<String>, opts: Options, response: ResponseKind) -> Self {
        Self {
            method: HttpMethod::Post,
            path,
            args,
            opts,
            headers: Vec::new(),
            body: None,
            response,
        }
    }

    pub(crate) fn with_body(mut self, body: MultipartBody) -> Self {
        self.headers.push(("content-type".to_string(), body.content_type()));
        self.body = Some(body);
        self
    }

    /// Query parameters in wire order: `arg` pairs first, then options.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> =
            self.args.iter().map(|a| ("arg".to_string(), a.clone())).collect();
        pairs.extend(self.opts.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        pairs
    }

    /// Full request URL including the encoded query string.
    pub fn url(&self) -> String {
        let pairs = self.query_pairs();
        if pairs.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        format!("{}?{query}", self.path)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the caller after executing an `HttpRequest`, then passed
/// to the matching `parse_*` method.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(args: &[&str], opts: Options) -> HttpRequest {
        HttpRequest::new(
            "http://localhost:5001/api/v0/files/read".to_string(),
            args.iter().map(|a| a.to_string()).collect(),
            opts,
            ResponseKind::Raw,
        )
    }

    #[test]
    fn args_come_before_options() {
        let mut opts = Options::new();
        opts.insert("offset", 3u64);
        opts.insert("create", true);
        let req = request(&["/a", "/b"], opts);
        assert_eq!(
            req.query_pairs(),
            vec![
                ("arg".to_string(), "/a".to_string()),
                ("arg".to_string(), "/b".to_string()),
                ("create".to_string(), "true".to_string()),
                ("offset".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn url_encodes_query() {
        let mut opts = Options::new();
        opts.insert("parents", false);
        let req = request(&["/dir with space/ü"], opts);
        assert_eq!(
            req.url(),
            "http://localhost:5001/api/v0/files/read?arg=%2Fdir+with+space%2F%C3%BC&parents=false"
        );
    }

    #[test]
    fn url_without_query_is_bare_path() {
        let req = request(&[], Options::new());
        assert_eq!(req.url(), "http://localhost:5001/api/v0/files/read");
    }

    #[test]
    fn new_request_is_post_without_body() {
        let req = request(&["/x"], Options::new());
        assert_eq!(req.method.as_str(), "POST");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }
}
