//! Mutable File System (`/files/*`) operations.

use std::io::Read;

use crate::client::{check_status, parse_json, parse_raw, IpfsClient};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, ResponseKind};
use crate::multipart::MultipartBody;
use crate::options::{MkdirOptions, Options, ReadOptions, RmOptions, WriteOptions};
use crate::types::{FileStat, FilesLs, Flushed};

/// MFS section of an `IpfsClient`, obtained through `IpfsClient::files`.
#[derive(Debug, Clone, Copy)]
pub struct Files<'a> {
    client: &'a IpfsClient,
}

impl<'a> Files<'a> {
    pub(crate) fn new(client: &'a IpfsClient) -> Self {
        Self { client }
    }

    fn simple(&self, endpoint: &str, args: &[&str], response: ResponseKind) -> HttpRequest {
        let args = args.iter().map(|a| a.to_string()).collect();
        self.client.request(endpoint, args, Options::new(), response)
    }

    /// Copy within the MFS. No content is duplicated on the daemon.
    pub fn build_cp(&self, source: &str, dest: &str) -> HttpRequest {
        self.simple("/files/cp", &[source, dest], ResponseKind::Raw)
    }

    pub fn build_ls(&self, path: &str) -> HttpRequest {
        self.simple("/files/ls", &[path], ResponseKind::Json)
    }

    /// With `parents`, missing parents are created and an existing directory
    /// is not an error. That is enforced by the daemon, not here.
    pub fn build_mkdir(&self, path: &str, opts: &MkdirOptions) -> HttpRequest {
        self.client
            .request("/files/mkdir", vec![path.to_string()], opts.to_options(), ResponseKind::Raw)
    }

    pub fn build_mv(&self, source: &str, dest: &str) -> HttpRequest {
        self.simple("/files/mv", &[source, dest], ResponseKind::Raw)
    }

    pub fn build_read(&self, path: &str, opts: &ReadOptions) -> HttpRequest {
        self.client
            .request("/files/read", vec![path.to_string()], opts.to_options(), ResponseKind::Raw)
    }

    pub fn build_rm(&self, path: &str, opts: &RmOptions) -> HttpRequest {
        self.client
            .request("/files/rm", vec![path.to_string()], opts.to_options(), ResponseKind::Raw)
    }

    pub fn build_stat(&self, path: &str) -> HttpRequest {
        self.simple("/files/stat", &[path], ResponseKind::Json)
    }

    /// Write the content of `data` into the MFS file at `path`.
    ///
    /// `data` is streamed lazily in chunks of the client's chunk size once the
    /// host starts sending the body.
    pub fn build_write(&self, path: &str, data: impl Read + Send + 'static, opts: &WriteOptions) -> HttpRequest {
        let name = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("file");
        let body = MultipartBody::from_reader(name, data, self.client.chunk_size());
        self.client
            .request("/files/write", vec![path.to_string()], opts.to_options(), ResponseKind::Raw)
            .with_body(body)
    }

    /// Flush a path's data to disk, returning its content id.
    pub fn build_flush(&self, path: &str) -> HttpRequest {
        self.simple("/files/flush", &[path], ResponseKind::Json)
    }

    pub fn parse_cp(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_ls(&self, response: HttpResponse) -> Result<FilesLs, ApiError> {
        parse_json(response)
    }

    pub fn parse_mkdir(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_mv(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_read(&self, response: HttpResponse) -> Result<Vec<u8>, ApiError> {
        parse_raw(response)
    }

    pub fn parse_rm(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_stat(&self, response: HttpResponse) -> Result<FileStat, ApiError> {
        parse_json(response)
    }

    pub fn parse_write(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_flush(&self, response: HttpResponse) -> Result<Flushed, ApiError> {
        parse_json(response)
    }
}
