//! In-memory mock of the daemon's `/api/v0` RPC surface.
//!
//! Covers the MFS endpoints (`/files/*`) and the content endpoints `add`,
//! `cat`, `ls` and `file/ls`. Every endpoint takes POST with positional
//! arguments as repeated `arg` query parameters, like the real daemon, and
//! errors come back as HTTP 500 with a `{"Message", "Code", "Type"}` body.

pub mod repo;

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use url::form_urlencoded;

use repo::{Node, Repo, RepoError};

pub type Db = Arc<RwLock<Repo>>;

type Pairs = Query<Vec<(String, String)>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Repo::default()));
    Router::new()
        .route("/api/v0/files/cp", post(files_cp))
        .route("/api/v0/files/ls", post(files_ls))
        .route("/api/v0/files/mkdir", post(files_mkdir))
        .route("/api/v0/files/mv", post(files_mv))
        .route("/api/v0/files/read", post(files_read))
        .route("/api/v0/files/rm", post(files_rm))
        .route("/api/v0/files/stat", post(files_stat))
        .route("/api/v0/files/write", post(files_write))
        .route("/api/v0/files/flush", post(files_flush))
        .route("/api/v0/add", post(add))
        .route("/api/v0/cat", post(cat))
        .route("/api/v0/ls", post(ls))
        .route("/api/v0/file/ls", post(file_ls))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// An error response in the daemon's envelope.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    message: String,
}

impl Failure {
    fn bad_request(message: impl Display) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<RepoError> for Failure {
    fn from(e: RepoError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.0,
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        log::debug!("request failed: {}", self.message);
        let body = json!({ "Message": self.message, "Code": 0, "Type": "error" });
        (self.status, Json(body)).into_response()
    }
}

/// Positional `arg` values and named options of one request.
struct Params {
    args: Vec<String>,
    opts: HashMap<String, String>,
}

impl Params {
    fn new(pairs: Vec<(String, String)>) -> Self {
        let mut args = Vec::new();
        let mut opts = HashMap::new();
        for (key, value) in pairs {
            if key == "arg" {
                args.push(value);
            } else {
                opts.insert(key, value);
            }
        }
        Self { args, opts }
    }

    fn arg(&self, index: usize, name: &str) -> Result<&str, Failure> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| Failure::bad_request(format!("argument \"{name}\" is required")))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, Failure> {
        match self.opts.get(key).map(String::as_str) {
            None => Ok(default),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(Failure::bad_request(format!("invalid boolean for {key}: {other:?}"))),
        }
    }

    fn number<T: FromStr>(&self, key: &str) -> Result<Option<T>, Failure> {
        self.opts
            .get(key)
            .map(|v| v.parse().map_err(|_| Failure::bad_request(format!("invalid number for {key}: {v:?}"))))
            .transpose()
    }
}

fn decode_filename(raw: &str) -> String {
    form_urlencoded::parse(format!("n={raw}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Multipart parts as (path, content); directories have no content.
async fn read_parts(mut multipart: Multipart) -> Result<Vec<(String, Option<Vec<u8>>)>, Failure> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(Failure::bad_request)? {
        let name = decode_filename(field.file_name().unwrap_or_default());
        let is_dir = field.content_type() == Some("application/x-directory");
        let data = field.bytes().await.map_err(Failure::bad_request)?;
        parts.push((name, if is_dir { None } else { Some(data.to_vec()) }));
    }
    Ok(parts)
}

fn mfs_type(node: &Node) -> i32 {
    if node.is_dir() {
        1
    } else {
        0
    }
}

async fn files_cp(State(db): State<Db>, Query(q): Pairs) -> Result<StatusCode, Failure> {
    let p = Params::new(q);
    db.write().await.cp(p.arg(0, "source")?, p.arg(1, "dest")?)?;
    Ok(StatusCode::OK)
}

async fn files_ls(State(db): State<Db>, Query(q): Pairs) -> Result<Json<Value>, Failure> {
    let p = Params::new(q);
    let path = p.args.first().map(String::as_str).unwrap_or("/");
    let repo = db.read().await;
    let entries: Vec<Value> = match repo.get(path)? {
        Node::Dir(children) => children
            .iter()
            .map(|(name, child)| {
                json!({ "Name": name, "Type": mfs_type(child), "Size": child.cumulative_size(), "Hash": child.cid() })
            })
            .collect(),
        file => {
            let name = path.rsplit('/').next().unwrap_or_default();
            vec![json!({ "Name": name, "Type": 0, "Size": file.cumulative_size(), "Hash": file.cid() })]
        }
    };
    let entries = if entries.is_empty() { Value::Null } else { Value::from(entries) };
    Ok(Json(json!({ "Entries": entries })))
}

async fn files_mkdir(State(db): State<Db>, Query(q): Pairs) -> Result<StatusCode, Failure> {
    let p = Params::new(q);
    db.write().await.mkdir(p.arg(0, "path")?, p.flag("parents", false)?)?;
    Ok(StatusCode::OK)
}

async fn files_mv(State(db): State<Db>, Query(q): Pairs) -> Result<StatusCode, Failure> {
    let p = Params::new(q);
    db.write().await.mv(p.arg(0, "source")?, p.arg(1, "dest")?)?;
    Ok(StatusCode::OK)
}

async fn files_read(State(db): State<Db>, Query(q): Pairs) -> Result<Vec<u8>, Failure> {
    let p = Params::new(q);
    let offset = p.number("offset")?.unwrap_or(0);
    let data = db.read().await.read(p.arg(0, "path")?, offset, p.number("count")?)?;
    Ok(data)
}

async fn files_rm(State(db): State<Db>, Query(q): Pairs) -> Result<StatusCode, Failure> {
    let p = Params::new(q);
    db.write().await.rm(p.arg(0, "path")?, p.flag("recursive", false)?)?;
    Ok(StatusCode::OK)
}

async fn files_stat(State(db): State<Db>, Query(q): Pairs) -> Result<Json<Value>, Failure> {
    let p = Params::new(q);
    let repo = db.read().await;
    let node = repo.get(p.arg(0, "path")?)?;
    let body = match node {
        Node::File(data) => json!({
            "Hash": node.cid(),
            "Size": data.len(),
            "CumulativeSize": data.len(),
            "Blocks": usize::from(!data.is_empty()),
            "Type": "file",
        }),
        Node::Dir(children) => json!({
            "Hash": node.cid(),
            "Size": 0,
            "CumulativeSize": node.cumulative_size(),
            "Blocks": children.len(),
            "Type": "directory",
        }),
    };
    Ok(Json(body))
}

async fn files_write(State(db): State<Db>, Query(q): Pairs, multipart: Multipart) -> Result<StatusCode, Failure> {
    let p = Params::new(q);
    let path = p.arg(0, "path")?;
    let parts = read_parts(multipart).await?;
    let Some((_, Some(data))) = parts.into_iter().next() else {
        return Err(Failure::bad_request("file argument \"data\" is required"));
    };
    db.write().await.write(
        path,
        &data,
        p.number("offset")?.unwrap_or(0),
        p.flag("create", false)?,
        p.flag("truncate", false)?,
        p.number("count")?,
    )?;
    Ok(StatusCode::OK)
}

async fn files_flush(State(db): State<Db>, Query(q): Pairs) -> Result<Json<Value>, Failure> {
    let p = Params::new(q);
    let path = p.args.first().map(String::as_str).unwrap_or("/");
    let cid = db.write().await.flush(path)?;
    Ok(Json(json!({ "Cid": cid })))
}

async fn add(State(db): State<Db>, Query(q): Pairs, multipart: Multipart) -> Result<Response, Failure> {
    let p = Params::new(q);
    let wrap = p.flag("wrap-with-directory", false)?;
    let only_hash = p.flag("only-hash", false)?;
    let parts = read_parts(multipart).await?;
    if parts.is_empty() {
        return Err(Failure::bad_request("file argument \"path\" is required"));
    }
    let added = db.write().await.add(parts, wrap, only_hash)?;
    let body: String = added
        .iter()
        .map(|a| format!("{}\n", json!({ "Name": a.name, "Hash": a.hash, "Size": a.size.to_string() })))
        .collect();
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn cat(State(db): State<Db>, Query(q): Pairs) -> Result<Vec<u8>, Failure> {
    let p = Params::new(q);
    let repo = db.read().await;
    let offset = p.number("offset")?.unwrap_or(0);
    let length = p.number::<i64>("length")?.filter(|l| *l >= 0).map(|l| l as u64);
    match repo.resolve(p.arg(0, "ipfs-path")?)? {
        Node::File(data) => Ok(repo::slice(data, offset, length)),
        Node::Dir(_) => Err(RepoError("this dag node is a directory".to_string()).into()),
    }
}

fn links(node: &Node) -> impl Iterator<Item = (&String, &Node)> {
    let children = match node {
        Node::Dir(children) => Some(children.iter()),
        Node::File(_) => None,
    };
    children.into_iter().flatten()
}

async fn ls(State(db): State<Db>, Query(q): Pairs) -> Result<Json<Value>, Failure> {
    let p = Params::new(q);
    p.arg(0, "ipfs-path")?;
    let repo = db.read().await;
    let mut objects = Vec::new();
    for reference in &p.args {
        let node = repo.resolve(reference)?;
        let links: Vec<Value> = links(node)
            .map(|(name, child)| {
                json!({
                    "Name": name,
                    "Hash": child.cid(),
                    "Size": child.cumulative_size(),
                    "Type": if child.is_dir() { 1 } else { 2 },
                })
            })
            .collect();
        objects.push(json!({ "Hash": node.cid(), "Links": links }));
    }
    Ok(Json(json!({ "Objects": objects })))
}

fn unixfs_type(node: &Node) -> &'static str {
    if node.is_dir() {
        "Directory"
    } else {
        "File"
    }
}

async fn file_ls(State(db): State<Db>, Query(q): Pairs) -> Result<Json<Value>, Failure> {
    let p = Params::new(q);
    p.arg(0, "ipfs-path")?;
    let repo = db.read().await;
    let mut arguments = serde_json::Map::new();
    let mut objects = serde_json::Map::new();
    for reference in &p.args {
        let node = repo.resolve(reference)?;
        let cid = node.cid();
        let links: Vec<Value> = links(node)
            .map(|(name, child)| {
                json!({
                    "Name": name,
                    "Hash": child.cid(),
                    "Size": child.cumulative_size(),
                    "Type": unixfs_type(child),
                })
            })
            .collect();
        let size = if node.is_dir() { 0 } else { node.cumulative_size() };
        arguments.insert(reference.clone(), Value::from(cid.clone()));
        objects.insert(
            cid.clone(),
            json!({ "Hash": cid, "Size": size, "Type": unixfs_type(node), "Links": links }),
        );
    }
    Ok(Json(json!({ "Arguments": arguments, "Objects": objects })))
}
