//! In-memory stand-in for the daemon's storage: an MFS tree plus a content
//! store keyed by content id.
//!
//! Content ids are SHA-256 based and only stable within this mock; they are
//! not real multihashes.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(Vec<u8>),
    Dir(BTreeMap<String, Node>),
}

impl Node {
    pub fn empty_dir() -> Self {
        Node::Dir(BTreeMap::new())
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Dir(_))
    }

    pub fn cid(&self) -> String {
        let mut hasher = Sha256::new();
        match self {
            Node::File(data) => {
                hasher.update(b"file\0");
                hasher.update(data);
            }
            Node::Dir(children) => {
                hasher.update(b"dir\0");
                for (name, child) in children {
                    hasher.update(name.as_bytes());
                    hasher.update(b"\0");
                    hasher.update(child.cid().as_bytes());
                    hasher.update(b"\n");
                }
            }
        }
        format!("Qm{}", &hex::encode(hasher.finalize())[..44])
    }

    /// Total bytes of file content below this node.
    pub fn cumulative_size(&self) -> u64 {
        match self {
            Node::File(data) => data.len() as u64,
            Node::Dir(children) => children.values().map(Node::cumulative_size).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoError(pub String);

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

fn fail<T>(message: impl Into<String>) -> RepoResult<T> {
    Err(RepoError(message.into()))
}

fn not_found() -> RepoError {
    RepoError("file does not exist".to_string())
}

fn split_mfs(path: &str) -> RepoResult<Vec<&str>> {
    if !path.starts_with('/') {
        return fail("paths must start with a leading slash");
    }
    Ok(path.split('/').filter(|c| !c.is_empty()).collect())
}

fn dir_mut<'a>(node: &'a mut Node, components: &[&str]) -> RepoResult<&'a mut BTreeMap<String, Node>> {
    let mut current = node;
    for name in components {
        current = match current {
            Node::Dir(children) => children.get_mut(*name).ok_or_else(not_found)?,
            Node::File(_) => return fail("not a directory"),
        };
    }
    match current {
        Node::Dir(children) => Ok(children),
        Node::File(_) => fail("not a directory"),
    }
}

/// `data[offset..offset + count]`, clamped to the data.
pub fn slice(data: &[u8], offset: u64, count: Option<u64>) -> Vec<u8> {
    let start = (offset as usize).min(data.len());
    let end = match count {
        Some(count) => start.saturating_add(count as usize).min(data.len()),
        None => data.len(),
    };
    data[start..end].to_vec()
}

/// One line of the `/add` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedEntry {
    pub name: String,
    pub hash: String,
    pub size: u64,
}

fn report(path: String, node: &Node, out: &mut Vec<AddedEntry>) {
    if let Node::Dir(children) = node {
        for (name, child) in children {
            let child_path = if path.is_empty() { name.clone() } else { format!("{path}/{name}") };
            report(child_path, child, out);
        }
    }
    out.push(AddedEntry {
        name: path,
        hash: node.cid(),
        size: node.cumulative_size(),
    });
}

/// Assemble multipart entries (`None` content marks a directory) into trees.
pub fn build_tree(parts: Vec<(String, Option<Vec<u8>>)>) -> RepoResult<BTreeMap<String, Node>> {
    let mut roots = Node::empty_dir();
    for (path, content) in parts {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let Some((last, parents)) = components.split_last() else {
            return fail("multipart part without a file name");
        };
        let mut current = &mut roots;
        for name in parents {
            let Node::Dir(children) = current else {
                return fail("not a directory");
            };
            current = children.entry(name.to_string()).or_insert_with(Node::empty_dir);
        }
        let Node::Dir(children) = current else {
            return fail("not a directory");
        };
        match content {
            Some(data) => {
                children.insert(last.to_string(), Node::File(data));
            }
            None => {
                children.entry(last.to_string()).or_insert_with(Node::empty_dir);
            }
        }
    }
    match roots {
        Node::Dir(children) => Ok(children),
        Node::File(_) => fail("not a directory"),
    }
}

#[derive(Debug)]
pub struct Repo {
    root: Node,
    objects: HashMap<String, Node>,
}

impl Default for Repo {
    fn default() -> Self {
        Self {
            root: Node::empty_dir(),
            objects: HashMap::new(),
        }
    }
}

impl Repo {
    /// Put `node` and everything below it into the content store.
    pub fn store(&mut self, node: &Node) -> String {
        if let Node::Dir(children) = node {
            for child in children.values() {
                self.store(child);
            }
        }
        let cid = node.cid();
        self.objects.insert(cid.clone(), node.clone());
        cid
    }

    /// Resolve `<cid>[/sub/path]`, with or without a leading `/ipfs/`.
    pub fn resolve(&self, reference: &str) -> RepoResult<&Node> {
        let trimmed = reference.strip_prefix("/ipfs/").unwrap_or(reference);
        let mut components = trimmed.split('/').filter(|c| !c.is_empty());
        let cid = components
            .next()
            .ok_or_else(|| RepoError(format!("invalid path {reference:?}")))?;
        let mut node = self
            .objects
            .get(cid)
            .ok_or_else(|| RepoError(format!("block was not found locally: {cid}")))?;
        for name in components {
            node = match node {
                Node::Dir(children) => children
                    .get(name)
                    .ok_or_else(|| RepoError(format!("no link named {name:?}")))?,
                Node::File(_) => return fail("not a directory"),
            };
        }
        Ok(node)
    }

    pub fn get(&self, path: &str) -> RepoResult<&Node> {
        let mut node = &self.root;
        for name in split_mfs(path)? {
            node = match node {
                Node::Dir(children) => children.get(name).ok_or_else(not_found)?,
                Node::File(_) => return fail("not a directory"),
            };
        }
        Ok(node)
    }

    fn insert_new(&mut self, path: &str, node: Node) -> RepoResult<()> {
        let components = split_mfs(path)?;
        let Some((last, parents)) = components.split_last() else {
            return fail("cannot overwrite the root directory");
        };
        let children = dir_mut(&mut self.root, parents)?;
        match children.entry(last.to_string()) {
            Entry::Occupied(_) => fail("directory already has entry by that name"),
            Entry::Vacant(e) => {
                e.insert(node);
                Ok(())
            }
        }
    }

    pub fn mkdir(&mut self, path: &str, parents: bool) -> RepoResult<()> {
        let components = split_mfs(path)?;
        let Some((last, ancestors)) = components.split_last() else {
            return if parents { Ok(()) } else { fail("file already exists") };
        };
        let mut current = &mut self.root;
        for name in ancestors {
            let Node::Dir(children) = current else {
                return fail("not a directory");
            };
            current = match children.entry(name.to_string()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) if parents => e.insert(Node::empty_dir()),
                Entry::Vacant(_) => return Err(not_found()),
            };
        }
        let Node::Dir(children) = current else {
            return fail("not a directory");
        };
        match children.get(*last) {
            Some(Node::Dir(_)) if parents => Ok(()),
            Some(_) => fail("file already exists"),
            None => {
                children.insert(last.to_string(), Node::empty_dir());
                Ok(())
            }
        }
    }

    pub fn write(
        &mut self,
        path: &str,
        data: &[u8],
        offset: u64,
        create: bool,
        truncate: bool,
        count: Option<u64>,
    ) -> RepoResult<()> {
        let components = split_mfs(path)?;
        let Some((last, parents)) = components.split_last() else {
            return fail("cannot write to the root directory");
        };
        let children = dir_mut(&mut self.root, parents)?;
        let node = match children.entry(last.to_string()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) if create => e.insert(Node::File(Vec::new())),
            Entry::Vacant(_) => return Err(not_found()),
        };
        let Node::File(content) = node else {
            return fail(format!("{path} was not a file"));
        };
        let data = match count {
            Some(count) => &data[..data.len().min(count as usize)],
            None => data,
        };
        let len = if truncate { 0 } else { content.len() };
        let start = match usize::try_from(offset) {
            Ok(start) if start <= len => start,
            _ => return fail(format!("offset was past size of file ({offset} > {len})")),
        };
        let Some(end) = start.checked_add(data.len()) else {
            return fail("write too large");
        };
        if truncate {
            content.clear();
        }
        if content.len() < end {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(data);
        Ok(())
    }

    pub fn read(&self, path: &str, offset: u64, count: Option<u64>) -> RepoResult<Vec<u8>> {
        match self.get(path)? {
            Node::File(data) => Ok(slice(data, offset, count)),
            Node::Dir(_) => fail(format!("{path} was not a file")),
        }
    }

    /// Copy an MFS path or an `/ipfs/` reference to a new MFS path.
    pub fn cp(&mut self, source: &str, dest: &str) -> RepoResult<()> {
        let node = if source.starts_with("/ipfs/") {
            self.resolve(source)?.clone()
        } else {
            self.get(source)?.clone()
        };
        self.insert_new(dest, node)
    }

    /// Move `source` to `dest`, or into `dest` when it is a directory.
    pub fn mv(&mut self, source: &str, dest: &str) -> RepoResult<()> {
        let components = split_mfs(source)?;
        let Some((name, parents)) = components.split_last() else {
            return fail("cannot move the root directory");
        };
        let dest = match self.get(dest) {
            Ok(Node::Dir(_)) => format!("{}/{name}", dest.trim_end_matches('/')),
            _ => dest.to_string(),
        };
        let node = dir_mut(&mut self.root, parents)?.remove(*name).ok_or_else(not_found)?;
        if let Err(e) = self.insert_new(&dest, node.clone()) {
            dir_mut(&mut self.root, parents)?.insert(name.to_string(), node);
            return Err(e);
        }
        Ok(())
    }

    pub fn rm(&mut self, path: &str, recursive: bool) -> RepoResult<()> {
        let components = split_mfs(path)?;
        let Some((last, parents)) = components.split_last() else {
            return fail("cannot delete root");
        };
        let children = dir_mut(&mut self.root, parents)?;
        match children.get(*last) {
            None => Err(not_found()),
            Some(Node::Dir(_)) if !recursive => {
                fail(format!("{path} is a directory, use -r to remove directories"))
            }
            Some(_) => {
                children.remove(*last);
                Ok(())
            }
        }
    }

    /// Persist the node at `path` into the content store.
    pub fn flush(&mut self, path: &str) -> RepoResult<String> {
        let node = self.get(path)?.clone();
        Ok(self.store(&node))
    }

    /// Import multipart entries, reporting every node children first.
    pub fn add(
        &mut self,
        parts: Vec<(String, Option<Vec<u8>>)>,
        wrap: bool,
        only_hash: bool,
    ) -> RepoResult<Vec<AddedEntry>> {
        let roots = build_tree(parts)?;
        let mut added = Vec::new();
        let tops: Vec<(String, Node)> = if wrap {
            vec![(String::new(), Node::Dir(roots))]
        } else {
            roots.into_iter().collect()
        };
        for (name, node) in tops {
            report(name, &node, &mut added);
            if !only_hash {
                self.store(&node);
            }
        }
        Ok(added)
    }
}
