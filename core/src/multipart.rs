//! Lazily streamed `multipart/form-data` bodies.
//!
//! # Design
//! A body is a queue of parts, each a directory marker, a local file or a
//! caller-supplied reader. Nothing is read up front: a file is opened when its
//! part is reached and its content is yielded in chunks of at most
//! `chunk_size` bytes. Part headers, part terminators and the closing
//! boundary are yielded as separate small chunks.
//!
//! For trees, the walk itself (names and file types only) happens when the
//! body is built so pattern and validation errors surface before the request
//! reaches the transport.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use url::form_urlencoded;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::ApiError;
use crate::pattern::PatternSet;

const FILE_CONTENT_TYPE: &str = "application/octet-stream";
const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

enum PartSource {
    Directory,
    File(PathBuf),
    Reader(Box<dyn Read + Send>),
}

struct Part {
    /// Slash separated path of the entry as the daemon should see it.
    name: String,
    source: PartSource,
}

/// A multipart body produced on demand.
///
/// Iterate it for `chunk_size`-bounded chunks, or use it as an `io::Read`.
pub struct MultipartBody {
    boundary: String,
    chunk_size: usize,
    parts: VecDeque<Part>,
    current: Option<Box<dyn Read + Send>>,
    finished: bool,
    pending: Vec<u8>,
    pos: usize,
}

impl MultipartBody {
    fn from_parts(parts: Vec<Part>, chunk_size: usize) -> Self {
        Self {
            boundary: Uuid::new_v4().simple().to_string(),
            chunk_size: chunk_size.max(1),
            parts: parts.into(),
            current: None,
            finished: false,
            pending: Vec::new(),
            pos: 0,
        }
    }

    /// A body holding a single file part whose content comes from `reader`.
    pub(crate) fn from_reader(name: &str, reader: impl Read + Send + 'static, chunk_size: usize) -> Self {
        let part = Part {
            name: name.to_string(),
            source: PartSource::Reader(Box::new(reader)),
        };
        Self::from_parts(vec![part], chunk_size)
    }

    /// A body for a local file or directory tree.
    ///
    /// Directories require `recursive`. Files are kept when their path
    /// relative to `root` matches `patterns`. A directory part is emitted for
    /// the root, for every directory the patterns match and for every
    /// directory holding a kept file.
    pub(crate) fn from_path(
        root: &Path,
        recursive: bool,
        patterns: &PatternSet,
        chunk_size: usize,
    ) -> Result<Self, ApiError> {
        Self::from_paths(&[root], recursive, patterns, chunk_size)
    }

    /// A body holding several files or trees side by side, each filtered as
    /// in `from_path`. Files the patterns exclude are skipped; it is an error
    /// only when nothing at all is left.
    pub(crate) fn from_paths<P: AsRef<Path>>(
        roots: &[P],
        recursive: bool,
        patterns: &PatternSet,
        chunk_size: usize,
    ) -> Result<Self, ApiError> {
        let mut parts = Vec::new();
        for root in roots {
            parts.extend(collect_parts(root.as_ref(), recursive, patterns)?);
        }
        if parts.is_empty() {
            let first = roots.first().map(|r| r.as_ref().to_path_buf()).unwrap_or_default();
            return Err(ApiError::NoMatchingFiles(first));
        }
        log::debug!("streaming {} multipart part(s) from {} path(s)", parts.len(), roots.len());
        Ok(Self::from_parts(parts, chunk_size))
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Names of the parts not yet streamed, in emission order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    fn part_header(&self, part: &Part) -> Vec<u8> {
        let content_type = match part.source {
            PartSource::Directory => DIRECTORY_CONTENT_TYPE,
            PartSource::File(_) | PartSource::Reader(_) => FILE_CONTENT_TYPE,
        };
        let filename: String = form_urlencoded::byte_serialize(part.name.as_bytes()).collect();
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
            self.boundary
        )
        .into_bytes()
    }

    fn fail(&mut self, e: io::Error) -> Option<io::Result<Vec<u8>>> {
        self.current = None;
        self.parts.clear();
        self.finished = true;
        Some(Err(e))
    }
}

impl Iterator for MultipartBody {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(reader) = self.current.as_mut() {
            let mut buf = vec![0; self.chunk_size];
            return match read_retrying(&mut **reader, &mut buf) {
                Ok(0) => {
                    self.current = None;
                    Some(Ok(b"\r\n".to_vec()))
                }
                Ok(n) => {
                    buf.truncate(n);
                    Some(Ok(buf))
                }
                Err(e) => self.fail(e),
            };
        }
        if self.finished {
            return None;
        }
        let Some(part) = self.parts.pop_front() else {
            self.finished = true;
            return Some(Ok(format!("--{}--\r\n", self.boundary).into_bytes()));
        };

        log::trace!("multipart part {}", part.name);
        let mut head = self.part_header(&part);
        match part.source {
            PartSource::Directory => head.extend_from_slice(b"\r\n"),
            PartSource::File(path) => match File::open(&path) {
                Ok(file) => self.current = Some(Box::new(file)),
                Err(e) => return self.fail(e),
            },
            PartSource::Reader(reader) => self.current = Some(reader),
        }
        Some(Ok(head))
    }
}

impl Read for MultipartBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.pending.len() {
            match self.next() {
                Some(chunk) => {
                    self.pending = chunk?;
                    self.pos = 0;
                }
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .field("chunk_size", &self.chunk_size)
            .field("parts", &self.part_names().collect::<Vec<_>>())
            .field("finished", &self.finished)
            .finish()
    }
}

fn read_retrying(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Parts for one added path. A single file the patterns exclude yields no
/// parts.
fn collect_parts(root: &Path, recursive: bool, patterns: &PatternSet) -> Result<Vec<Part>, ApiError> {
    let meta = fs::metadata(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ApiError::PathNotFound(root.to_path_buf()),
        _ => ApiError::Io(e),
    })?;
    let root_name = entry_name(root)?;

    if !meta.is_dir() {
        if !patterns.matches(&root_name) {
            log::debug!("{} excluded by patterns", root.display());
            return Ok(Vec::new());
        }
        return Ok(vec![Part {
            name: root_name,
            source: PartSource::File(root.to_path_buf()),
        }]);
    }
    if !recursive {
        return Err(ApiError::DirectoryNotRecursive(root.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_str().ok_or_else(|| ApiError::NonUtf8Path(entry.path().to_path_buf())))
            .collect::<Result<Vec<_>, _>>()?
            .join("/");
        let is_dir = entry.file_type().is_dir();
        let matched = patterns.matches(&relative);
        if is_dir || matched {
            entries.push((relative, entry.into_path(), is_dir, matched));
        }
    }

    let mut needed = HashSet::new();
    for (relative, _, is_dir, _) in &entries {
        if !is_dir {
            needed.extend(relative.match_indices('/').map(|(i, _)| relative[..i].to_string()));
        }
    }

    let mut parts = vec![Part {
        name: root_name.clone(),
        source: PartSource::Directory,
    }];
    for (relative, path, is_dir, matched) in entries {
        if is_dir && !matched && !needed.contains(&relative) {
            continue;
        }
        parts.push(Part {
            name: format!("{root_name}/{relative}"),
            source: if is_dir { PartSource::Directory } else { PartSource::File(path) },
        });
    }
    Ok(parts)
}

/// Final path component, resolving `.` and `..` through the filesystem.
fn entry_name(path: &Path) -> Result<String, ApiError> {
    let resolved;
    let name = match path.file_name() {
        Some(name) => name,
        None => {
            resolved = fs::canonicalize(path)?;
            match resolved.file_name() {
                Some(name) => name,
                None => return Ok(String::new()),
            }
        }
    };
    name.to_str()
        .map(str::to_string)
        .ok_or_else(|| ApiError::NonUtf8Path(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::pattern::Pattern;

    fn patterns(p: &[&str]) -> PatternSet {
        PatternSet::new(&p.iter().map(|s| Pattern::glob(s)).collect::<Vec<_>>()).unwrap()
    }

    fn read_all(mut body: MultipartBody) -> String {
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("b.txt"), "bee").unwrap();
        fs::write(root.join("a.md"), "# a").unwrap();
        fs::write(root.join("sub/c.txt"), "sea").unwrap();
        fs::write(root.join("sub/deeper/d.bin"), [0u8, 1, 2]).unwrap();
        dir
    }

    #[test]
    fn reader_body_is_framed() {
        let body = MultipartBody::from_reader("file", Cursor::new(b"hello".to_vec()), 4096);
        let boundary = body.boundary().to_string();
        let expected = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"file\"\r\n\
             Content-Type: application/octet-stream\r\n\r\nhello\r\n--{boundary}--\r\n"
        );
        assert_eq!(read_all(body), expected);
    }

    #[test]
    fn chunks_are_bounded_by_chunk_size() {
        let body = MultipartBody::from_reader("f", Cursor::new(vec![7u8; 10]), 4);
        let chunks: Vec<Vec<u8>> = body.map(|c| c.unwrap()).collect();
        // header, 4, 4, 2, terminator, closing boundary
        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[1..4].iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 2]);
        assert_eq!(chunks[4], b"\r\n");
    }

    #[test]
    fn content_type_carries_boundary() {
        let body = MultipartBody::from_reader("f", Cursor::new(Vec::new()), 16);
        assert_eq!(
            body.content_type(),
            format!("multipart/form-data; boundary={}", body.boundary())
        );
    }

    #[test]
    fn tree_is_filtered_and_sorted() {
        let dir = tree();
        let body = MultipartBody::from_path(&dir.path().join("docs"), true, &patterns(&["*.txt"]), 64).unwrap();
        assert_eq!(
            body.part_names().collect::<Vec<_>>(),
            vec!["docs", "docs/b.txt", "docs/sub", "docs/sub/c.txt"]
        );
    }

    #[test]
    fn tree_with_default_pattern_keeps_everything() {
        let dir = tree();
        let body = MultipartBody::from_path(&dir.path().join("docs"), true, &patterns(&["**"]), 64).unwrap();
        assert_eq!(
            body.part_names().collect::<Vec<_>>(),
            vec![
                "docs",
                "docs/a.md",
                "docs/b.txt",
                "docs/empty",
                "docs/sub",
                "docs/sub/c.txt",
                "docs/sub/deeper",
                "docs/sub/deeper/d.bin",
            ]
        );
    }

    #[test]
    fn empty_directory_matching_a_pattern_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        fs::create_dir_all(root.join("uploads")).unwrap();
        fs::create_dir_all(root.join("cache")).unwrap();
        fs::write(root.join("index.html"), "<html>").unwrap();

        let body = MultipartBody::from_path(&root, true, &patterns(&["index.html", "uploads"]), 64).unwrap();
        assert_eq!(
            body.part_names().collect::<Vec<_>>(),
            vec!["site", "site/index.html", "site/uploads"]
        );
    }

    #[test]
    fn tree_body_marks_directories_and_encodes_names() {
        let dir = tree();
        let text = read_all(
            MultipartBody::from_path(&dir.path().join("docs"), true, &patterns(&["sub/*.txt"]), 64).unwrap(),
        );
        assert!(text.contains("filename=\"docs%2Fsub\"\r\nContent-Type: application/x-directory\r\n\r\n\r\n"));
        assert!(text.contains("filename=\"docs%2Fsub%2Fc.txt\"\r\nContent-Type: application/octet-stream\r\n\r\nsea\r\n"));
        assert!(!text.contains("b.txt"));
    }

    #[test]
    fn directory_requires_recursive() {
        let dir = tree();
        let err = MultipartBody::from_path(&dir.path().join("docs"), false, &patterns(&["**"]), 64).unwrap_err();
        assert!(matches!(err, ApiError::DirectoryNotRecursive(_)));
    }

    #[test]
    fn single_file_is_filtered_like_a_tree() {
        let dir = tree();
        let file = dir.path().join("docs/a.md");
        let body = MultipartBody::from_path(&file, false, &patterns(&["*.md"]), 64).unwrap();
        assert_eq!(body.part_names().collect::<Vec<_>>(), vec!["a.md"]);

        let err = MultipartBody::from_path(&file, false, &patterns(&["*.txt"]), 64).unwrap_err();
        assert!(matches!(err, ApiError::NoMatchingFiles(_)));
    }

    #[test]
    fn several_files_share_one_body() {
        let dir = tree();
        let docs = dir.path().join("docs");
        let files = [docs.join("b.txt"), docs.join("a.md"), docs.join("sub/c.txt")];
        let body = MultipartBody::from_paths(&files, false, &patterns(&["*.txt"]), 64).unwrap();
        assert_eq!(body.part_names().collect::<Vec<_>>(), vec!["b.txt", "c.txt"]);

        let text = read_all(body);
        assert!(text.contains("filename=\"b.txt\"\r\nContent-Type: application/octet-stream\r\n\r\nbee\r\n"));
        assert!(text.contains("filename=\"c.txt\"\r\nContent-Type: application/octet-stream\r\n\r\nsea\r\n"));
    }

    #[test]
    fn several_files_all_excluded_is_an_error() {
        let dir = tree();
        let docs = dir.path().join("docs");
        let files = [docs.join("a.md"), docs.join("sub/deeper/d.bin")];
        let err = MultipartBody::from_paths(&files, false, &patterns(&["*.txt"]), 64).unwrap_err();
        assert!(matches!(err, ApiError::NoMatchingFiles(ref p) if *p == files[0]));

        let none: [&Path; 0] = [];
        assert!(MultipartBody::from_paths(&none, false, &patterns(&["**"]), 64).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tree();
        let root = dir.path().join("docs");
        let bad = root.join(OsStr::from_bytes(b"caf\xe9.txt"));
        if fs::write(&bad, "x").is_err() {
            // Filesystems that insist on UTF-8 names cannot hold the file.
            return;
        }
        let err = MultipartBody::from_path(&root, true, &patterns(&["**"]), 64).unwrap_err();
        assert!(matches!(err, ApiError::NonUtf8Path(ref p) if *p == bad));

        let err = MultipartBody::from_path(&bad, false, &patterns(&["**"]), 64).unwrap_err();
        assert!(matches!(err, ApiError::NonUtf8Path(_)));
    }

    #[test]
    fn missing_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = MultipartBody::from_path(&dir.path().join("nope"), true, &patterns(&["**"]), 64).unwrap_err();
        assert!(matches!(err, ApiError::PathNotFound(_)));
    }

    #[test]
    fn file_removed_before_streaming_surfaces_io_error() {
        let dir = tree();
        let file = dir.path().join("docs/b.txt");
        let mut body = MultipartBody::from_path(&file, false, &patterns(&["**"]), 64).unwrap();
        fs::remove_file(&file).unwrap();
        assert!(body.next().unwrap().is_err());
        assert!(body.next().is_none());
    }
}
