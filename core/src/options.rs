//! Option maps and the per-operation option records.
//!
//! # Design
//! Every operation gets a fresh `Options` value built from its option record.
//! Two policies exist and are applied per endpoint, never generalized:
//! - always-present options (`parents`, `recursive`, write's `offset` /
//!   `create` / `truncate`, read's `offset`, add's booleans) are emitted
//!   whatever their value;
//! - optional options (`count`, `chunker`, cat's `offset` / `length`) are only
//!   emitted when they deviate from the endpoint's implicit default.
//!
//! Each record carries an `extra` map for options the typed fields don't
//! cover. It is merged last, so an `extra` key overrides a computed one.

use std::collections::BTreeMap;
use std::fmt;

use crate::pattern::Pattern;

/// A primitive option value as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Str(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(true) => f.write_str("true"),
            OptionValue::Bool(false) => f.write_str("false"),
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Uint(v) => write!(f, "{v}"),
            OptionValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<u64> for OptionValue {
    fn from(v: u64) -> Self {
        OptionValue::Uint(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

/// Option name to value mapping, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<OptionValue>) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert_some<V: Into<OptionValue>>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every entry of `other` into `self`, replacing existing keys.
    pub fn merge(&mut self, other: &Options) -> &mut Self {
        for (k, v) in other.iter() {
            self.0.insert(k.to_string(), v.clone());
        }
        self
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Options(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Options for `files().mkdir`.
#[derive(Debug, Clone, Default)]
pub struct MkdirOptions {
    /// Create missing parents and accept an existing directory.
    pub parents: bool,
    pub extra: Options,
}

impl MkdirOptions {
    pub fn to_options(&self) -> Options {
        let mut opts = Options::new();
        opts.insert("parents", self.parents);
        opts.merge(&self.extra);
        opts
    }
}

/// Options for `files().read`.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub offset: u64,
    /// Maximum number of bytes to read. `None` reads to the end.
    pub count: Option<u64>,
    pub extra: Options,
}

impl ReadOptions {
    pub fn to_options(&self) -> Options {
        let mut opts = Options::new();
        opts.insert("offset", self.offset);
        opts.insert_some("count", self.count);
        opts.merge(&self.extra);
        opts
    }
}

/// Options for `files().rm`.
#[derive(Debug, Clone, Default)]
pub struct RmOptions {
    pub recursive: bool,
    pub extra: Options,
}

impl RmOptions {
    pub fn to_options(&self) -> Options {
        let mut opts = Options::new();
        opts.insert("recursive", self.recursive);
        opts.merge(&self.extra);
        opts
    }
}

/// Options for `files().write`.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub offset: u64,
    /// Create the file if it does not exist.
    pub create: bool,
    /// Truncate the file to size zero before writing.
    pub truncate: bool,
    /// Maximum number of bytes to take from the source stream.
    pub count: Option<u64>,
    pub extra: Options,
}

impl WriteOptions {
    pub fn to_options(&self) -> Options {
        let mut opts = Options::new();
        opts.insert("offset", self.offset);
        opts.insert("create", self.create);
        opts.insert("truncate", self.truncate);
        opts.insert_some("count", self.count);
        opts.merge(&self.extra);
        opts
    }
}

/// Options for `add`.
#[derive(Debug, Clone)]
pub struct AddOptions {
    /// Descend into directories. Adding a directory without it is an error.
    pub recursive: bool,
    /// Paths (relative to the added root) are kept if any pattern matches.
    pub pattern: Vec<Pattern>,
    pub trickle: bool,
    pub only_hash: bool,
    pub wrap_with_directory: bool,
    pub pin: bool,
    pub nocopy: bool,
    pub chunker: Option<String>,
    pub extra: Options,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            pattern: vec![Pattern::glob("**")],
            trickle: false,
            only_hash: false,
            wrap_with_directory: false,
            pin: true,
            nocopy: false,
            chunker: None,
            extra: Options::new(),
        }
    }
}

impl AddOptions {
    pub fn to_options(&self) -> Options {
        let mut opts = Options::new();
        opts.insert("trickle", self.trickle);
        opts.insert("only-hash", self.only_hash);
        opts.insert("wrap-with-directory", self.wrap_with_directory);
        opts.insert("pin", self.pin);
        opts.insert("nocopy", self.nocopy);
        opts.insert_some("chunker", self.chunker.as_deref());
        opts.merge(&self.extra);
        opts
    }
}

/// Sentinel for `CatOptions::length` meaning "read to the end".
pub const UNBOUNDED_LENGTH: i64 = -1;

/// Options for `cat`.
#[derive(Debug, Clone)]
pub struct CatOptions {
    pub offset: u64,
    /// Maximum number of bytes to read, `UNBOUNDED_LENGTH` for all of them.
    pub length: i64,
    pub extra: Options,
}

impl Default for CatOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            length: UNBOUNDED_LENGTH,
            extra: Options::new(),
        }
    }
}

impl CatOptions {
    pub fn to_options(&self) -> Options {
        let mut opts = Options::new();
        if self.offset != 0 {
            opts.insert("offset", self.offset);
        }
        if self.length != UNBOUNDED_LENGTH {
            opts.insert("length", self.length);
        }
        opts.merge(&self.extra);
        opts
    }
}
