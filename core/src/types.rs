//! Response DTOs for the RPC API.
//!
//! Field names follow the daemon's `PascalCase` JSON. Lists the daemon may send
//! as `null` (an empty directory, an object without links) decode as empty.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry of an MFS directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct MfsEntry {
    pub name: String,
    /// 0 for files, 1 for directories.
    #[serde(rename = "Type", default)]
    pub entry_type: i32,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub hash: String,
}

/// Result of `files().ls`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FilesLs {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub entries: Vec<MfsEntry>,
}

/// Result of `files().stat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FileStat {
    pub hash: String,
    pub size: u64,
    pub cumulative_size: u64,
    pub blocks: u64,
    /// `"file"` or `"directory"`.
    #[serde(rename = "Type")]
    pub file_type: String,
}

/// Result of `files().flush`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Flushed {
    pub cid: String,
}

/// One node reported by `add`. `Size` is a decimal string on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AddedNode {
    pub name: String,
    pub hash: String,
    #[serde(default)]
    pub size: Option<String>,
}

/// A link of a UnixFS object as reported by `file/ls`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UnixfsLink {
    pub name: String,
    pub hash: String,
    pub size: u64,
    /// `"File"` or `"Directory"`.
    #[serde(rename = "Type")]
    pub link_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UnixfsObject {
    pub hash: String,
    pub size: u64,
    #[serde(rename = "Type")]
    pub object_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub links: Vec<UnixfsLink>,
}

/// Result of `file_ls`: requested argument to resolved hash, hash to object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FileLs {
    pub arguments: HashMap<String, String>,
    pub objects: HashMap<String, UnixfsObject>,
}

/// A link of a DAG object as reported by `ls`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectLink {
    pub name: String,
    pub hash: String,
    pub size: u64,
    /// 1 for directories, 2 for files.
    #[serde(rename = "Type")]
    pub link_type: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ListedObject {
    pub hash: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub links: Vec<ObjectLink>,
}

/// Result of `ls`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectLs {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub objects: Vec<ListedObject>,
}
