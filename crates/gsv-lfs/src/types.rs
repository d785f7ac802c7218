//! Wire types of the Git LFS batch and locking APIs.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use gsv_types::{BranchRef, LockDesc};
use serde::{Deserialize, Serialize};

/// Batch operation requested from the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upload,
    Download,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upload => "upload",
            Self::Download => "download",
        })
    }
}

/// Object named by hash and size.
///
/// Download requests may not know the size yet; they send `0`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub oid: String,
    pub size: u64,
}

impl Meta {
    pub fn new(oid: impl Into<String>, size: u64) -> Self {
        Self {
            oid: oid.into(),
            size,
        }
    }
}

/// Ref scope sent with batch and lock requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub name: String,
}

impl Ref {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl From<&BranchRef> for Ref {
    fn from(branch: &BranchRef) -> Self {
        Self::new(branch.short_name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReq {
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transfers: Vec<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
    pub objects: Vec<Meta>,
}

impl BatchReq {
    pub fn new(operation: Operation, objects: Vec<Meta>) -> Self {
        Self {
            operation,
            transfers: vec!["basic".to_string()],
            reference: None,
            objects,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<String>,
    #[serde(default)]
    pub objects: Vec<BatchItem>,
}

/// Per-object part of a batch response: transfer links or an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub oid: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, alias = "_links", skip_serializing_if = "Links::is_empty")]
    pub actions: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

impl BatchItem {
    pub fn meta(&self) -> Meta {
        Meta::new(self.oid.clone(), self.size)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub code: i32,
    pub message: String,
}

/// A short-lived transfer endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            header: BTreeMap::new(),
            expires_at: None,
        }
    }
}

/// Named transfer links (`download`, `upload`, `verify`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(BTreeMap<String, Link>);

impl Links {
    pub const DOWNLOAD: &'static str = "download";
    pub const UPLOAD: &'static str = "upload";
    pub const VERIFY: &'static str = "verify";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, link: Link) -> Self {
        self.0.insert(name.to_string(), link);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Link> {
        self.0.get(name)
    }

    pub fn download(&self) -> Option<&Link> {
        self.get(Self::DOWNLOAD)
    }

    pub fn upload(&self) -> Option<&Link> {
        self.get(Self::UPLOAD)
    }

    pub fn verify(&self) -> Option<&Link> {
        self.get(Self::VERIFY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Remote object descriptor: metadata plus its transfer links.
///
/// Never cached beyond the request that produced it; links expire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRes {
    pub oid: String,
    pub size: u64,
    #[serde(default, alias = "_links", rename = "actions")]
    pub links: Links,
}

impl ObjectRes {
    pub fn meta(&self) -> Meta {
        Meta::new(self.oid.clone(), self.size)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub name: String,
}

/// A lock as reported by the LFS locking API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<LockOwner>,
    pub locked_at: DateTime<Utc>,
}

impl Lock {
    /// Translate into the local descriptor, tagged with the scope it was
    /// requested under.
    pub fn into_lock_desc(self, branch: Option<&BranchRef>) -> LockDesc {
        LockDesc {
            path: self.path,
            branch: branch.map(|b| b.short_name().to_string()),
            token: self.id,
            owner: self.owner.map(|o| o.name),
            comment: None,
            created: self.locked_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLockReq {
    pub path: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRes {
    pub lock: Lock,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConflictRes {
    pub lock: Lock,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLockReq {
    pub force: bool,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocksRes {
    #[serde(default)]
    pub locks: Vec<Lock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyLocksReq {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyLocksRes {
    #[serde(default)]
    pub ours: Vec<Lock>,
    #[serde(default)]
    pub theirs: Vec<Lock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}
