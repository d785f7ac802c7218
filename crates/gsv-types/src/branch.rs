//! Branch scopes for lock operations.
//!
//! A [`BranchRef`] holds the short name of a branch (`main`, not
//! `refs/heads/main`). Lock requests carry it as their ref scope; `None`
//! means the lock applies repository-wide.
//!
//! Valid branch names:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` or `@{`
//! - Must not start or end with `.` or `/`, nor end with `.lock`
//! - Components between slashes must be non-empty and not start with `.`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

const HEADS_PREFIX: &str = "refs/heads/";

/// Validated short branch name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchRef(String);

impl BranchRef {
    /// Build a branch scope from a short or fully-qualified branch name.
    ///
    /// ```
    /// use gsv_types::BranchRef;
    ///
    /// assert_eq!(BranchRef::new("refs/heads/main").unwrap().short_name(), "main");
    /// assert!(BranchRef::new("bad..name").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let short = match name.strip_prefix(HEADS_PREFIX) {
            Some(stripped) => stripped.to_string(),
            None => name,
        };
        validate_branch_name(&short)?;
        Ok(Self(short))
    }

    pub fn short_name(&self) -> &str {
        &self.0
    }

    /// Fully-qualified ref name (`refs/heads/<name>`).
    pub fn full_name(&self) -> String {
        format!("{HEADS_PREFIX}{}", self.0)
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BranchRef {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BranchRef> for String {
    fn from(branch: BranchRef) -> Self {
        branch.0
    }
}

/// Validate a short branch name, returning `Ok(())` if valid.
pub fn validate_branch_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidBranchName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("branch name must not be empty".into()));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid("must not contain '..'".into()));
    }
    if name.contains("@{") {
        return Err(invalid("must not contain '@{'".into()));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid("must not start or end with '.'".into()));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid("must not start or end with '/'".into()));
    }
    if name.ends_with(".lock") {
        return Err(invalid("must not end with '.lock'".into()));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid("path components must not be empty".into()));
        }
        if component.starts_with('.') {
            return Err(invalid(format!(
                "component must not start with '.': {component:?}"
            )));
        }
    }
    Ok(())
}
