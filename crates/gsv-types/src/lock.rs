use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local descriptor of one path lock.
///
/// A lock is addressable both by `path` and by `token`; callers may hold
/// either one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDesc {
    pub path: String,
    /// Branch the lock is scoped to, `None` for repository-wide locks.
    pub branch: Option<String>,
    pub token: String,
    pub owner: Option<String>,
    pub comment: Option<String>,
    pub created: DateTime<Utc>,
}

/// One path requested in a batch `lock` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTarget {
    pub path: String,
}

impl LockTarget {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// One path requested in a batch `unlock` call.
///
/// Without a token the lock currently held on `path` is looked up first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockTarget {
    pub path: String,
    pub token: Option<String>,
}

impl UnlockTarget {
    pub fn new(path: impl Into<String>, token: Option<String>) -> Self {
        Self {
            path: path.into(),
            token,
        }
    }

    pub fn by_path(path: impl Into<String>) -> Self {
        Self::new(path, None)
    }
}

/// Outcome of a lock verification: locks held by the caller versus by others.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyLocksResult {
    pub ours: Vec<LockDesc>,
    pub theirs: Vec<LockDesc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_target_constructors() {
        let t = UnlockTarget::by_path("/a.bin");
        assert_eq!(t.path, "/a.bin");
        assert!(t.token.is_none());

        let t = UnlockTarget::new("/a.bin", Some("t1".into()));
        assert_eq!(t.token.as_deref(), Some("t1"));
    }

    #[test]
    fn verify_result_defaults_empty() {
        let r = VerifyLocksResult::default();
        assert!(r.ours.is_empty());
        assert!(r.theirs.is_empty());
    }

    #[test]
    fn lock_desc_serde_roundtrip() {
        let lock = LockDesc {
            path: "/a.bin".into(),
            branch: Some("main".into()),
            token: "t1".into(),
            owner: Some("alice".into()),
            comment: None,
            created: Utc::now(),
        };
        let json = serde_json::to_string(&lock).unwrap();
        assert_eq!(serde_json::from_str::<LockDesc>(&json).unwrap(), lock);
    }
}
