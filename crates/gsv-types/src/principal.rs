use std::fmt;

use serde::{Deserialize, Serialize};

/// The identity a request runs as.
///
/// This core never authenticates anybody: a `Principal` only selects which
/// credentials the remote large-object client talks with. The anonymous
/// variant is used for metadata lookups and object downloads.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    Anonymous,
    User { login: String },
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::Anonymous
    }

    pub fn user(login: impl Into<String>) -> Self {
        Self::User {
            login: login.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Login name; `$anonymous` for the anonymous principal.
    pub fn login(&self) -> &str {
        match self {
            Self::Anonymous => "$anonymous",
            Self::User { login, .. } => login,
        }
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::Anonymous
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.login())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_variants() {
        let a = Principal::anonymous();
        assert!(a.is_anonymous());
        assert_eq!(a.login(), "$anonymous");

        let u = Principal::user("alice");
        assert!(!u.is_anonymous());
        assert_eq!(u.login(), "alice");
        assert_eq!(format!("{u}"), "alice");
    }

    #[test]
    fn users_are_keyed_by_login() {
        assert_eq!(Principal::user("bob"), Principal::user("bob"));
        assert_ne!(Principal::user("bob"), Principal::user("alice"));
        assert_ne!(Principal::user("$anonymous"), Principal::anonymous());
    }

    #[test]
    fn default_is_anonymous() {
        assert!(Principal::default().is_anonymous());
    }
}
