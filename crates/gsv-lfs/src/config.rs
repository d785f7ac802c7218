use std::collections::BTreeMap;

use gsv_types::Principal;
use serde::{Deserialize, Serialize};

use crate::error::{LfsError, LfsResult};

/// Credentials presented to the LFS API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    Anonymous,
    Bearer(String),
    Basic { username: String, password: String },
}

impl AuthMethod {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Bearer(_) => "bearer-token",
            Self::Basic { .. } => "basic",
        }
    }
}

/// Remote LFS endpoint configuration.
///
/// ```toml
/// url = "https://git.example.com/repo.git/info/lfs"
/// timeout_secs = 60
///
/// [users.alice]
/// bearer = "secret-token"
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LfsConfig {
    /// Base URL of the LFS API (the `.../info/lfs` endpoint).
    pub url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Transfer bodies larger than this are spilled to a temporary file.
    pub spill_threshold: usize,
    /// Credentials used for the anonymous principal and for unknown users.
    pub anonymous: AuthMethod,
    /// Per-login credentials.
    pub users: BTreeMap<String, AuthMethod>,
}

impl Default for LfsConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/info/lfs".into(),
            timeout_secs: 60,
            user_agent: concat!("gsv-lfs/", env!("CARGO_PKG_VERSION")).into(),
            spill_threshold: 1024 * 1024,
            anonymous: AuthMethod::Anonymous,
            users: BTreeMap::new(),
        }
    }
}

impl LfsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> LfsResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| LfsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LfsResult<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(LfsError::Config(format!(
                "LFS url must be http(s): {:?}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(LfsError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Credentials the given principal talks to the LFS API with.
    pub fn credentials_for(&self, principal: &Principal) -> &AuthMethod {
        match principal {
            Principal::Anonymous => &self.anonymous,
            Principal::User { login, .. } => self.users.get(login).unwrap_or(&self.anonymous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LfsConfig::default();
        assert_eq!(c.timeout_secs, 60);
        assert_eq!(c.spill_threshold, 1024 * 1024);
        assert!(c.users.is_empty());
        assert!(c.user_agent.starts_with("gsv-lfs/"));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn parses_toml() {
        let c = LfsConfig::from_toml_str(
            r#"
            url = "https://git.example.com/repo.git/info/lfs"
            timeout_secs = 5

            [users.alice]
            bearer = "alice-token"

            [users.bob.basic]
            username = "bob"
            password = "hunter2"
            "#,
        )
        .unwrap();
        assert_eq!(c.url, "https://git.example.com/repo.git/info/lfs");
        assert_eq!(c.timeout_secs, 5);
        assert_eq!(
            c.credentials_for(&Principal::user("alice")),
            &AuthMethod::Bearer("alice-token".into())
        );
        assert_eq!(c.credentials_for(&Principal::user("bob")).display_name(), "basic");
    }

    #[test]
    fn unknown_users_fall_back_to_anonymous_credentials() {
        let c = LfsConfig::new("https://lfs.example.com");
        assert_eq!(
            c.credentials_for(&Principal::user("carol")),
            &AuthMethod::Anonymous
        );
        assert!(!c.credentials_for(&Principal::anonymous()).is_authenticated());
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(matches!(
            LfsConfig::from_toml_str(r#"url = "ftp://x""#),
            Err(LfsError::Config(_))
        ));
        assert!(LfsConfig::from_toml_str(r#"url = "https://x"
timeout_secs = 0"#)
        .is_err());
        assert!(LfsConfig::from_toml_str("url = 5").is_err());
    }
}
