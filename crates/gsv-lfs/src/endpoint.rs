//! Paths and media types of the Git LFS HTTP API.

/// API paths, relative to the configured LFS base URL.
pub mod endpoints {
    pub const BATCH: &str = "objects/batch";
    pub const OBJECTS: &str = "objects";
    pub const LOCKS: &str = "locks";
    pub const LOCKS_VERIFY: &str = "locks/verify";

    /// Path of the unlock call for one lock id.
    pub fn unlock(id: &str) -> String {
        format!("locks/{id}/unlock")
    }
}

/// Content type of every LFS API request and response.
pub const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";

/// Join an API path onto a base URL, tolerating a trailing slash.
pub fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths() {
        assert_eq!(endpoints::BATCH, "objects/batch");
        assert_eq!(endpoints::LOCKS_VERIFY, "locks/verify");
        assert_eq!(endpoints::unlock("42"), "locks/42/unlock");
    }

    #[test]
    fn join_handles_slashes() {
        assert_eq!(join("https://h/info/lfs", "locks"), "https://h/info/lfs/locks");
        assert_eq!(join("https://h/info/lfs/", "/locks"), "https://h/info/lfs/locks");
    }
}
