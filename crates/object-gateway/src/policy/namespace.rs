//! Per-user key namespace.

use super::ObjectKey;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Longest filename extension carried into a derived key.
const MAX_EXTENSION_LEN: usize = 10;

/// Authorization failure for a key outside the caller's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("Access to this object is not permitted")]
    Forbidden,
}

/// Builds and checks keys under `{root}/{subject}/`.
///
/// Shared by all requests; the only state is the last issued timestamp.
#[derive(Debug)]
pub struct KeyPolicy {
    root: String,
    last_timestamp_ms: AtomicI64,
}

impl KeyPolicy {
    /// Create a policy rooted at `root` (e.g. "images").
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            last_timestamp_ms: AtomicI64::new(0),
        }
    }

    /// Namespace root.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Derive the key for a new upload.
    ///
    /// Yields `{root}/{subject}/{timestamp}{.ext}`. The timestamp is wall-clock
    /// milliseconds, bumped so that it strictly increases within the process.
    /// Only the lowercased extension of `original_filename` is used, and only
    /// if it is 1 to 10 ASCII alphanumerics.
    pub fn derive_upload_key(&self, subject: &str, original_filename: &str) -> ObjectKey {
        self.derive_upload_key_at(
            subject,
            original_filename,
            chrono::Utc::now().timestamp_millis(),
        )
    }

    pub(crate) fn derive_upload_key_at(
        &self,
        subject: &str,
        original_filename: &str,
        now_ms: i64,
    ) -> ObjectKey {
        let timestamp = self.next_timestamp(now_ms);
        let key = match file_extension(original_filename) {
            Some(ext) => format!("{}/{}/{}.{}", self.root, subject, timestamp, ext),
            None => format!("{}/{}/{}", self.root, subject, timestamp),
        };
        ObjectKey::new(key)
    }

    /// Check that `requested_key` belongs to `subject`.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::Forbidden` unless the key starts with
    /// `{root}/{subject}/`, has a non-empty remainder and contains no `..`
    /// or empty segment.
    pub fn authorize_access(&self, subject: &str, requested_key: &str) -> Result<(), AuthzError> {
        let prefix = self.scoped_prefix(subject);
        let remainder = requested_key
            .strip_prefix(prefix.as_str())
            .ok_or(AuthzError::Forbidden)?;

        if remainder.is_empty() {
            return Err(AuthzError::Forbidden);
        }

        if remainder
            .split('/')
            .any(|segment| segment.is_empty() || segment == "..")
        {
            return Err(AuthzError::Forbidden);
        }

        Ok(())
    }

    /// The listing prefix for `subject`: `{root}/{subject}/`.
    pub fn scoped_prefix(&self, subject: &str) -> ObjectKey {
        ObjectKey::new(format!("{}/{}/", self.root, subject))
    }

    fn next_timestamp(&self, now_ms: i64) -> i64 {
        let mut last = self.last_timestamp_ms.load(Ordering::Relaxed);
        loop {
            let next = now_ms.max(last.saturating_add(1));
            match self.last_timestamp_ms.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    // ".bashrc" has no extension
    if stem.is_empty() || stem.ends_with('/') {
        return None;
    }
    if ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn policy() -> KeyPolicy {
        KeyPolicy::new("images")
    }

    #[test]
    fn test_derive_upload_key_shape() {
        let key = policy().derive_upload_key_at("u1", "photo.png", 1_718_000_000_000);
        assert_eq!(key.as_str(), "images/u1/1718000000000.png");
    }

    #[test]
    fn test_derive_upload_key_uses_wall_clock() {
        let before = chrono::Utc::now().timestamp_millis();
        let key = policy().derive_upload_key("u1", "photo.png");
        let after = chrono::Utc::now().timestamp_millis();

        let name = key.as_str().strip_prefix("images/u1/").unwrap();
        let ts: i64 = name.strip_suffix(".png").unwrap().parse().unwrap();
        assert!(ts >= before && ts <= after);
    }

    #[test]
    fn test_derive_upload_key_same_millisecond_never_collides() {
        let policy = policy();
        let a = policy.derive_upload_key_at("u1", "a.png", 1000);
        let b = policy.derive_upload_key_at("u1", "b.png", 1000);
        let c = policy.derive_upload_key_at("u1", "c.png", 999);

        assert_eq!(a.as_str(), "images/u1/1000.png");
        assert_eq!(b.as_str(), "images/u1/1001.png");
        assert_eq!(c.as_str(), "images/u1/1002.png");
    }

    #[test]
    fn test_derive_upload_key_concurrent_unique() {
        let policy = Arc::new(policy());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let policy = Arc::clone(&policy);
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| policy.derive_upload_key("u1", "photo.jpg").into_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut keys = HashSet::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                assert!(keys.insert(key), "duplicate key issued");
            }
        }
        assert_eq!(keys.len(), 2000);
    }

    #[test]
    fn test_derive_upload_key_ignores_filename_path_content() {
        let policy = policy();
        for name in [
            "../../etc/passwd.png",
            "images/u2/evil.png",
            "..\\..\\x.png",
            "a/b/c.PNG",
        ] {
            let key = policy.derive_upload_key_at("u1", name, 5000);
            let rest = key.as_str().strip_prefix("images/u1/").unwrap();
            assert!(!rest.contains('/'), "key {} escaped namespace", key);
            assert!(rest.ends_with(".png"));
        }
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.png"), Some("png".to_string()));
        assert_eq!(file_extension("PHOTO.JPEG"), Some("jpeg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));

        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailing."), None);
        assert_eq!(file_extension(".bashrc"), None);
        assert_eq!(file_extension("dir/.hidden"), None);
        assert_eq!(file_extension("x.p%ng"), None);
        assert_eq!(file_extension("x.png/"), None);
        assert_eq!(file_extension("x.abcdefghijk"), None);
        assert_eq!(file_extension("x.abcdefghij"), Some("abcdefghij".to_string()));
    }

    #[test]
    fn test_derive_upload_key_without_extension() {
        let key = policy().derive_upload_key_at("u1", "README", 42);
        assert_eq!(key.as_str(), "images/u1/42");
    }

    #[test]
    fn test_authorize_access_own_key() {
        let policy = policy();
        assert!(policy.authorize_access("u1", "images/u1/123.png").is_ok());
        assert!(policy.authorize_access("u1", "images/u1/nested/123.png").is_ok());
    }

    #[test]
    fn test_authorize_access_other_user_forbidden() {
        let policy = policy();
        assert_eq!(
            policy.authorize_access("u1", "images/u2/123.png"),
            Err(AuthzError::Forbidden)
        );
        // Prefix of another subject
        assert_eq!(
            policy.authorize_access("u1", "images/u10/123.png"),
            Err(AuthzError::Forbidden)
        );
        assert_eq!(
            policy.authorize_access("u1", "other/u1/123.png"),
            Err(AuthzError::Forbidden)
        );
        assert_eq!(
            policy.authorize_access("u1", "u1/123.png"),
            Err(AuthzError::Forbidden)
        );
    }

    #[test]
    fn test_authorize_access_rejects_traversal_and_empty() {
        let policy = policy();
        for key in [
            "images/u1/",
            "images/u1",
            "images/u1/../u2/123.png",
            "images/u1//123.png",
            "images/u1/a/",
            "",
        ] {
            assert_eq!(
                policy.authorize_access("u1", key),
                Err(AuthzError::Forbidden),
                "key {key:?}"
            );
        }
    }

    #[test]
    fn test_scoped_prefix() {
        let policy = policy();
        assert_eq!(policy.scoped_prefix("u1").as_str(), "images/u1/");
        assert_eq!(KeyPolicy::new("uploads").scoped_prefix("abc").as_str(), "uploads/abc/");
    }

    #[test]
    fn test_derived_keys_pass_authorization() {
        let policy = policy();
        let key = policy.derive_upload_key("u1", "photo.png");
        assert!(policy.authorize_access("u1", key.as_str()).is_ok());
        assert!(key.starts_with(&policy.scoped_prefix("u1")));
        assert_eq!(
            policy.authorize_access("u2", key.as_str()),
            Err(AuthzError::Forbidden)
        );
    }
}
