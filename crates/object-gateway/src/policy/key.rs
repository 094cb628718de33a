//! Storage object key.

use serde::Serialize;
use std::fmt;

/// A storage path such as `images/{subject}/1718000000000.png`.
///
/// Keys built by [`KeyPolicy`](super::KeyPolicy) are scoped to a subject;
/// keys read back from storage are wrapped as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Last path segment, used as the display filename in listings.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// True if this key starts with `prefix`.
    pub fn starts_with(&self, prefix: &ObjectKey) -> bool {
        self.0.starts_with(prefix.as_str())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
