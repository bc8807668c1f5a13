//! Storage key derivation.

/// Prefix used when the configured one is empty.
pub const DEFAULT_PREFIX: &str = "ratelimit";

/// The store key holding one identifier's counter.
///
/// Rendered as `<prefix>:<identifier>`. Anything reading the store directly
/// must use the same format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Derive the key for `identifier` under `prefix`.
    pub fn new(prefix: &str, identifier: &str) -> Self {
        Self(format!("{}:{}", prefix, identifier))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_format() {
        let key = StorageKey::new("ratelimit", "u1");
        assert_eq!(key.as_str(), "ratelimit:u1");
        assert_eq!(key.to_string(), "ratelimit:u1");
    }

    #[test]
    fn test_identifier_may_contain_separator() {
        let key = StorageKey::new("api", "10.0.0.1:8080");
        assert_eq!(key.as_str(), "api:10.0.0.1:8080");
    }

    #[test]
    fn test_storage_key_equality() {
        assert_eq!(StorageKey::new("p", "id"), StorageKey::new("p", "id"));
        assert_ne!(StorageKey::new("p", "id"), StorageKey::new("q", "id"));
    }
}
