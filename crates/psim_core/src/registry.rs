use std::collections::HashMap;

use parking_lot::Mutex;

use crate::constants::HASH_SEED;
use crate::error::{Error, Result};

/// DJB2 hash over the UTF-8 bytes of `name` (`h = h * 33 + byte`, wrapping)
pub fn string_hash(name: &str) -> u32 {
    name.bytes()
        .fold(HASH_SEED, |hash, byte| hash.wrapping_mul(33).wrapping_add(byte as u32))
}

/// Remembers which string every hash was first seen with.
///
/// Groups, parameters and properties are addressed by the hash of their name,
/// so the store is only sound while no two names share a hash. Every creation
/// path validates its name here first. Entries are never removed.
#[derive(Debug, Default)]
pub struct NameRegistry {
    names: Mutex<HashMap<u32, String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to its hash. Returns false if the hash already belongs to a different string.
    pub fn validate(&self, name: &str) -> bool {
        self.require(name).is_ok()
    }

    /// Like [`validate`](Self::validate), but reports the colliding string
    pub fn require(&self, name: &str) -> Result<u32> {
        let hash = string_hash(name);
        let mut names = self.names.lock();
        match names.get(&hash) {
            Some(existing) if existing != name => Err(Error::HashCollision {
                name: name.to_string(),
                existing: existing.clone(),
                hash,
            }),
            Some(_) => Ok(hash),
            None => {
                names.insert(hash, name.to_string());
                Ok(hash)
            }
        }
    }

    pub fn hash(&self, name: &str) -> u32 {
        string_hash(name)
    }

    pub fn canonical(&self, hash: u32) -> Option<String> {
        self.names.lock().get(&hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_matches_djb2() {
        assert_eq!(string_hash(""), 5381);
        assert_eq!(string_hash("a"), 5381 * 33 + 97);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let registry = NameRegistry::new();
        assert!(registry.validate("Foo"));
        assert!(registry.validate("Foo"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.canonical(string_hash("Foo")).as_deref(), Some("Foo"));
    }

    #[test]
    fn test_collision_is_rejected() {
        // 'E'*33 + 'z' == 'F'*33 + 'Y', so these share a hash at any width
        assert_eq!(string_hash("Ez"), string_hash("FY"));

        let registry = NameRegistry::new();
        assert!(registry.validate("Ez"));
        assert!(!registry.validate("FY"));
        assert!(matches!(
            registry.require("FY"),
            Err(Error::HashCollision { ref existing, .. }) if existing == "Ez"
        ));
        // the original binding is untouched
        assert!(registry.validate("Ez"));
    }
}
