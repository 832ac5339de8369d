//! Stable type identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a node in the [`TypeArena`](crate::TypeArena).
///
/// Derived from a `blake3` hash of the node's canonical form and its
/// declaration site, so the same declaration gets the same id in every
/// session. Used as both the cache key and the cycle-detection key.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(u64);

impl TypeId {
    /// Id of a named declaration. Known before its body is lowered,
    /// which is what lets a declaration refer to itself.
    pub fn declaration(file: &str, name: &str) -> Self {
        Self::hash(&["decl", file, name])
    }

    /// Id of an anonymous node inside a declaration.
    pub fn node(file: &str, context: &str, canonical: &str) -> Self {
        Self::hash(&["node", file, context, canonical])
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// Short hex form, used to name anonymous schemas.
    pub fn short(self) -> String {
        format!("{:08x}", self.0 >> 32)
    }

    fn hash(parts: &[&str]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            // length prefix keeps ("ab", "c") and ("a", "bc") apart
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_le_bytes(bytes))
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self)
    }
}
