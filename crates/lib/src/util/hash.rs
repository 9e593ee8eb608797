//! Content hashing for idempotency keys and plan identity.
//!
//! Hashes are computed over the JSON serialization of a value, so anything that
//! derives [`Serialize`] with deterministic field and map ordering hashes stably
//! across runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A content-addressed hash identifying an instruction or a plan.
///
/// The hash is a 20-character truncated SHA-256 of the JSON-serialized value,
/// lowercase hexadecimal, e.g. `"a1b2c3d4e5f6789012ab"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let digest = Sha256::digest(serialized.as_bytes());
    let full = hex::encode(digest);
    Ok(ObjectHash(full[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  #[derive(Serialize)]
  struct Sample {
    name: &'static str,
    labels: BTreeMap<&'static str, &'static str>,
  }

  impl Hashable for Sample {}

  fn sample(labels: &[(&'static str, &'static str)]) -> Sample {
    Sample {
      name: "web",
      labels: labels.iter().copied().collect(),
    }
  }

  #[test]
  fn hash_is_truncated_lowercase_hex() {
    let hash = sample(&[]).compute_hash().unwrap();
    assert_eq!(hash.0.len(), OBJ_HASH_PREFIX_LEN);
    assert!(hash.0.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
  }

  #[test]
  fn insertion_order_does_not_change_hash() {
    let a = sample(&[("tier", "frontend"), ("team", "core")]);
    let b = sample(&[("team", "core"), ("tier", "frontend")]);
    assert_eq!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
  }

  #[test]
  fn different_content_different_hash() {
    let a = sample(&[("tier", "frontend")]);
    let b = sample(&[("tier", "backend")]);
    assert_ne!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
  }
}
