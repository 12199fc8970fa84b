//! Record identity and revision types.

use crate::error::StoreResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of digest bytes kept in a revision.
const DIGEST_BYTES: usize = 8;

/// Storage key of a record.
///
/// Remote identities are numeric; the store only sees their decimal string
/// form. [`DocKey::from_numeric`] is the single place that conversion happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocKey(String);

impl DocKey {
    /// Creates a key from an arbitrary string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates a key from a numeric identity (decimal, no padding).
    pub fn from_numeric(id: u64) -> Self {
        Self(id.to_string())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque storage revision, formatted as `<generation>-<digest>`.
///
/// Callers never build revisions themselves outside of tests; they read one
/// from a stored record and hand it back on the next write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Creates a revision from its parts.
    pub fn new(generation: u64, digest: &str) -> Self {
        Self(format!("{generation}-{digest}"))
    }

    /// Returns the write generation, or 0 if the revision is malformed.
    pub fn generation(&self) -> u64 {
        self.0
            .split_once('-')
            .and_then(|(generation, _)| generation.parse().ok())
            .unwrap_or(0)
    }

    /// Returns the content digest part.
    pub fn digest(&self) -> &str {
        self.0.split_once('-').map_or("", |(_, digest)| digest)
    }

    /// Returns the revision as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document that can be kept in a [`crate::DocumentStore`].
///
/// The revision lives inside the record so that a record read from the
/// store can be modified and written straight back.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Returns the storage key of this record.
    fn key(&self) -> DocKey;

    /// Returns the storage revision carried by this record.
    fn revision(&self) -> Option<&Revision>;

    /// Replaces the storage revision carried by this record.
    fn set_revision(&mut self, revision: Option<Revision>);
}

/// Computes the content digest of a record, ignoring its revision.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized.
pub fn content_digest<R: Record>(record: &R) -> StoreResult<String> {
    let mut bare = record.clone();
    bare.set_revision(None);
    let bytes = serde_json::to_vec(&bare)?;
    let hash = Sha256::digest(&bytes);
    Ok(hash[..DIGEST_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}


#[cfg(test)]
mod tests {
    use super::testing::Note;
    use super::*;

    #[test]
    fn numeric_keys_are_plain_decimal() {
        assert_eq!(DocKey::from_numeric(10007255869124).as_str(), "10007255869124");
        assert_eq!(DocKey::from_numeric(0).as_str(), "0");
        assert_eq!(DocKey::from_numeric(42), DocKey::new("42"));
    }

    #[test]
    fn revision_parts() {
        let rev = Revision::new(3, "00ff");
        assert_eq!(rev.as_str(), "3-00ff");
        assert_eq!(rev.generation(), 3);
        assert_eq!(rev.digest(), "00ff");

        let odd = Revision("garbage".into());
        assert_eq!(odd.generation(), 0);
        assert_eq!(odd.digest(), "");
    }

    #[test]
    fn digest_ignores_revision() {
        let mut a = Note::new(1, "abc");
        let plain = content_digest(&a).unwrap();
        a.rev = Some(Revision::new(9, "whatever"));
        assert_eq!(content_digest(&a).unwrap(), plain);
        assert_eq!(plain.len(), DIGEST_BYTES * 2);
    }

    #[test]
    fn digest_tracks_content() {
        let a = Note::new(1, "abc");
        let b = Note::new(1, "efg");
        assert_ne!(content_digest(&a).unwrap(), content_digest(&b).unwrap());
    }
}
