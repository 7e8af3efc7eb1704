//! Observations and the viewer fingerprint derived from them

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Client address as logged by nginx (`$remote_addr`)
pub const FIELD_REMOTE: &str = "remote";
/// Requested resource path
pub const FIELD_PATH: &str = "path";
/// Client user agent
pub const FIELD_AGENT: &str = "agent";
/// Optional `X-Forwarded-For` header of a proxied request
pub const FIELD_FORWARDED_FOR: &str = "http_x_forwarded_for";

/// Attributes identifying a viewer, in hashing order
pub const FINGERPRINT_FIELDS: [&str; 4] =
    [FIELD_REMOTE, FIELD_PATH, FIELD_AGENT, FIELD_FORWARDED_FOR];

/// One access event as a set of named string attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    fields: BTreeMap<String, String>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Attribute value, or the empty string when absent
    pub fn field(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }
}

impl<K, V> FromIterator<(K, V)> for Observation
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for Observation {
    fn from(fields: HashMap<String, String>) -> Self {
        fields.into_iter().collect()
    }
}

/// Fixed-width viewer identity.
///
/// SHA-256 over the [`FINGERPRINT_FIELDS`] values. Each value is prefixed with
/// its byte length so that `("ab", "c")` and `("a", "bc")` stay distinct.
/// Missing attributes hash as empty strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(observation: &Observation) -> Self {
        let mut hasher = Sha256::new();
        for name in FINGERPRINT_FIELDS {
            let value = observation.field(name).as_bytes();
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value);
        }
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are plenty to tell viewers apart in logs
        write!(f, "Fingerprint({})", hex::encode(&self.0[..8]))
    }
}
