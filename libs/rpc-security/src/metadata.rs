//! Call metadata handed to auth metadata processors.

use secrecy::{ExposeSecret, SecretSlice};

/// One metadata entry: a key and an opaque value.
///
/// Values typically carry tokens and are redacted from `Debug` output.
#[derive(Debug)]
pub struct MetadataEntry {
    key: String,
    value: SecretSlice<u8>,
}

impl MetadataEntry {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &[u8] {
        self.value.expose_secret()
    }

    /// Value as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value()).ok()
    }
}

/// Ordered collection of metadata entries. Keys may repeat.
#[derive(Debug, Default)]
pub struct Metadata {
    entries: Vec<MetadataEntry>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; existing entries with the same key are kept.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.push(MetadataEntry {
            key: key.into(),
            value: SecretSlice::new(value.into().into_boxed_slice()),
        });
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    /// First value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(MetadataEntry::value)
    }

    /// Every value stored under `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.key == key)
            .map(MetadataEntry::value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetadataEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut md = Self::new();
        for (key, value) in iter {
            md.insert(key, value);
        }
        md
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = &'a MetadataEntry;
    type IntoIter = std::slice::Iter<'a, MetadataEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
