//! Configuration file sets and proposed changes

use crate::hash::ContentHash;
use crate::path::{ConfigPath, Namespace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered set of configuration files keyed by path
///
/// Ordering is by path so iteration, serialization and [`FileSet::checksum`]
/// are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSet(BTreeMap<ConfigPath, String>);

impl FileSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file, returning the previous content
    pub fn insert(&mut self, path: ConfigPath, content: impl Into<String>) -> Option<String> {
        self.0.insert(path, content.into())
    }

    /// Remove a file
    pub fn remove(&mut self, path: &ConfigPath) -> Option<String> {
        self.0.remove(path)
    }

    /// Content at path
    #[must_use]
    pub fn get(&self, path: &ConfigPath) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    /// Whether the path is present
    #[must_use]
    pub fn contains(&self, path: &ConfigPath) -> bool {
        self.0.contains_key(path)
    }

    /// Number of files
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(path, content)` in path order
    pub fn iter(&self) -> impl Iterator<Item = (&ConfigPath, &str)> {
        self.0.iter().map(|(p, c)| (p, c.as_str()))
    }

    /// Paths in order
    pub fn paths(&self) -> impl Iterator<Item = &ConfigPath> {
        self.0.keys()
    }

    /// Files of one namespace
    pub fn in_namespace(&self, namespace: Namespace) -> impl Iterator<Item = (&ConfigPath, &str)> {
        self.iter().filter(move |(p, _)| p.namespace() == namespace)
    }

    /// Fingerprint of the whole set (paths and contents)
    #[must_use]
    pub fn checksum(&self) -> ContentHash {
        ContentHash::compute_parts(
            self.0
                .iter()
                .flat_map(|(p, c)| [p.as_str().as_bytes(), c.as_bytes()]),
        )
    }

    /// Consume into the inner map
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<ConfigPath, String> {
        self.0
    }
}

impl FromIterator<(ConfigPath, String)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (ConfigPath, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FileSet {
    type Item = (ConfigPath, String);
    type IntoIter = std::collections::btree_map::IntoIter<ConfigPath, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A single proposed file write
///
/// The unit of a proposal delta. Proposals only ever replace whole files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Target path
    pub path: ConfigPath,
    /// Full replacement content
    pub content: String,
}

impl FileChange {
    /// Create new change
    #[inline]
    #[must_use]
    pub fn new(path: ConfigPath, content: impl Into<String>) -> Self {
        Self {
            path,
            content: content.into(),
        }
    }
}

/// Collect changes into a file set; later changes to the same path win
#[must_use]
pub fn changes_to_file_set(changes: &[FileChange]) -> FileSet {
    changes
        .iter()
        .map(|c| (c.path.clone(), c.content.clone()))
        .collect()
}
