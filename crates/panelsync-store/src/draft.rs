//! Draft Store
//!
//! Mutable per-controller working set. Writes to distinct paths proceed
//! independently; deploy, rollback and discard freeze a controller's draft
//! so no write can interleave with enumerate-and-copy.
//!
//! Content is opaque here; callers validate before writing.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use panelsync_artifact::{ConfigPath, ContentHash, ControllerId, FileSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One draft file with provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftEntry {
    /// Document text
    pub content: String,
    /// Who wrote it (`user:<name>` or `ai:<model>`)
    pub author: String,
    /// Last write time
    pub updated_at: DateTime<Utc>,
    /// Hash of `content`
    pub hash: ContentHash,
}

impl DraftEntry {
    fn new(content: String, author: &str) -> Self {
        let hash = ContentHash::compute(content.as_bytes());
        Self {
            content,
            author: author.to_owned(),
            updated_at: Utc::now(),
            hash,
        }
    }
}

#[derive(Debug, Default)]
struct ControllerDraft {
    files: DashMap<ConfigPath, DraftEntry>,
    // Writers hold it shared, freezers hold it exclusive.
    gate: RwLock<()>,
}

/// Exclusive view of one controller's draft
///
/// Obtained through [`DraftStore::freeze`]. While it exists no write,
/// delete or other freeze on the same controller can proceed.
pub struct FrozenDraft<'a> {
    draft: &'a ControllerDraft,
}

impl FrozenDraft<'_> {
    /// Copy of the current file set
    #[must_use]
    pub fn files(&self) -> FileSet {
        self.draft
            .files
            .iter()
            .map(|e| (e.key().clone(), e.value().content.clone()))
            .collect()
    }

    /// Number of draft files
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.draft.files.len()
    }

    /// Whether the draft is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.draft.files.is_empty()
    }

    /// Replace the whole draft with `files`
    ///
    /// Paths absent from `files` are removed.
    pub fn replace_all(&self, files: &FileSet, author: &str) {
        self.draft.files.clear();
        for (path, content) in files.iter() {
            self.draft
                .files
                .insert(path.clone(), DraftEntry::new(content.to_owned(), author));
        }
    }

    /// Remove every draft file, returning how many were removed
    pub fn clear(&self) -> usize {
        let n = self.draft.files.len();
        self.draft.files.clear();
        n
    }
}

/// Per-controller mutable working sets
#[derive(Debug, Default)]
pub struct DraftStore {
    controllers: DashMap<ControllerId, Arc<ControllerDraft>>,
}

impl DraftStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn controller(&self, id: &ControllerId) -> Arc<ControllerDraft> {
        // Clone out so the shard lock is released before touching the draft.
        Arc::clone(self.controllers.entry(id.clone()).or_default().value())
    }

    fn existing(&self, id: &ControllerId) -> Option<Arc<ControllerDraft>> {
        self.controllers.get(id).map(|d| Arc::clone(d.value()))
    }

    /// Create or overwrite a draft file
    ///
    /// Returns the entry it replaced, if any.
    pub fn write(
        &self,
        controller: &ControllerId,
        path: ConfigPath,
        content: impl Into<String>,
        author: &str,
    ) -> Option<DraftEntry> {
        let draft = self.controller(controller);
        let _shared = draft.gate.read();
        let entry = DraftEntry::new(content.into(), author);
        tracing::debug!(
            controller = %controller,
            path = %path,
            author,
            hash = %entry.hash.short(),
            "draft write"
        );
        draft.files.insert(path, entry)
    }

    /// Read one draft file
    pub fn read(&self, controller: &ControllerId, path: &ConfigPath) -> StoreResult<DraftEntry> {
        self.existing(controller)
            .and_then(|d| {
                let entry = d.files.get(path)?.value().clone();
                Some(entry)
            })
            .ok_or_else(|| StoreError::NotFound {
                controller: controller.clone(),
                path: path.clone(),
            })
    }

    /// Delete one draft file
    pub fn delete(&self, controller: &ControllerId, path: &ConfigPath) -> StoreResult<DraftEntry> {
        let removed = self.existing(controller).and_then(|d| {
            let _shared = d.gate.read();
            d.files.remove(path).map(|(_, e)| e)
        });
        removed.ok_or_else(|| StoreError::NotFound {
            controller: controller.clone(),
            path: path.clone(),
        })
    }

    /// Paths and entries in the draft, ordered by path
    #[must_use]
    pub fn entries(&self, controller: &ControllerId) -> Vec<(ConfigPath, DraftEntry)> {
        let Some(draft) = self.existing(controller) else {
            return Vec::new();
        };
        let mut out: Vec<_> = draft
            .files
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Current draft content as a file set
    #[must_use]
    pub fn files(&self, controller: &ControllerId) -> FileSet {
        self.entries(controller)
            .into_iter()
            .map(|(p, e)| (p, e.content))
            .collect()
    }

    /// Number of draft files for a controller
    #[must_use]
    pub fn len(&self, controller: &ControllerId) -> usize {
        self.existing(controller).map_or(0, |d| d.files.len())
    }

    /// Run `f` with the controller's draft frozen
    ///
    /// Keep `f` short: every writer to this controller waits on it.
    pub fn freeze<R>(&self, controller: &ControllerId, f: impl FnOnce(&FrozenDraft<'_>) -> R) -> R {
        let draft = self.controller(controller);
        let _exclusive = draft.gate.write();
        f(&FrozenDraft { draft: &draft })
    }

    /// Controllers that have ever had a draft
    #[must_use]
    pub fn controllers(&self) -> Vec<ControllerId> {
        let mut ids: Vec<_> = self.controllers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
