//! Move, rename, and trash rewrites of the rule file.
//!
//! # Design
//! - The rule file is rewritten first; the tables are patched only after the
//!   new content is durable.
//! - A file move governs exactly one mapping key and leaves exactly one line for it.
//! - A folder move rewrites existing lines by prefix and appends lines for keys
//!   that only had a computed default.
//! - Trashing renames the file to a `.trashed` leaf in place; the job is
//!   deleted once every one of its files is trashed.

use tracing::{debug, info};

use crate::error::{NamespaceError, NamespaceResult};
use crate::model::{FileEntry, Job, MappingEntry};
use crate::path::NormalizedPath;
use crate::rules::{RuleDocument, TRASH_MARKER};
use crate::store::RuleStore;
use crate::tables::NamespaceTables;

/// Mapping value for `file` moved into `dir` under `leaf`.
///
/// Keeps the directory form when the name is unchanged and still derived from
/// the remote, so a later resolution can rename it.
#[must_use]
pub fn file_move_value(file: &FileEntry, dir: &NormalizedPath, leaf: &str) -> String {
    if leaf == file.name && !file.name_overridden {
        dir.to_string()
    } else {
        dir.file(leaf)
    }
}

/// Mapping value that trashes a file named `name` in `folder`.
#[must_use]
pub fn trashed_value(folder: &NormalizedPath, name: &str) -> String {
    folder.file(&format!("{name}{TRASH_MARKER}"))
}

/// Apply a folder move to `document`.
///
/// `affected` lists the mapping keys and values lying under `from`. Returns the
/// number of keys whose line was rewritten or appended.
pub fn rewrite_folder_move(
    document: &mut RuleDocument,
    affected: &[(String, String)],
    from: &NormalizedPath,
    to: &NormalizedPath,
) -> usize {
    let touched = document.replace_prefix(from, to);
    let mut appended = 0;
    for (key, value) in affected {
        if touched.contains(key) {
            continue;
        }
        let mut entry = MappingEntry::parse(value);
        if let Some(moved) = entry.folder.replace_prefix(from, to) {
            entry.folder = moved;
            document.set_move(key, &entry.to_rule_value());
            appended += 1;
        }
    }
    touched.len() + appended
}

/// Rule-file writer bound to the engine's tables.
#[derive(Debug, Clone, Copy)]
pub struct Mover<'a> {
    store: &'a RuleStore,
    tables: &'a NamespaceTables,
}

impl<'a> Mover<'a> {
    /// Mover persisting through `store` and patching `tables`.
    #[must_use]
    pub const fn new(store: &'a RuleStore, tables: &'a NamespaceTables) -> Self {
        Self { store, tables }
    }

    /// Move or rename one file.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NotFound`] when the file is no longer visible,
    /// or a rule-file IO error.
    pub async fn move_file(
        &self,
        file: &FileEntry,
        dir: &NormalizedPath,
        leaf: &str,
    ) -> NamespaceResult<(NormalizedPath, FileEntry)> {
        let value = file_move_value(file, dir, leaf);
        let key = file.mapping_key.clone();
        self.store
            .rewrite(|document| document.set_move(&key, &value))
            .await?;
        let placed = self
            .tables
            .move_file(&key, &value)
            .ok_or_else(|| NamespaceError::NotFound {
                path: dir.file(leaf),
            })?;
        debug!(mapping_key = %key, destination = %value, "file moved");
        Ok(placed)
    }

    /// Move a folder and everything below it.
    ///
    /// Returns how many mapping keys were rewritten; the caller rebuilds the tables.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::DirNotFound`] when no mapping lies under `from`,
    /// or a rule-file IO error.
    pub async fn move_folder(
        &self,
        from: &NormalizedPath,
        to: &NormalizedPath,
    ) -> NamespaceResult<usize> {
        let affected = self.tables.keys_under(from);
        if affected.is_empty() {
            return Err(NamespaceError::DirNotFound {
                path: from.to_string(),
            });
        }
        let rewritten = self
            .store
            .rewrite(|document| rewrite_folder_move(document, &affected, from, to))
            .await?;
        info!(from = %from, to = %to, keys = rewritten, "folder moved");
        Ok(rewritten)
    }

    /// Trash one file; returns whether every file of `job` is now trashed.
    ///
    /// # Errors
    ///
    /// Returns a rule-file IO error.
    pub async fn trash(
        &self,
        file: &FileEntry,
        folder: &NormalizedPath,
        job: Option<&Job>,
    ) -> NamespaceResult<bool> {
        let value = trashed_value(folder, &file.name);
        let key = file.mapping_key.clone();
        self.store
            .rewrite(|document| document.set_move(&key, &value))
            .await?;
        self.tables.hide_file(&key, &value);
        debug!(mapping_key = %key, "file trashed");
        Ok(job.is_some_and(|job| self.is_fully_trashed(job)))
    }

    /// Whether every file of `job` carries the trash marker.
    #[must_use]
    pub fn is_fully_trashed(&self, job: &Job) -> bool {
        let mut links = job.file_links().peekable();
        links.peek().is_some()
            && links.all(|link| {
                self.tables
                    .mapping_value(&job.mapping_key(link))
                    .is_some_and(|value| MappingEntry::parse(&value).trashed)
            })
    }

    /// Drop every move line belonging to `job`.
    ///
    /// # Errors
    ///
    /// Returns a rule-file IO error.
    pub async fn strip_job(&self, job: &Job) -> NamespaceResult<usize> {
        let prefix = job.key_prefix();
        let removed = self
            .store
            .rewrite(|document| document.remove_moves(|source| source.starts_with(&prefix)))
            .await?;
        debug!(job_id = %job.id, removed, "job lines stripped");
        Ok(removed)
    }

    /// Drop lines declaring exactly `folder`.
    ///
    /// # Errors
    ///
    /// Returns a rule-file IO error.
    pub async fn remove_folder(&self, folder: &NormalizedPath) -> NamespaceResult<usize> {
        let removed = self
            .store
            .rewrite(|document| document.remove_folder(folder))
            .await?;
        self.tables.remove_folder(folder);
        debug!(path = %folder, removed, "folder removed");
        Ok(removed)
    }
}
