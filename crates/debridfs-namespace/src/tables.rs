//! Process-wide mapping and folder tables.
//!
//! # Design
//! - One lock guards the mapping, folder and placement maps together, so
//!   readers never observe a half-installed namespace.
//! - Guards are never held across an await point.
//! - Multi-step edits (file moves, hides) run under a single write guard.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use debridfs_remote::DownloadRecord;
use serde::Serialize;
use tracing::debug;

use crate::builder::Namespace;
use crate::model::{Entry, FileEntry, MappingEntry};
use crate::path::NormalizedPath;

/// Serializable copy of the tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceSnapshot {
    /// Mapping key to destination value.
    pub mapping: BTreeMap<String, String>,
    /// Folder path to children.
    pub folders: BTreeMap<NormalizedPath, Vec<Entry>>,
}

#[derive(Debug, Default)]
struct TableState {
    namespace: Namespace,
}

impl TableState {
    fn take_file(&mut self, key: &str) -> Option<FileEntry> {
        let folder = self.namespace.placements.remove(key)?;
        let children = self.namespace.folders.get_mut(&folder)?;
        let index = children
            .iter()
            .position(|entry| matches!(entry, Entry::File(file) if file.mapping_key == key))?;
        match children.remove(index) {
            Entry::File(file) => Some(file),
            Entry::Folder(_) => None,
        }
    }
}

/// Namespace state shared by readers and the engine.
#[derive(Debug, Default)]
pub struct NamespaceTables {
    state: RwLock<TableState>,
}

impl NamespaceTables {
    /// Empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, TableState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TableState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the tables with a freshly built namespace.
    ///
    /// Returns how many mapping keys were inserted, changed, or removed.
    pub fn install(&self, namespace: Namespace) -> usize {
        let mut state = self.write();
        let previous = &state.namespace.mapping;
        let removed = previous
            .keys()
            .filter(|key| !namespace.mapping.contains_key(*key))
            .count();
        let changed = namespace
            .mapping
            .iter()
            .filter(|(key, value)| previous.get(*key) != Some(*value))
            .count();
        state.namespace = namespace;
        let changed = removed + changed;
        debug!(
            changed,
            folders = state.namespace.folders.len(),
            "tables installed"
        );
        changed
    }

    /// Whether `path` is a known folder.
    #[must_use]
    pub fn folder_exists(&self, path: &NormalizedPath) -> bool {
        self.read().namespace.folders.contains_key(path)
    }

    /// Children of `path`; `None` when the folder is unknown.
    #[must_use]
    pub fn children(&self, path: &NormalizedPath) -> Option<Vec<Entry>> {
        self.read().namespace.folders.get(path).cloned()
    }

    /// Child of `folder` named `name`.
    #[must_use]
    pub fn child(&self, folder: &NormalizedPath, name: &str) -> Option<Entry> {
        self.read()
            .namespace
            .folders
            .get(folder)
            .and_then(|children| children.iter().find(|entry| entry.name() == name).cloned())
    }

    /// Current mapping value of `key`.
    #[must_use]
    pub fn mapping_value(&self, key: &str) -> Option<String> {
        self.read().namespace.mapping.get(key).cloned()
    }

    /// Mapping keys whose destination folder lies at or below `folder`, sorted.
    #[must_use]
    pub fn keys_under(&self, folder: &NormalizedPath) -> Vec<(String, String)> {
        self.read()
            .namespace
            .mapping
            .iter()
            .filter(|(_, value)| MappingEntry::parse(value).folder.starts_with(folder))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Folder a visible file was placed in.
    #[must_use]
    pub fn placement(&self, key: &str) -> Option<NormalizedPath> {
        self.read().namespace.placements.get(key).cloned()
    }

    /// Visible file with mapping key `key`.
    #[must_use]
    pub fn file(&self, key: &str) -> Option<FileEntry> {
        let state = self.read();
        let folder = state.namespace.placements.get(key)?;
        state
            .namespace
            .folders
            .get(folder)?
            .iter()
            .filter_map(Entry::as_file)
            .find(|file| file.mapping_key == key)
            .cloned()
    }

    /// Every visible file at or below `folder`, paired with its parent folder.
    #[must_use]
    pub fn files_under(&self, folder: &NormalizedPath) -> Vec<(NormalizedPath, FileEntry)> {
        let state = self.read();
        let mut files: Vec<(NormalizedPath, FileEntry)> = state
            .namespace
            .folders
            .iter()
            .filter(|(path, _)| path.starts_with(folder))
            .flat_map(|(path, children)| {
                children
                    .iter()
                    .filter_map(Entry::as_file)
                    .map(move |file| (path.clone(), file.clone()))
            })
            .collect();
        files.sort_by(|a, b| (&a.0, &a.1.mapping_key).cmp(&(&b.0, &b.1.mapping_key)));
        files
    }

    /// Register `path` and every missing ancestor.
    pub fn add_folder(&self, path: &NormalizedPath) {
        self.write().namespace.ensure_folder(path);
    }

    /// Drop `path` and its link from the parent folder.
    pub fn remove_folder(&self, path: &NormalizedPath) {
        let mut state = self.write();
        state.namespace.folders.remove(path);
        if let (Some(parent), Some(leaf)) = (path.parent(), path.leaf()) {
            if let Some(children) = state.namespace.folders.get_mut(&parent) {
                children.retain(|entry| !(entry.is_folder() && entry.name() == leaf));
            }
        }
    }

    /// Re-point `key` at `value` and move its visible file accordingly.
    ///
    /// Returns the file as placed, or `None` when the file is not visible.
    pub fn move_file(&self, key: &str, value: &str) -> Option<(NormalizedPath, FileEntry)> {
        let mut state = self.write();
        let mut file = state.take_file(key)?;
        let target = MappingEntry::parse(value);
        if let Some(leaf) = target.leaf {
            file.name = leaf;
            file.name_overridden = true;
        }
        let namespace = &mut state.namespace;
        namespace.mapping.insert(key.to_string(), value.to_string());
        namespace.ensure_folder(&target.folder);
        namespace
            .folders
            .entry(target.folder.clone())
            .or_default()
            .push(Entry::File(file.clone()));
        namespace
            .placements
            .insert(key.to_string(), target.folder.clone());
        Some((target.folder, file))
    }

    /// Re-point `key` at a trashed `value` and hide its file.
    pub fn hide_file(&self, key: &str, value: &str) {
        let mut state = self.write();
        state.take_file(key);
        state
            .namespace
            .mapping
            .insert(key.to_string(), value.to_string());
    }

    /// Record a resolved download on the visible file behind `key`.
    pub fn apply_download(&self, key: &str, download: &DownloadRecord) -> Option<FileEntry> {
        let mut state = self.write();
        let namespace = &mut state.namespace;
        let folder = namespace.placements.get(key)?.clone();
        let file = namespace
            .folders
            .get_mut(&folder)?
            .iter_mut()
            .find_map(|entry| match entry {
                Entry::File(file) if file.mapping_key == key => Some(file),
                Entry::File(_) | Entry::Folder(_) => None,
            })?;
        file.apply_download(download);
        Some(file.clone())
    }

    /// Copy of the tables.
    #[must_use]
    pub fn snapshot(&self) -> NamespaceSnapshot {
        let state = self.read();
        NamespaceSnapshot {
            mapping: state.namespace.mapping.clone(),
            folders: state.namespace.folders.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::config::InvalidRegexPolicy;
    use crate::error::NamespaceResult;
    use crate::inventory::InventorySnapshot;
    use crate::model::Job;
    use crate::rules::ParsedRules;
    use debridfs_remote::TorrentStatus;

    fn installed(rules: &str) -> NamespaceResult<NamespaceTables> {
        let rules = ParsedRules::parse(rules, InvalidRegexPolicy::Warn)?;
        let job = Job {
            id: "T1".into(),
            name: "A".into(),
            status: TorrentStatus::Downloaded,
            hash: "h".into(),
            links: vec![
                "https://real-debrid.com/d/L1".into(),
                "https://real-debrid.com/d/L2".into(),
            ],
            added: None,
            ended: None,
        };
        let snapshot = InventorySnapshot::new(vec![job], Vec::new());
        let tables = NamespaceTables::new();
        tables.install(build(&rules, &snapshot));
        Ok(tables)
    }

    fn names(tables: &NamespaceTables, folder: &str) -> Vec<String> {
        tables
            .children(&NormalizedPath::dir(folder))
            .unwrap_or_default()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect()
    }

    #[test]
    fn reinstall_reports_only_changes() -> NamespaceResult<()> {
        let tables = installed("/default\n")?;
        let rules = ParsedRules::parse("/default\n", InvalidRegexPolicy::Warn)?;
        let snapshot = InventorySnapshot::new(Vec::new(), Vec::new());
        let changed = tables.install(build(&rules, &snapshot));
        assert_eq!(changed, 2);
        assert!(tables.mapping_value("/A/L1").is_none());
        assert_eq!(tables.mapping_value("/default").as_deref(), Some("/default/"));
        Ok(())
    }

    #[test]
    fn move_file_relocates_and_renames() -> NamespaceResult<()> {
        let tables = installed("")?;
        let moved = tables.move_file("/A/L1", "/movies/A/film.mkv");
        assert_eq!(
            moved.map(|(folder, file)| (folder.to_string(), file.name)),
            Some(("/movies/A/".to_string(), "film.mkv".to_string()))
        );
        assert_eq!(names(&tables, "/default/A/"), vec!["L2"]);
        assert_eq!(names(&tables, "/movies/"), vec!["A"]);
        assert_eq!(names(&tables, "/movies/A/"), vec!["film.mkv"]);
        assert_eq!(
            tables.placement("/A/L1").map(|folder| folder.to_string()),
            Some("/movies/A/".to_string())
        );
        Ok(())
    }

    #[test]
    fn hidden_files_leave_the_listing() -> NamespaceResult<()> {
        let tables = installed("")?;
        tables.hide_file("/A/L1", "/default/A/L1.trashed");
        assert_eq!(names(&tables, "/default/A/"), vec!["L2"]);
        assert!(tables.file("/A/L1").is_none());
        assert_eq!(
            tables.mapping_value("/A/L1").as_deref(),
            Some("/default/A/L1.trashed")
        );
        Ok(())
    }

    #[test]
    fn files_under_walks_descendants() -> NamespaceResult<()> {
        let tables = installed("")?;
        let files = tables.files_under(&NormalizedPath::dir("/default/"));
        let keys: Vec<&str> = files.iter().map(|(_, file)| file.mapping_key.as_str()).collect();
        assert_eq!(keys, vec!["/A/L1", "/A/L2"]);
        tables.remove_folder(&NormalizedPath::dir("/default/A/"));
        assert!(names(&tables, "/default/").is_empty());
        Ok(())
    }
}
