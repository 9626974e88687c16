//! Namespace construction from parsed rules and an inventory snapshot.
//!
//! # Design
//! - Pure: the same rules and snapshot always yield the same tables.
//! - Explicit mappings win; a job-level key (`/name/`) is inherited by files
//!   without their own line; everything else lands in the regex default location.
//! - Files are placed before folders are synthesized, so a file keeps its name
//!   when a folder with the same name would appear in the same directory.

use std::collections::BTreeMap;

use tracing::debug;

use crate::inventory::InventorySnapshot;
use crate::model::{Entry, FileEntry, FolderEntry, MappingEntry};
use crate::path::NormalizedPath;
use crate::rules::ParsedRules;

/// Derived namespace tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    /// Mapping key to destination value, explicit lines plus seeded defaults.
    pub mapping: BTreeMap<String, String>,
    /// Folder path to ordered children.
    pub folders: BTreeMap<NormalizedPath, Vec<Entry>>,
    /// Mapping key to the folder a visible file was placed in.
    pub placements: BTreeMap<String, NormalizedPath>,
}

impl Namespace {
    /// Insert a child unless the folder already has one with the same name.
    ///
    /// Returns whether the child was inserted.
    pub fn insert_child(&mut self, folder: &NormalizedPath, entry: Entry) -> bool {
        let children = self.folders.entry(folder.clone()).or_default();
        if children.iter().any(|existing| existing.name() == entry.name()) {
            return false;
        }
        children.push(entry);
        true
    }

    /// Create every folder along `path`, linking each to its parent.
    pub fn ensure_folder(&mut self, path: &NormalizedPath) {
        for ancestor in path.ancestors() {
            self.folders.entry(ancestor).or_default();
        }
        let mut parent = NormalizedPath::root();
        for segment in path.segments() {
            let child = parent.join(segment);
            self.insert_child(
                &parent,
                Entry::Folder(FolderEntry {
                    name: segment.to_string(),
                    path: child.clone(),
                }),
            );
            parent = child;
        }
        self.folders.entry(path.clone()).or_default();
    }
}

/// Build the namespace.
#[must_use]
pub fn build(rules: &ParsedRules, snapshot: &InventorySnapshot) -> Namespace {
    let mut namespace = Namespace {
        mapping: rules.mapping_table(),
        ..Namespace::default()
    };
    namespace.folders.entry(NormalizedPath::root()).or_default();

    for job in snapshot.jobs() {
        let default_location = rules.default_location(&job.name).join(&job.name);
        let job_override = namespace
            .mapping
            .get(&job.key_prefix())
            .map(|value| NormalizedPath::dir(value));

        for link in job.file_links() {
            let mut file = FileEntry::for_link(job, link);
            if let Some(download) = snapshot.download_for(link) {
                file.apply_download(download);
            }

            let folder = if let Some(value) = namespace.mapping.get(&file.mapping_key) {
                let entry = MappingEntry::parse(value);
                if entry.trashed {
                    continue;
                }
                if let Some(leaf) = entry.leaf {
                    file.name = leaf;
                    file.name_overridden = true;
                }
                entry.folder
            } else {
                let folder = job_override
                    .clone()
                    .unwrap_or_else(|| default_location.clone());
                namespace
                    .mapping
                    .insert(file.mapping_key.clone(), folder.to_string());
                folder
            };

            let key = file.mapping_key.clone();
            if namespace.insert_child(&folder, Entry::File(file)) {
                namespace.placements.insert(key, folder);
            }
        }
    }

    let folders: Vec<NormalizedPath> = namespace
        .mapping
        .values()
        .map(|value| MappingEntry::parse(value))
        .filter(|entry| !entry.trashed)
        .map(|entry| entry.folder)
        .collect();
    for folder in &folders {
        namespace.ensure_folder(folder);
    }

    debug!(
        folders = namespace.folders.len(),
        files = namespace.placements.len(),
        mappings = namespace.mapping.len(),
        "namespace built"
    );
    namespace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InvalidRegexPolicy;
    use crate::error::NamespaceResult;
    use crate::model::Job;
    use debridfs_remote::{TorrentStatus, link_leaf};

    fn job(id: &str, name: &str, leaves: &[&str]) -> Job {
        Job {
            id: id.into(),
            name: name.into(),
            status: TorrentStatus::Downloaded,
            hash: format!("hash-{id}"),
            links: leaves
                .iter()
                .map(|leaf| format!("https://real-debrid.com/d/{leaf}"))
                .collect(),
            added: None,
            ended: None,
        }
    }

    fn names(namespace: &Namespace, folder: &str) -> Vec<String> {
        namespace
            .folders
            .get(&NormalizedPath::dir(folder))
            .map(|children| children.iter().map(|entry| entry.name().to_string()).collect())
            .unwrap_or_default()
    }

    const RULES: &str = "/shows == S[0-9]{2}\n/movies == (19|20)[0-9]{2}\n/default\n";

    #[test]
    fn classifies_by_first_matching_rule() -> NamespaceResult<()> {
        let rules = ParsedRules::parse(RULES, InvalidRegexPolicy::Warn)?;
        let snapshot = InventorySnapshot::new(
            vec![
                job("T1", "Show.S01.1080p", &["L1"]),
                job("T2", "Film.2019", &["L2"]),
                job("T3", "Something", &["L3"]),
            ],
            Vec::new(),
        );
        let namespace = build(&rules, &snapshot);
        assert_eq!(names(&namespace, "/"), vec!["shows", "movies", "default"]);
        assert_eq!(names(&namespace, "/shows/"), vec!["Show.S01.1080p"]);
        assert_eq!(names(&namespace, "/shows/Show.S01.1080p/"), vec!["L1"]);
        assert_eq!(names(&namespace, "/default/Something/"), vec!["L3"]);
        assert_eq!(
            namespace.mapping.get("/Film.2019/L2").map(String::as_str),
            Some("/movies/Film.2019/")
        );
        Ok(())
    }

    #[test]
    fn rebuild_is_idempotent() -> NamespaceResult<()> {
        let rules = ParsedRules::parse(
            &format!("{RULES}/Show.S01.1080p/L1 -> /shows/some.show/season 1/ep1.mkv\n"),
            InvalidRegexPolicy::Warn,
        )?;
        let snapshot = InventorySnapshot::new(
            vec![
                job("T1", "Show.S01.1080p", &["L1", "L2"]),
                job("T2", "Film.2019", &["L3"]),
            ],
            Vec::new(),
        );
        assert_eq!(build(&rules, &snapshot), build(&rules, &snapshot));
        Ok(())
    }

    #[test]
    fn synthesizes_missing_ancestors() -> NamespaceResult<()> {
        let rules = ParsedRules::parse(
            "/A/L1 -> /shows/some.show/season 1/\n",
            InvalidRegexPolicy::Warn,
        )?;
        let snapshot = InventorySnapshot::new(vec![job("T1", "A", &["L1"])], Vec::new());
        let namespace = build(&rules, &snapshot);
        assert_eq!(names(&namespace, "/"), vec!["shows"]);
        assert_eq!(names(&namespace, "/shows/"), vec!["some.show"]);
        assert_eq!(names(&namespace, "/shows/some.show/"), vec!["season 1"]);
        assert_eq!(names(&namespace, "/shows/some.show/season 1/"), vec!["L1"]);
        Ok(())
    }

    #[test]
    fn explicit_leaf_renames_and_trash_hides() -> NamespaceResult<()> {
        let rules = ParsedRules::parse(
            "/A/L1 -> /movies/A/film.mkv\n/A/L2 -> /default/A/L2.trashed\n",
            InvalidRegexPolicy::Warn,
        )?;
        let snapshot = InventorySnapshot::new(vec![job("T1", "A", &["L1", "L2"])], Vec::new());
        let namespace = build(&rules, &snapshot);
        assert_eq!(names(&namespace, "/movies/A/"), vec!["film.mkv"]);
        assert!(names(&namespace, "/default/A/").is_empty());
        assert!(!namespace.placements.contains_key("/A/L2"));
        let placed = namespace
            .folders
            .get(&NormalizedPath::dir("/movies/A/"))
            .and_then(|children| children.first())
            .and_then(Entry::as_file)
            .map(|file| file.name_overridden);
        assert_eq!(placed, Some(true));
        Ok(())
    }

    #[test]
    fn job_level_override_is_inherited() -> NamespaceResult<()> {
        let rules = ParsedRules::parse(
            "/some.show.S01/ -> /shows/some.show/season 1/\n",
            InvalidRegexPolicy::Warn,
        )?;
        let snapshot =
            InventorySnapshot::new(vec![job("T1", "some.show.S01", &["L1", "L2"])], Vec::new());
        let namespace = build(&rules, &snapshot);
        assert_eq!(
            names(&namespace, "/shows/some.show/season 1/"),
            vec!["L1", "L2"]
        );
        Ok(())
    }

    #[test]
    fn duplicate_names_keep_first() -> NamespaceResult<()> {
        let rules = ParsedRules::parse(
            "/A/L1 -> /x/same.mkv\n/A/L2 -> /x/same.mkv\n",
            InvalidRegexPolicy::Warn,
        )?;
        let snapshot = InventorySnapshot::new(vec![job("T1", "A", &["L1", "L2"])], Vec::new());
        let namespace = build(&rules, &snapshot);
        assert_eq!(names(&namespace, "/x/"), vec!["same.mkv"]);
        assert_eq!(
            namespace.placements.keys().cloned().collect::<Vec<_>>(),
            vec!["/A/L1".to_string()]
        );
        assert_eq!(link_leaf("https://real-debrid.com/d/L1"), "L1");
        Ok(())
    }
}
