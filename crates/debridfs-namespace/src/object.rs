//! File handle returned to hosts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::FileEntry;
use crate::path::NormalizedPath;

/// A file in the namespace, addressed relative to the engine root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Object {
    remote: String,
    folder: NormalizedPath,
    file: FileEntry,
}

impl Object {
    pub(crate) fn new(root: &NormalizedPath, folder: NormalizedPath, file: FileEntry) -> Self {
        let full = folder.file(&file.name);
        let remote = full
            .strip_prefix(root.as_str())
            .unwrap_or(&full)
            .trim_start_matches('/')
            .to_string();
        Self {
            remote,
            folder,
            file,
        }
    }

    /// Path relative to the engine root (`movies/Film/film.mkv`).
    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Folder holding the file.
    #[must_use]
    pub const fn folder(&self) -> &NormalizedPath {
        &self.folder
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.file.name
    }

    /// Size in bytes; zero until resolved.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.file.size
    }

    /// Modification time.
    #[must_use]
    pub const fn mod_time(&self) -> Option<DateTime<Utc>> {
        self.file.modified
    }

    /// Stable object id (the link's leaf id).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.file.leaf_id
    }

    /// Mime type, when resolved.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.file.mime_type.as_deref()
    }

    /// `/jobName/leafId`.
    #[must_use]
    pub fn mapping_key(&self) -> &str {
        &self.file.mapping_key
    }

    /// Owning job.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.file.job_id
    }

    /// Direct download URL, when resolved.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.file.url.as_deref()
    }

    /// Underlying entry.
    #[must_use]
    pub const fn entry(&self) -> &FileEntry {
        &self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Job;
    use debridfs_remote::TorrentStatus;

    #[test]
    fn remote_is_relative_to_root() {
        let job = Job {
            id: "T1".into(),
            name: "Film.2019".into(),
            status: TorrentStatus::Downloaded,
            hash: "h".into(),
            links: vec!["https://real-debrid.com/d/L1".into()],
            added: None,
            ended: None,
        };
        let file = FileEntry::for_link(&job, &job.links[0]);
        let folder = NormalizedPath::dir("/movies/Film.2019/");

        let object = Object::new(&NormalizedPath::root(), folder.clone(), file.clone());
        assert_eq!(object.remote(), "movies/Film.2019/L1");
        assert_eq!(object.id(), "L1");
        assert_eq!(object.mapping_key(), "/Film.2019/L1");

        let scoped = Object::new(&NormalizedPath::dir("/movies/"), folder, file);
        assert_eq!(scoped.remote(), "Film.2019/L1");
        assert_eq!(scoped.url(), None);
    }
}
