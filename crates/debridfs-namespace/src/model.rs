//! Domain model shared by the builder, tables, and engine.

use chrono::{DateTime, Utc};
use debridfs_remote::{DownloadRecord, TorrentInfo, TorrentRecord, TorrentStatus, link_leaf};
use serde::Serialize;

use crate::path::NormalizedPath;
use crate::rules::TRASH_MARKER;

/// A remote download job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    /// Remote job identifier.
    pub id: String,
    /// Display name; the first segment of every mapping key of its files.
    pub name: String,
    /// Remote status.
    pub status: TorrentStatus,
    /// Content hash used to re-create the job.
    pub hash: String,
    /// Restricted links, one per selected file.
    pub links: Vec<String>,
    /// Creation time.
    pub added: Option<DateTime<Utc>>,
    /// Completion time.
    pub ended: Option<DateTime<Utc>>,
}

impl Job {
    /// Mapping key prefix shared by every file of this job (`/name/`).
    #[must_use]
    pub fn key_prefix(&self) -> String {
        format!("/{}/", self.name)
    }

    /// Mapping key of the file behind `link`.
    #[must_use]
    pub fn mapping_key(&self, link: &str) -> String {
        format!("/{}/{}", self.name, link_leaf(link))
    }

    /// Non-empty links; each one is a file.
    pub fn file_links(&self) -> impl Iterator<Item = &str> {
        self.links
            .iter()
            .map(String::as_str)
            .filter(|link| !link.is_empty())
    }
}

impl From<TorrentRecord> for Job {
    fn from(record: TorrentRecord) -> Self {
        Self {
            id: record.id,
            name: record.filename,
            status: record.status,
            hash: record.hash,
            links: record.links,
            added: record.added,
            ended: record.ended,
        }
    }
}

impl From<TorrentInfo> for Job {
    fn from(info: TorrentInfo) -> Self {
        Self::from(info.torrent)
    }
}

/// A file surfaced in the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// `/jobName/leafId`.
    pub mapping_key: String,
    /// Last segment of the restricted link.
    pub leaf_id: String,
    /// Display name.
    pub name: String,
    /// Whether `name` comes from an explicit mapping and must not be replaced.
    pub name_overridden: bool,
    /// Owning job.
    pub job_id: String,
    /// Owning job's content hash.
    pub job_hash: String,
    /// Restricted link the file was derived from.
    pub original_link: String,
    /// Resolved direct-download URL, when known.
    pub url: Option<String>,
    /// Size in bytes, when known.
    pub size: u64,
    /// Mime type, when known.
    pub mime_type: Option<String>,
    /// Modification time.
    pub modified: Option<DateTime<Utc>>,
}

impl FileEntry {
    /// Entry for `link` of `job` before any resolution is applied.
    #[must_use]
    pub fn for_link(job: &Job, link: &str) -> Self {
        let leaf_id = link_leaf(link).to_string();
        Self {
            mapping_key: job.mapping_key(link),
            name: leaf_id.clone(),
            leaf_id,
            name_overridden: false,
            job_id: job.id.clone(),
            job_hash: job.hash.clone(),
            original_link: link.to_string(),
            url: None,
            size: 0,
            mime_type: None,
            modified: job.ended.or(job.added),
        }
    }

    /// Apply a cached or freshly resolved download.
    pub fn apply_download(&mut self, download: &DownloadRecord) {
        if !self.name_overridden && !download.filename.is_empty() {
            self.name.clone_from(&download.filename);
        }
        if !download.download.is_empty() {
            self.url = Some(download.download.clone());
        }
        self.size = download.filesize;
        self.mime_type.clone_from(&download.mime_type);
        if let Some(generated) = download.generated {
            self.modified = Some(generated);
        }
    }
}

/// A synthesized folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderEntry {
    /// Leaf name.
    pub name: String,
    /// Full path in directory form.
    pub path: NormalizedPath,
}

/// A child of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    /// Sub-folder.
    Folder(FolderEntry),
    /// File.
    File(FileEntry),
}

impl Entry {
    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.name,
            Self::File(file) => &file.name,
        }
    }

    /// Whether this is a folder.
    #[must_use]
    pub const fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }

    /// The file, when this is one.
    #[must_use]
    pub const fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Self::File(file) => Some(file),
            Self::Folder(_) => None,
        }
    }
}

/// Parsed mapping value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Destination folder.
    pub folder: NormalizedPath,
    /// Explicit leaf name, when the value is a full path.
    pub leaf: Option<String>,
    /// Whether the value carries the trash marker.
    pub trashed: bool,
}

impl MappingEntry {
    /// Parse `/a/b/` (folder) or `/a/b/name` (full path).
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let trashed = value.ends_with(TRASH_MARKER);
        if value.ends_with('/') {
            return Self {
                folder: NormalizedPath::dir(value),
                leaf: None,
                trashed,
            };
        }
        match value.rsplit_once('/') {
            Some((folder, leaf)) if !leaf.is_empty() => Self {
                folder: NormalizedPath::dir(folder),
                leaf: Some(leaf.to_string()),
                trashed,
            },
            _ => Self {
                folder: NormalizedPath::dir(value),
                leaf: None,
                trashed,
            },
        }
    }

    /// Folder destination without an explicit leaf.
    #[must_use]
    pub const fn folder(folder: NormalizedPath) -> Self {
        Self {
            folder,
            leaf: None,
            trashed: false,
        }
    }

    /// Rule-file value.
    #[must_use]
    pub fn to_rule_value(&self) -> String {
        match &self.leaf {
            Some(leaf) => self.folder.file(leaf),
            None => self.folder.to_string(),
        }
    }
}
