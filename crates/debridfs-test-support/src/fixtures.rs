//! Inventory builders and temporary rule files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use debridfs_remote::{TorrentFileRecord, TorrentInfo, TorrentRecord, TorrentStatus};
use tempfile::TempDir;

/// Restricted link the fake remote issues for file `file_id` of the job with `hash`.
///
/// Links depend only on the content, so a re-created job keeps its mapping keys.
#[must_use]
pub fn link_for(hash: &str, file_id: u64) -> String {
    let prefix: String = hash.chars().take(8).collect();
    format!("https://real-debrid.com/d/{}{file_id:04}", prefix.to_uppercase())
}

/// Fixed UTC timestamp `2024-03-<day>T10:00:00Z`.
#[must_use]
pub fn timestamp(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Builder for a remote job with its files.
#[derive(Debug, Clone)]
pub struct FakeTorrent {
    info: TorrentInfo,
}

impl FakeTorrent {
    /// A downloaded job with no files yet.
    #[must_use]
    pub fn new(id: &str, name: &str, hash: &str) -> Self {
        Self {
            info: TorrentInfo {
                torrent: TorrentRecord {
                    id: id.to_string(),
                    filename: name.to_string(),
                    hash: hash.to_string(),
                    bytes: 0,
                    status: TorrentStatus::Downloaded,
                    links: Vec::new(),
                    added: Some(timestamp(1)),
                    ended: Some(timestamp(2)),
                },
                files: Vec::new(),
            },
        }
    }

    /// Add a selected file; its link is [`link_for`] the job hash.
    #[must_use]
    pub fn file(mut self, file_id: u64, path: &str, bytes: u64) -> Self {
        self.info.files.push(TorrentFileRecord {
            id: file_id,
            path: path.to_string(),
            bytes,
            selected: 1,
        });
        self.info.torrent.bytes += bytes;
        self.info
            .torrent
            .links
            .push(link_for(&self.info.torrent.hash, file_id));
        self
    }

    /// Add a file that was not selected for download.
    #[must_use]
    pub fn unselected_file(mut self, file_id: u64, path: &str, bytes: u64) -> Self {
        self.info.files.push(TorrentFileRecord {
            id: file_id,
            path: path.to_string(),
            bytes,
            selected: 0,
        });
        self
    }

    /// Override the job status.
    #[must_use]
    pub const fn status(mut self, status: TorrentStatus) -> Self {
        self.info.torrent.status = status;
        self
    }

    /// Finished job details.
    #[must_use]
    pub fn build(self) -> TorrentInfo {
        self.info
    }

    /// Restricted link of `file_id`.
    #[must_use]
    pub fn link(&self, file_id: u64) -> String {
        link_for(&self.info.torrent.hash, file_id)
    }

    /// Leaf id of `file_id`'s link.
    #[must_use]
    pub fn leaf(&self, file_id: u64) -> String {
        debridfs_remote::link_leaf(&self.link(file_id)).to_string()
    }

    /// Mapping key of `file_id`.
    #[must_use]
    pub fn mapping_key(&self, file_id: u64) -> String {
        format!("/{}/{}", self.info.torrent.filename, self.leaf(file_id))
    }
}

/// Rule file inside a temporary directory.
#[derive(Debug)]
pub struct RuleFileFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl RuleFileFixture {
    /// Write `contents` to a fresh rule file.
    ///
    /// # Errors
    ///
    /// Returns an error when the temp directory or file cannot be created.
    pub fn with_contents(contents: &str) -> Result<Self> {
        let dir = TempDir::new().context("failed to create temp dir")?;
        let path = dir.path().join("sorting.txt");
        std::fs::write(&path, contents).context("failed to write rule file")?;
        Ok(Self { _dir: dir, path })
    }

    /// Reserve a rule-file path without creating the file.
    ///
    /// # Errors
    ///
    /// Returns an error when the temp directory cannot be created.
    pub fn missing() -> Result<Self> {
        let dir = TempDir::new().context("failed to create temp dir")?;
        let path = dir.path().join("sorting.txt");
        Ok(Self { _dir: dir, path })
    }

    /// Rule file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read.
    pub fn contents(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).context("failed to read rule file")
    }

    /// Lines that mention `needle`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read.
    pub fn lines_containing(&self, needle: &str) -> Result<Vec<String>> {
        Ok(self
            .contents()?
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect())
    }
}
