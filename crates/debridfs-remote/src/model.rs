//! Wire DTOs for the Real-Debrid REST API.
//!
//! # Design
//! - Mirror the JSON payloads closely; domain shaping happens in the namespace crate.
//! - Tolerate missing optional fields so partially-populated jobs still decode.

use std::fmt;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::error::RemoteResult;

/// Byte stream returned when opening a direct-download URL.
pub type ContentStream = Pin<Box<dyn Stream<Item = RemoteResult<Vec<u8>>> + Send>>;

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total item count reported by the service (`X-Total-Count`), when present.
    pub total: Option<usize>,
}

impl<T> Page<T> {
    /// Empty page with a known total of zero.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: Some(0),
        }
    }
}

/// Remote job status as reported by `/torrents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    /// Magnet could not be resolved.
    MagnetError,
    /// Magnet is being converted into metadata.
    MagnetConversion,
    /// Metadata is known; the job waits for a file selection.
    WaitingFilesSelection,
    /// Queued for download.
    Queued,
    /// Downloading on the remote side.
    Downloading,
    /// All selected files are available.
    Downloaded,
    /// Remote reported an error.
    Error,
    /// Flagged as malicious.
    Virus,
    /// Being compressed.
    Compressing,
    /// Being uploaded.
    Uploading,
    /// Content is no longer available on the remote.
    Dead,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl TorrentStatus {
    /// Stable wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MagnetError => "magnet_error",
            Self::MagnetConversion => "magnet_conversion",
            Self::WaitingFilesSelection => "waiting_files_selection",
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Error => "error",
            Self::Virus => "virus",
            Self::Compressing => "compressing",
            Self::Uploading => "uploading",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the job needs to be re-created before its files can be served.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Dead | Self::Error)
    }
}

impl fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry of `/torrents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentRecord {
    /// Remote job identifier.
    pub id: String,
    /// Display name of the job.
    pub filename: String,
    /// Content (info) hash.
    #[serde(default)]
    pub hash: String,
    /// Total size of the selected files.
    #[serde(default)]
    pub bytes: u64,
    /// Current job status.
    pub status: TorrentStatus,
    /// Restricted hoster links, one per selected file.
    #[serde(default)]
    pub links: Vec<String>,
    /// Creation time.
    #[serde(default)]
    pub added: Option<DateTime<Utc>>,
    /// Completion time.
    #[serde(default)]
    pub ended: Option<DateTime<Utc>>,
}

/// File entry of `/torrents/info/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFileRecord {
    /// File index within the job.
    pub id: u64,
    /// Path of the file inside the job payload.
    pub path: String,
    /// File size in bytes.
    #[serde(default)]
    pub bytes: u64,
    /// `1` when the file was selected for download.
    #[serde(default)]
    pub selected: u8,
}

/// Payload of `/torrents/info/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Summary fields shared with `/torrents`.
    #[serde(flatten)]
    pub torrent: TorrentRecord,
    /// Every file of the job payload.
    #[serde(default)]
    pub files: Vec<TorrentFileRecord>,
}

impl TorrentInfo {
    /// Identifiers of the files that were selected for download.
    #[must_use]
    pub fn selected_file_ids(&self) -> Vec<u64> {
        self.files
            .iter()
            .filter(|file| file.selected == 1)
            .map(|file| file.id)
            .collect()
    }
}

/// Entry of `/downloads`: a previously resolved direct-download link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Download identifier (used by `/downloads/delete/{id}`).
    pub id: String,
    /// Real file name.
    pub filename: String,
    /// Mime type reported by the service.
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    /// File size in bytes.
    #[serde(default)]
    pub filesize: u64,
    /// Original restricted hoster link.
    pub link: String,
    /// Direct download URL.
    pub download: String,
    /// When the direct link was generated.
    #[serde(default)]
    pub generated: Option<DateTime<Utc>>,
}

/// Payload of `/unrestrict/link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrestrictedLink {
    /// Download identifier assigned to the resolution.
    pub id: String,
    /// Real file name.
    pub filename: String,
    /// Mime type reported by the service.
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    /// File size in bytes.
    #[serde(default)]
    pub filesize: u64,
    /// Original restricted hoster link.
    pub link: String,
    /// Direct download URL.
    pub download: String,
}

impl UnrestrictedLink {
    /// Convert into the `/downloads` shape so both sources share one cache.
    #[must_use]
    pub fn into_download(self, generated: DateTime<Utc>) -> DownloadRecord {
        DownloadRecord {
            id: self.id,
            filename: self.filename,
            mime_type: self.mime_type,
            filesize: self.filesize,
            link: self.link,
            download: self.download,
            generated: Some(generated),
        }
    }
}

/// Payload of `/torrents/addMagnet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedTorrent {
    /// Identifier of the newly created job.
    pub id: String,
    /// Resource URI of the new job.
    #[serde(default)]
    pub uri: String,
}

/// Inclusive byte range requested when opening a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset (inclusive); open-ended when absent.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Render as an HTTP `Range` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{end}", self.start),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Magnet URI that re-creates a job from its content hash.
#[must_use]
pub fn magnet_for_hash(hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{hash}")
}

/// Stable leaf identifier of a restricted link (its final path segment).
#[must_use]
pub fn link_leaf(link: &str) -> &str {
    link.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(link)
}
