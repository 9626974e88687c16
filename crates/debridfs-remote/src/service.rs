//! Trait seam between the namespace engine and the remote service.

use async_trait::async_trait;

use crate::error::RemoteResult;
use crate::model::{
    AddedTorrent, ByteRange, ContentStream, DownloadRecord, Page, TorrentInfo, TorrentRecord,
    UnrestrictedLink,
};

/// Operations the namespace engine needs from the remote service.
///
/// Implementations perform exactly one HTTP exchange per call; retries and
/// cancellation are layered on top by the caller.
#[async_trait]
pub trait DebridApi: Send + Sync {
    /// Fetch one page of `/downloads`.
    async fn downloads_page(&self, offset: usize, limit: usize)
    -> RemoteResult<Page<DownloadRecord>>;

    /// Fetch one page of `/torrents`.
    async fn torrents_page(&self, offset: usize, limit: usize) -> RemoteResult<Page<TorrentRecord>>;

    /// Fetch the full details of one job.
    async fn torrent_info(&self, id: &str) -> RemoteResult<TorrentInfo>;

    /// Resolve a restricted link into a direct-download URL.
    async fn unrestrict_link(&self, link: &str) -> RemoteResult<UnrestrictedLink>;

    /// Delete a cached direct-download link.
    async fn delete_download(&self, id: &str) -> RemoteResult<()>;

    /// Create a job from a magnet URI.
    async fn add_magnet(&self, magnet: &str) -> RemoteResult<AddedTorrent>;

    /// Select the files of a job that should be downloaded.
    async fn select_files(&self, id: &str, file_ids: &[u64]) -> RemoteResult<()>;

    /// Delete a job.
    async fn delete_torrent(&self, id: &str) -> RemoteResult<()>;

    /// Open a direct-download URL, optionally starting at a byte range.
    async fn open_link(&self, url: &str, range: Option<ByteRange>) -> RemoteResult<ContentStream>;
}
