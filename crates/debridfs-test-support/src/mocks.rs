//! In-memory remote service.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use debridfs_remote::{
    AddedTorrent, ApiProblem, ByteRange, ContentStream, DebridApi, DownloadRecord, Page,
    RemoteError, RemoteResult, TorrentInfo, TorrentRecord, TorrentStatus, UnrestrictedLink,
};
use futures_util::stream;

use crate::fixtures::link_for;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    /// Operation identifier, matching the production client.
    pub operation: &'static str,
    /// Main argument (id, link, offset/limit).
    pub argument: String,
}

#[derive(Default)]
struct FakeState {
    torrents: Vec<TorrentInfo>,
    downloads: Vec<DownloadRecord>,
    calls: Vec<FakeCall>,
    queued_failures: HashMap<&'static str, VecDeque<u16>>,
    broken_links: HashMap<String, u16>,
    broken_urls: HashMap<String, u16>,
    next_id: u64,
}

/// `DebridApi` backed by in-memory jobs and downloads.
///
/// Re-created jobs reuse content-addressed links, selecting files marks a job
/// downloaded, and failures can be queued per operation or pinned to a link.
#[derive(Default)]
pub struct FakeDebrid {
    state: Mutex<FakeState>,
}

fn problem(operation: &'static str, status: u16, message: &str) -> RemoteError {
    RemoteError::status_error(
        operation,
        ApiProblem {
            message: message.to_string(),
            status,
        },
    )
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

impl FakeDebrid {
    /// Empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a job.
    #[must_use]
    pub fn with_torrent(self, torrent: TorrentInfo) -> Self {
        self.state().torrents.push(torrent);
        self
    }

    /// Add a cached download for `link`, as if it had been unrestricted before.
    #[must_use]
    pub fn with_download(self, link: &str, filename: &str, size: u64) -> Self {
        {
            let mut state = self.state();
            state.next_id += 1;
            let id = format!("D{}", state.next_id);
            state.downloads.push(DownloadRecord {
                download: format!("https://download.fake/{id}/{filename}"),
                id,
                filename: filename.to_string(),
                mime_type: Some("video/x-matroska".to_string()),
                filesize: size,
                link: link.to_string(),
                generated: Some(Utc::now()),
            });
        }
        self
    }

    /// Fail the next `times` calls of `operation` with `status`.
    pub fn fail_next(&self, operation: &'static str, status: u16, times: usize) {
        let mut state = self.state();
        let queue = state.queued_failures.entry(operation).or_default();
        queue.extend(std::iter::repeat_n(status, times));
    }

    /// Fail every resolution of `link` with `status`.
    pub fn break_link(&self, link: &str, status: u16) {
        self.state().broken_links.insert(link.to_string(), status);
    }

    /// Fail every read of the direct URL `url` with `status`.
    pub fn break_url(&self, url: &str, status: u16) {
        self.state().broken_urls.insert(url.to_string(), status);
    }

    /// Recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<FakeCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls of `operation`.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Current jobs.
    #[must_use]
    pub fn torrents(&self) -> Vec<TorrentInfo> {
        self.state().torrents.clone()
    }

    /// Current cached downloads.
    #[must_use]
    pub fn downloads(&self) -> Vec<DownloadRecord> {
        self.state().downloads.clone()
    }

    /// Job with `id`, if it exists.
    #[must_use]
    pub fn torrent(&self, id: &str) -> Option<TorrentInfo> {
        self.state()
            .torrents
            .iter()
            .find(|torrent| torrent.torrent.id == id)
            .cloned()
    }

    /// Replace or insert a job after construction.
    pub fn put_torrent(&self, torrent: TorrentInfo) {
        let mut state = self.state();
        state
            .torrents
            .retain(|existing| existing.torrent.id != torrent.torrent.id);
        state.torrents.push(torrent);
    }

    fn record(&self, operation: &'static str, argument: String) -> RemoteResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        state.calls.push(FakeCall {
            operation,
            argument,
        });
        if let Some(status) = state
            .queued_failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(problem(operation, status, "injected failure"));
        }
        Ok(state)
    }
}

fn page_of<T: Clone>(items: &[T], offset: usize, limit: usize) -> Page<T> {
    Page {
        items: items.iter().skip(offset).take(limit).cloned().collect(),
        total: Some(items.len()),
    }
}

#[async_trait]
impl DebridApi for FakeDebrid {
    async fn downloads_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> RemoteResult<Page<DownloadRecord>> {
        let state = self.record("downloads.list", format!("{offset}/{limit}"))?;
        Ok(page_of(&state.downloads, offset, limit))
    }

    async fn torrents_page(&self, offset: usize, limit: usize) -> RemoteResult<Page<TorrentRecord>> {
        let state = self.record("torrents.list", format!("{offset}/{limit}"))?;
        let records: Vec<TorrentRecord> = state
            .torrents
            .iter()
            .map(|info| info.torrent.clone())
            .collect();
        Ok(page_of(&records, offset, limit))
    }

    async fn torrent_info(&self, id: &str) -> RemoteResult<TorrentInfo> {
        let state = self.record("torrents.info", id.to_string())?;
        state
            .torrents
            .iter()
            .find(|torrent| torrent.torrent.id == id)
            .cloned()
            .ok_or_else(|| problem("torrents.info", 404, "unknown_ressource"))
    }

    async fn unrestrict_link(&self, link: &str) -> RemoteResult<UnrestrictedLink> {
        let mut state = self.record("unrestrict.link", link.to_string())?;
        if let Some(status) = state.broken_links.get(link).copied() {
            return Err(problem("unrestrict.link", status, "hoster_unavailable"));
        }
        let (filename, filesize) = state
            .torrents
            .iter()
            .flat_map(|torrent| {
                torrent
                    .files
                    .iter()
                    .map(move |file| (link_for(&torrent.torrent.hash, file.id), file))
            })
            .find(|(candidate, _)| candidate == link)
            .map(|(_, file)| (file_name(&file.path), file.bytes))
            .ok_or_else(|| problem("unrestrict.link", 404, "unknown_ressource"))?;
        state.next_id += 1;
        let id = format!("D{}", state.next_id);
        let record = DownloadRecord {
            download: format!("https://download.fake/{id}/{filename}"),
            id: id.clone(),
            filename: filename.clone(),
            mime_type: Some("video/x-matroska".to_string()),
            filesize,
            link: link.to_string(),
            generated: Some(Utc::now()),
        };
        state.downloads.push(record.clone());
        Ok(UnrestrictedLink {
            id,
            filename,
            mime_type: record.mime_type,
            filesize,
            link: record.link,
            download: record.download,
        })
    }

    async fn delete_download(&self, id: &str) -> RemoteResult<()> {
        let mut state = self.record("downloads.delete", id.to_string())?;
        state.downloads.retain(|download| download.id != id);
        Ok(())
    }

    async fn add_magnet(&self, magnet: &str) -> RemoteResult<AddedTorrent> {
        let mut state = self.record("torrents.add_magnet", magnet.to_string())?;
        let hash = magnet.rsplit(':').next().unwrap_or_default().to_string();
        let template = state
            .torrents
            .iter()
            .find(|torrent| torrent.torrent.hash == hash)
            .cloned()
            .ok_or_else(|| problem("torrents.add_magnet", 400, "invalid_magnet"))?;
        state.next_id += 1;
        let id = format!("R{}", state.next_id);
        let mut info = template;
        info.torrent.id.clone_from(&id);
        info.torrent.status = TorrentStatus::WaitingFilesSelection;
        info.torrent.links.clear();
        info.torrent.ended = None;
        info.torrent.added = Some(Utc::now());
        for file in &mut info.files {
            file.selected = 0;
        }
        state.torrents.push(info);
        Ok(AddedTorrent {
            uri: format!("https://api.real-debrid.com/rest/1.0/torrents/info/{id}"),
            id,
        })
    }

    async fn select_files(&self, id: &str, file_ids: &[u64]) -> RemoteResult<()> {
        let joined = file_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut state = self.record("torrents.select_files", format!("{id}:{joined}"))?;
        let torrent = state
            .torrents
            .iter_mut()
            .find(|torrent| torrent.torrent.id == id)
            .ok_or_else(|| problem("torrents.select_files", 404, "unknown_ressource"))?;
        if torrent.torrent.status != TorrentStatus::WaitingFilesSelection {
            return Err(problem("torrents.select_files", 400, "action_already_done"));
        }
        let hash = torrent.torrent.hash.clone();
        let mut links = Vec::new();
        for file in &mut torrent.files {
            if file_ids.contains(&file.id) {
                file.selected = 1;
                links.push(link_for(&hash, file.id));
            }
        }
        torrent.torrent.links = links;
        torrent.torrent.status = TorrentStatus::Downloaded;
        torrent.torrent.ended = Some(Utc::now());
        Ok(())
    }

    async fn delete_torrent(&self, id: &str) -> RemoteResult<()> {
        let mut state = self.record("torrents.delete", id.to_string())?;
        let before = state.torrents.len();
        state.torrents.retain(|torrent| torrent.torrent.id != id);
        if state.torrents.len() == before {
            return Err(problem("torrents.delete", 404, "unknown_ressource"));
        }
        Ok(())
    }

    async fn open_link(&self, url: &str, range: Option<ByteRange>) -> RemoteResult<ContentStream> {
        let state = self.record("link.open", url.to_string())?;
        if let Some(status) = state.broken_urls.get(url).copied() {
            return Err(problem("link.open", status, "link is dead"));
        }
        let download = state
            .downloads
            .iter()
            .find(|download| download.download == url)
            .ok_or_else(|| problem("link.open", 404, "not found"))?;
        let body = format!("content of {}", download.filename).into_bytes();
        let start = range.map_or(0, |range| usize::try_from(range.start).unwrap_or(usize::MAX));
        let end = range
            .and_then(|range| range.end)
            .map_or(body.len(), |end| {
                usize::try_from(end).map_or(body.len(), |end| (end + 1).min(body.len()))
            });
        let chunk = body.get(start.min(end)..end).unwrap_or_default().to_vec();
        Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FakeTorrent;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn recreated_job_keeps_links() -> RemoteResult<()> {
        let dead = FakeTorrent::new("T1", "Film.2019", "abcdef0123456789")
            .file(1, "/film.mkv", 10)
            .unselected_file(2, "/film.nfo", 1)
            .status(TorrentStatus::Dead);
        let original_link = dead.link(1);
        let fake = FakeDebrid::new().with_torrent(dead.build());

        let added = fake.add_magnet("magnet:?xt=urn:btih:abcdef0123456789").await?;
        assert_eq!(
            fake.torrent_info(&added.id).await?.torrent.status,
            TorrentStatus::WaitingFilesSelection
        );
        fake.select_files(&added.id, &[1]).await?;
        let info = fake.torrent_info(&added.id).await?;
        assert_eq!(info.torrent.status, TorrentStatus::Downloaded);
        assert_eq!(info.torrent.links, vec![original_link]);
        assert_eq!(fake.call_count("torrents.info"), 2);
        Ok(())
    }

    #[tokio::test]
    async fn queued_failures_are_consumed() -> RemoteResult<()> {
        let fake = FakeDebrid::new();
        fake.fail_next("torrents.list", 429, 1);
        let first = fake.torrents_page(0, 1).await;
        assert!(first.is_err_and(|err| err.is_retryable()));
        let page = fake.torrents_page(0, 1).await?;
        assert_eq!(page.total, Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn open_link_honours_range() -> RemoteResult<()> {
        let torrent = FakeTorrent::new("T1", "Film.2019", "abcdef0123456789").file(1, "/a.mkv", 10);
        let link = torrent.link(1);
        let fake = FakeDebrid::new().with_torrent(torrent.build());
        let resolved = fake.unrestrict_link(&link).await?;
        let mut stream = fake
            .open_link(&resolved.download, Some(ByteRange { start: 11, end: None }))
            .await?;
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend(chunk?);
        }
        assert_eq!(body, b"a.mkv");
        Ok(())
    }
}
