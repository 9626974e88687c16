//! Remote inventory fetcher.
//!
//! # Design
//! - Each listing is probed with a single-item page to learn its total count.
//! - A full paginated fetch runs only when the cache is stale (interval elapsed,
//!   rule file changed, forced, or invalidated) or the count moved.
//! - Same-count replacements inside the interval are not detected; callers that
//!   need certainty use a forced refresh.
//! - A failed fetch leaves the previous snapshot and watermarks untouched.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use debridfs_remote::{
    DebridApi, DownloadRecord, Page, RemoteResult, RetryPolicy, TorrentRecord, with_retry,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::NamespaceResult;
use crate::model::Job;

/// Immutable view of the remote inventory.
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    jobs: Vec<Job>,
    downloads: Vec<DownloadRecord>,
    by_link: HashMap<String, usize>,
}

impl InventorySnapshot {
    /// Build a snapshot and index downloads by their original link.
    #[must_use]
    pub fn new(jobs: Vec<Job>, downloads: Vec<DownloadRecord>) -> Self {
        let by_link = downloads
            .iter()
            .enumerate()
            .map(|(index, download)| (download.link.clone(), index))
            .collect();
        Self {
            jobs,
            downloads,
            by_link,
        }
    }

    /// Jobs in remote order.
    #[must_use]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Cached direct-download links.
    #[must_use]
    pub fn downloads(&self) -> &[DownloadRecord] {
        &self.downloads
    }

    /// Cached download resolved from `link`.
    #[must_use]
    pub fn download_for(&self, link: &str) -> Option<&DownloadRecord> {
        self.by_link.get(link).map(|index| &self.downloads[*index])
    }

    /// Job with identifier `id`.
    #[must_use]
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    fn with_jobs(&self, jobs: Vec<Job>) -> Self {
        Self::new(jobs, self.downloads.clone())
    }

    fn with_downloads(&self, downloads: Vec<DownloadRecord>) -> Self {
        Self::new(self.jobs.clone(), downloads)
    }
}

/// Result of a refresh.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// Snapshot now being served.
    pub snapshot: Arc<InventorySnapshot>,
    /// Whether either listing was fetched in full.
    pub refetched: bool,
}

#[derive(Debug, Default)]
struct Watermarks {
    last_checked: Option<Instant>,
    rule_mtime: Option<SystemTime>,
    loaded: bool,
}

/// Paginated, rate-limit-tolerant inventory retrieval.
pub struct InventoryFetcher {
    api: Arc<dyn DebridApi>,
    page_size: usize,
    interval: Duration,
    retry: RetryPolicy,
    gate: tokio::sync::Mutex<()>,
    watermarks: Mutex<Watermarks>,
    snapshot: Mutex<Arc<InventorySnapshot>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InventoryFetcher {
    /// Fetcher over `api`.
    #[must_use]
    pub fn new(
        api: Arc<dyn DebridApi>,
        page_size: usize,
        interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            page_size,
            interval,
            retry,
            gate: tokio::sync::Mutex::new(()),
            watermarks: Mutex::new(Watermarks::default()),
            snapshot: Mutex::new(Arc::new(InventorySnapshot::default())),
        }
    }

    /// Snapshot currently served.
    #[must_use]
    pub fn current(&self) -> Arc<InventorySnapshot> {
        Arc::clone(&lock(&self.snapshot))
    }

    /// Whether at least one refresh has succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        lock(&self.watermarks).loaded
    }

    /// Treat the cache as stale on the next refresh.
    pub fn invalidate(&self) {
        lock(&self.watermarks).last_checked = None;
    }

    /// Swap one job in the served snapshot.
    ///
    /// A listed copy of the replacement is dropped so the job appears once.
    pub fn replace_job(&self, old_id: &str, job: Job) {
        let mut snapshot = lock(&self.snapshot);
        let jobs = snapshot
            .jobs()
            .iter()
            .filter(|existing| existing.id == old_id || existing.id != job.id)
            .map(|existing| {
                if existing.id == old_id {
                    job.clone()
                } else {
                    existing.clone()
                }
            })
            .collect();
        *snapshot = Arc::new(snapshot.with_jobs(jobs));
    }

    /// Drop one job from the served snapshot.
    pub fn remove_job(&self, id: &str) {
        let mut snapshot = lock(&self.snapshot);
        let jobs = snapshot
            .jobs()
            .iter()
            .filter(|job| job.id != id)
            .cloned()
            .collect();
        *snapshot = Arc::new(snapshot.with_jobs(jobs));
    }

    /// Forget cached downloads resolved from any of `links`.
    pub fn evict_downloads(&self, links: &[String]) {
        let mut snapshot = lock(&self.snapshot);
        let downloads = snapshot
            .downloads()
            .iter()
            .filter(|download| !links.contains(&download.link))
            .cloned()
            .collect();
        *snapshot = Arc::new(snapshot.with_downloads(downloads));
    }

    /// Cache a freshly resolved download.
    pub fn remember_download(&self, download: DownloadRecord) {
        let mut snapshot = lock(&self.snapshot);
        let mut downloads: Vec<DownloadRecord> = snapshot
            .downloads()
            .iter()
            .filter(|existing| existing.link != download.link)
            .cloned()
            .collect();
        downloads.push(download);
        *snapshot = Arc::new(snapshot.with_downloads(downloads));
    }

    /// Bring the snapshot up to date.
    ///
    /// `rule_mtime` is the rule file's current modification time; a change since
    /// the last successful refresh makes the cache stale. `force` always refetches.
    ///
    /// # Errors
    ///
    /// Returns the remote failure; the previous snapshot stays in place.
    pub async fn refresh(
        &self,
        cancel: &CancellationToken,
        rule_mtime: Option<SystemTime>,
        force: bool,
    ) -> NamespaceResult<RefreshOutcome> {
        let _gate = self.gate.lock().await;
        let stale = {
            let marks = lock(&self.watermarks);
            force
                || marks.rule_mtime != rule_mtime
                || marks
                    .last_checked
                    .is_none_or(|checked| checked.elapsed() > self.interval)
        };
        let current = self.current();

        let api = Arc::clone(&self.api);
        let downloads = self
            .sync_listing(
                cancel,
                "downloads.list",
                stale,
                current.downloads().len(),
                |offset, limit| {
                    let api = Arc::clone(&api);
                    async move { api.downloads_page(offset, limit).await }
                },
            )
            .await?;
        let torrents = self
            .sync_listing(
                cancel,
                "torrents.list",
                stale,
                current.jobs().len(),
                |offset, limit| {
                    let api = Arc::clone(&api);
                    async move { api.torrents_page(offset, limit).await }
                },
            )
            .await?;

        let refetched = downloads.is_some() || torrents.is_some();
        let snapshot = if refetched {
            let jobs = torrents.map_or_else(
                || current.jobs().to_vec(),
                |records: Vec<TorrentRecord>| records.into_iter().map(Job::from).collect(),
            );
            let downloads = downloads.unwrap_or_else(|| current.downloads().to_vec());
            let snapshot = Arc::new(InventorySnapshot::new(jobs, downloads));
            *lock(&self.snapshot) = Arc::clone(&snapshot);
            snapshot
        } else {
            current
        };

        let mut marks = lock(&self.watermarks);
        marks.last_checked = Some(Instant::now());
        marks.rule_mtime = rule_mtime;
        marks.loaded = true;
        debug!(
            refetched,
            jobs = snapshot.jobs().len(),
            downloads = snapshot.downloads().len(),
            "inventory refreshed"
        );
        Ok(RefreshOutcome {
            snapshot,
            refetched,
        })
    }

    /// Probe a listing and fetch it in full when needed; `None` keeps the cached copy.
    async fn sync_listing<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &'static str,
        stale: bool,
        cached_len: usize,
        fetch_page: F,
    ) -> NamespaceResult<Option<Vec<T>>>
    where
        F: Fn(usize, usize) -> Fut,
        Fut: Future<Output = RemoteResult<Page<T>>>,
    {
        let probe = with_retry(self.retry, cancel, operation, || fetch_page(0, 1)).await?;
        if !stale && probe.total == Some(cached_len) {
            debug!(operation, total = cached_len, "listing unchanged; reusing cache");
            return Ok(None);
        }

        let mut items = probe.items;
        loop {
            if probe.total.is_some_and(|total| items.len() >= total) {
                break;
            }
            let offset = items.len();
            let page = with_retry(self.retry, cancel, operation, || {
                fetch_page(offset, self.page_size)
            })
            .await?;
            let received = page.items.len();
            items.extend(page.items);
            if received == 0 || (probe.total.is_none() && received < self.page_size) {
                break;
            }
        }
        debug!(operation, fetched = items.len(), total = ?probe.total, "listing fetched");
        Ok(Some(items))
    }
}

impl std::fmt::Debug for InventoryFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryFetcher")
            .field("page_size", &self.page_size)
            .field("interval", &self.interval)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use debridfs_test_support::{FakeDebrid, FakeTorrent};

    const FAST: RetryPolicy = RetryPolicy::new(5, Duration::from_millis(1));

    fn remote_with_jobs(count: usize) -> Arc<FakeDebrid> {
        let mut fake = FakeDebrid::new();
        for index in 0..count {
            let torrent = FakeTorrent::new(
                &format!("T{index}"),
                &format!("Job.{index}"),
                &format!("{index:08}hash"),
            )
            .file(1, "/a.mkv", 1);
            fake = fake.with_torrent(torrent.build());
        }
        Arc::new(fake)
    }

    #[tokio::test]
    async fn paginates_until_total_is_reached() -> Result<()> {
        let fake = remote_with_jobs(5);
        let fetcher = InventoryFetcher::new(fake.clone(), 2, Duration::from_secs(900), FAST);
        let outcome = fetcher.refresh(&CancellationToken::new(), None, false).await?;
        assert!(outcome.refetched);
        assert_eq!(outcome.snapshot.jobs().len(), 5);
        let offsets: Vec<String> = fake
            .calls()
            .into_iter()
            .filter(|call| call.operation == "torrents.list")
            .map(|call| call.argument)
            .collect();
        assert_eq!(offsets, vec!["0/1", "1/2", "3/2"]);
        Ok(())
    }

    #[tokio::test]
    async fn unchanged_counts_reuse_cache() -> Result<()> {
        let fake = remote_with_jobs(3);
        let fetcher = InventoryFetcher::new(fake.clone(), 2500, Duration::from_secs(900), FAST);
        let cancel = CancellationToken::new();
        fetcher.refresh(&cancel, None, false).await?;
        let second = fetcher.refresh(&cancel, None, false).await?;
        assert!(!second.refetched);
        assert_eq!(second.snapshot.jobs().len(), 3);

        fetcher.invalidate();
        let third = fetcher.refresh(&cancel, None, false).await?;
        assert!(third.refetched);
        Ok(())
    }

    #[tokio::test]
    async fn rate_limits_are_retried() -> Result<()> {
        let fake = remote_with_jobs(1);
        fake.fail_next("torrents.list", 429, 2);
        let fetcher = InventoryFetcher::new(fake.clone(), 2500, Duration::from_secs(900), FAST);
        let outcome = fetcher.refresh(&CancellationToken::new(), None, false).await?;
        assert_eq!(outcome.snapshot.jobs().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn hard_failure_keeps_previous_snapshot() -> Result<()> {
        let fake = remote_with_jobs(2);
        let fetcher = InventoryFetcher::new(fake.clone(), 2500, Duration::from_secs(900), FAST);
        let cancel = CancellationToken::new();
        fetcher.refresh(&cancel, None, false).await?;
        fake.fail_next("downloads.list", 403, 1);
        let failed = fetcher.refresh(&cancel, None, true).await;
        assert!(failed.is_err());
        assert_eq!(fetcher.current().jobs().len(), 2);
        Ok(())
    }

    #[test]
    fn snapshot_indexes_downloads_by_link() {
        let download = DownloadRecord {
            id: "D1".into(),
            filename: "a.mkv".into(),
            mime_type: None,
            filesize: 1,
            link: "https://real-debrid.com/d/L1".into(),
            download: "https://cdn.example/a.mkv".into(),
            generated: None,
        };
        let snapshot = InventorySnapshot::new(Vec::new(), vec![download]);
        assert!(snapshot.download_for("https://real-debrid.com/d/L1").is_some());
        assert!(snapshot.download_for("https://real-debrid.com/d/L2").is_none());
    }
}
