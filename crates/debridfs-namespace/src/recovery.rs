//! Broken-job tracking and dead-job recovery.
//!
//! # Design
//! - A job is re-created from its content hash, then the original file
//!   selection is re-applied so mapping keys stay stable.
//! - Only one recovery per job runs at a time; a second caller sees the claim
//!   and skips instead of submitting a duplicate job.
//! - The broken set is cleared only after the replacement job exists.
//! - A submitted replacement is remembered until recovery completes; a retry
//!   resumes with it and never submits the magnet again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use debridfs_remote::{
    DebridApi, RemoteError, RetryPolicy, TorrentInfo, TorrentStatus, magnet_for_hash, pause,
    with_retry,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{NamespaceError, NamespaceResult};
use crate::inventory::InventoryFetcher;
use crate::model::Job;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Replacement submitted for a broken job whose recovery has not finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReplacement {
    /// Id of the re-submitted job.
    pub new_id: String,
    /// File ids to select on the replacement.
    pub selection: Vec<u64>,
    /// Whether the selection was already applied.
    pub selected: bool,
}

/// Jobs known to be dead or serving broken links.
#[derive(Debug, Default)]
pub struct BrokenJobs {
    broken: Mutex<BTreeSet<String>>,
    recovering: Mutex<BTreeSet<String>>,
    pending: Mutex<BTreeMap<String, PendingReplacement>>,
}

impl BrokenJobs {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `job_id` broken; returns `false` when it already was.
    pub fn mark(&self, job_id: &str) -> bool {
        lock(&self.broken).insert(job_id.to_string())
    }

    /// Whether `job_id` is marked broken.
    #[must_use]
    pub fn contains(&self, job_id: &str) -> bool {
        lock(&self.broken).contains(job_id)
    }

    /// Forget `job_id` and any replacement recorded for it.
    pub fn clear(&self, job_id: &str) {
        lock(&self.broken).remove(job_id);
        lock(&self.pending).remove(job_id);
    }

    /// Replacement already submitted for `job_id`.
    #[must_use]
    pub fn pending(&self, job_id: &str) -> Option<PendingReplacement> {
        lock(&self.pending).get(job_id).cloned()
    }

    fn record_pending(&self, job_id: &str, pending: PendingReplacement) {
        lock(&self.pending).insert(job_id.to_string(), pending);
    }

    /// Broken job ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        lock(&self.broken).iter().cloned().collect()
    }

    /// Claim the right to recover `job_id`; `None` while another recovery runs.
    #[must_use]
    pub fn claim(&self, job_id: &str) -> Option<RecoveryClaim<'_>> {
        lock(&self.recovering)
            .insert(job_id.to_string())
            .then(|| RecoveryClaim {
                jobs: self,
                job_id: job_id.to_string(),
            })
    }
}

/// Exclusive recovery right for one job, released on drop.
#[derive(Debug)]
pub struct RecoveryClaim<'a> {
    jobs: &'a BrokenJobs,
    job_id: String,
}

impl Drop for RecoveryClaim<'_> {
    fn drop(&mut self) {
        lock(&self.jobs.recovering).remove(&self.job_id);
    }
}

fn step_failed(job: &Job, step: &'static str) -> impl FnOnce(RemoteError) -> NamespaceError {
    let job_id = job.id.clone();
    move |source| match source {
        RemoteError::Cancelled { operation } => NamespaceError::Cancelled { operation },
        source => NamespaceError::RecoveryFailed {
            job_id,
            step,
            source,
        },
    }
}

/// Whether `job` must be re-created before it is placed in the namespace.
#[must_use]
pub fn needs_recovery(job: &Job, broken: &BrokenJobs) -> bool {
    job.status.is_failed() || broken.contains(&job.id)
}

/// Re-creates dead jobs.
#[derive(Clone, Copy)]
pub struct Recovery<'a> {
    api: &'a dyn DebridApi,
    fetcher: &'a InventoryFetcher,
    broken: &'a BrokenJobs,
    retry: RetryPolicy,
    poll: RetryPolicy,
}

impl std::fmt::Debug for Recovery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recovery")
            .field("retry", &self.retry)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl<'a> Recovery<'a> {
    /// Recovery over `api`, evicting stale downloads from `fetcher` and
    /// recording submitted replacements in `broken`.
    #[must_use]
    pub const fn new(
        api: &'a dyn DebridApi,
        fetcher: &'a InventoryFetcher,
        broken: &'a BrokenJobs,
        retry: RetryPolicy,
        poll: RetryPolicy,
    ) -> Self {
        Self {
            api,
            fetcher,
            broken,
            retry,
            poll,
        }
    }

    /// Re-create `job` and return its replacement.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::RecoveryFailed`] naming the failed step, or
    /// [`NamespaceError::Cancelled`].
    pub async fn recover(&self, cancel: &CancellationToken, job: &Job) -> NamespaceResult<Job> {
        info!(job_id = %job.id, name = %job.name, status = %job.status, "recovering job");
        let api = self.api;
        let failed = |step: &'static str| step_failed(job, step);

        let (mut pending, resumed) = match self.broken.pending(&job.id) {
            Some(pending) => {
                debug!(job_id = %job.id, new_id = %pending.new_id, "resuming recovery");
                (pending, true)
            }
            None => (self.submit(cancel, job).await?, false),
        };

        if !pending.selected {
            let info = self
                .await_selection(cancel, &pending.new_id)
                .await
                .map_err(failed("poll"))?;
            if info.torrent.status == TorrentStatus::WaitingFilesSelection || !resumed {
                with_retry(self.retry, cancel, "torrents.select_files", || {
                    api.select_files(&pending.new_id, &pending.selection)
                })
                .await
                .map_err(failed("select_files"))?;
            }
            pending.selected = true;
            self.broken.record_pending(&job.id, pending.clone());
        }

        match with_retry(self.retry, cancel, "torrents.delete", || {
            api.delete_torrent(&job.id)
        })
        .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(job_id = %job.id, "old job already gone");
            }
            Err(err) => return Err(failed("delete")(err)),
        }

        let replacement = with_retry(self.retry, cancel, "torrents.info", || {
            api.torrent_info(&pending.new_id)
        })
        .await
        .map_err(failed("info"))?;
        info!(
            job_id = %job.id,
            new_id = %replacement.torrent.id,
            status = %replacement.torrent.status,
            "job recovered"
        );
        Ok(Job::from(replacement))
    }

    /// Read the old selection, drop cached links, and submit the magnet once.
    async fn submit(
        &self,
        cancel: &CancellationToken,
        job: &Job,
    ) -> NamespaceResult<PendingReplacement> {
        let api = self.api;
        let old = with_retry(self.retry, cancel, "torrents.info", || api.torrent_info(&job.id))
            .await
            .map_err(step_failed(job, "info"))?;
        let mut selection = old.selected_file_ids();
        if selection.is_empty() {
            selection = old.files.iter().map(|file| file.id).collect();
        }

        self.drop_cached_downloads(cancel, job).await?;

        let magnet = magnet_for_hash(&old.torrent.hash);
        let added = with_retry(self.retry, cancel, "torrents.add_magnet", || {
            api.add_magnet(&magnet)
        })
        .await
        .map_err(step_failed(job, "add_magnet"))?;
        debug!(job_id = %job.id, new_id = %added.id, "job re-submitted");
        let pending = PendingReplacement {
            new_id: added.id,
            selection,
            selected: false,
        };
        self.broken.record_pending(&job.id, pending.clone());
        Ok(pending)
    }

    async fn drop_cached_downloads(
        &self,
        cancel: &CancellationToken,
        job: &Job,
    ) -> NamespaceResult<()> {
        let snapshot = self.fetcher.current();
        let stale: Vec<_> = snapshot
            .downloads()
            .iter()
            .filter(|download| job.links.contains(&download.link))
            .collect();
        for download in &stale {
            let api = self.api;
            let result = with_retry(self.retry, cancel, "downloads.delete", || {
                api.delete_download(&download.id)
            })
            .await;
            match result {
                Ok(()) => {}
                Err(RemoteError::Cancelled { operation }) => {
                    return Err(NamespaceError::Cancelled { operation });
                }
                Err(err) => {
                    warn!(download_id = %download.id, error = %err, "failed to delete cached download");
                }
            }
        }
        self.fetcher.evict_downloads(&job.links);
        Ok(())
    }

    /// Poll until the new job asks for a file selection; proceeds once the policy is exhausted.
    async fn await_selection(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<TorrentInfo, RemoteError> {
        let attempts = self.poll.attempts.max(1);
        let mut attempt = 1;
        loop {
            let info = with_retry(self.retry, cancel, "torrents.info", || {
                self.api.torrent_info(id)
            })
            .await?;
            if info.torrent.status == TorrentStatus::WaitingFilesSelection || attempt >= attempts {
                return Ok(info);
            }
            debug!(new_id = %id, attempt, status = %info.torrent.status, "waiting for file selection");
            pause(cancel, "torrents.poll", self.poll.delay).await?;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debridfs_test_support::{FakeDebrid, FakeTorrent};
    use std::sync::Arc;
    use std::time::Duration;

    const FAST: RetryPolicy = RetryPolicy::new(5, Duration::from_millis(1));

    fn dead_torrent() -> FakeTorrent {
        FakeTorrent::new("T1", "Film.2019", "abcdef0123456789")
            .file(1, "/Film.2019/film.mkv", 100)
            .unselected_file(2, "/Film.2019/sample.mkv", 5)
            .file(3, "/Film.2019/film.srt", 1)
            .status(TorrentStatus::Dead)
    }

    #[test]
    fn claims_are_exclusive_until_dropped() {
        let broken = BrokenJobs::new();
        assert!(broken.mark("T1"));
        assert!(!broken.mark("T1"));
        let claim = broken.claim("T1");
        assert!(claim.is_some());
        assert!(broken.claim("T1").is_none());
        drop(claim);
        assert!(broken.claim("T1").is_some());
    }

    #[tokio::test]
    async fn dead_job_is_recreated_with_same_selection() -> anyhow::Result<()> {
        let torrent = dead_torrent();
        let fake = Arc::new(
            FakeDebrid::new()
                .with_torrent(torrent.clone().build())
                .with_download(&torrent.link(1), "film.mkv", 100),
        );
        let api: Arc<dyn DebridApi> = fake.clone();
        let fetcher = InventoryFetcher::new(Arc::clone(&api), 100, Duration::from_secs(60), FAST);
        let cancel = CancellationToken::new();
        fetcher.refresh(&cancel, None, true).await?;
        let job = fetcher
            .current()
            .job("T1")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("job missing"))?;

        let broken = BrokenJobs::new();
        let recovered = Recovery::new(api.as_ref(), &fetcher, &broken, FAST, FAST)
            .recover(&cancel, &job)
            .await?;

        assert_ne!(recovered.id, "T1");
        assert_eq!(recovered.status, TorrentStatus::Downloaded);
        assert_eq!(recovered.hash, job.hash);
        assert_eq!(recovered.links, job.links);
        assert!(fake.torrent("T1").is_none());
        assert_eq!(fake.call_count("downloads.delete"), 1);
        assert!(fetcher.current().download_for(&torrent.link(1)).is_none());
        let selection = fake
            .calls()
            .into_iter()
            .find(|call| call.operation == "torrents.select_files")
            .map(|call| call.argument);
        assert_eq!(selection, Some(format!("{}:1,3", recovered.id)));
        Ok(())
    }

    #[tokio::test]
    async fn failed_step_is_reported() -> anyhow::Result<()> {
        let torrent = dead_torrent();
        let fake = Arc::new(FakeDebrid::new().with_torrent(torrent.build()));
        fake.fail_next("torrents.add_magnet", 400, 1);
        let api: Arc<dyn DebridApi> = fake.clone();
        let fetcher = InventoryFetcher::new(Arc::clone(&api), 100, Duration::from_secs(60), FAST);
        let cancel = CancellationToken::new();
        fetcher.refresh(&cancel, None, true).await?;
        let job = fetcher
            .current()
            .job("T1")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("job missing"))?;

        let broken = BrokenJobs::new();
        let err = Recovery::new(api.as_ref(), &fetcher, &broken, FAST, FAST)
            .recover(&cancel, &job)
            .await
            .err();
        assert!(matches!(
            err,
            Some(NamespaceError::RecoveryFailed { step: "add_magnet", .. })
        ));
        assert!(fake.torrent("T1").is_some());
        assert!(broken.pending("T1").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn retry_after_late_failure_reuses_the_replacement() -> anyhow::Result<()> {
        let torrent = dead_torrent();
        let fake = Arc::new(FakeDebrid::new().with_torrent(torrent.build()));
        fake.fail_next("torrents.delete", 403, 1);
        let api: Arc<dyn DebridApi> = fake.clone();
        let fetcher = InventoryFetcher::new(Arc::clone(&api), 100, Duration::from_secs(60), FAST);
        let cancel = CancellationToken::new();
        fetcher.refresh(&cancel, None, true).await?;
        let job = fetcher
            .current()
            .job("T1")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("job missing"))?;
        let broken = BrokenJobs::new();
        let recovery = Recovery::new(api.as_ref(), &fetcher, &broken, FAST, FAST);

        let first = recovery.recover(&cancel, &job).await.err();
        assert!(matches!(
            first,
            Some(NamespaceError::RecoveryFailed { step: "delete", .. })
        ));
        let pending = broken
            .pending("T1")
            .ok_or_else(|| anyhow::anyhow!("replacement not recorded"))?;
        assert!(pending.selected);

        let recovered = recovery.recover(&cancel, &job).await?;
        assert_eq!(recovered.id, pending.new_id);
        assert_eq!(recovered.status, TorrentStatus::Downloaded);
        assert_eq!(fake.call_count("torrents.add_magnet"), 1);
        assert_eq!(fake.call_count("torrents.select_files"), 1);
        assert_eq!(fake.torrents().len(), 1);
        assert!(fake.torrent("T1").is_none());
        Ok(())
    }
}
