//! Lazy direct-link resolution.
//!
//! # Design
//! - The latest inventory snapshot is consulted first; a fresh resolution is
//!   cached back into it.
//! - A broken link (503/404) marks the owning job for recovery on the next
//!   refresh. A job that was already marked surfaces [`NamespaceError::BrokenLink`]
//!   so a dead job cannot loop through recovery forever.

use chrono::Utc;
use debridfs_remote::{
    ByteRange, ContentStream, DebridApi, DownloadRecord, RemoteError, RetryPolicy, cancellable,
    with_retry,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{NamespaceError, NamespaceResult};
use crate::inventory::InventoryFetcher;
use crate::model::FileEntry;
use crate::recovery::BrokenJobs;

/// Resolves restricted links into direct URLs.
#[derive(Clone, Copy)]
pub struct LinkResolver<'a> {
    api: &'a dyn DebridApi,
    fetcher: &'a InventoryFetcher,
    broken: &'a BrokenJobs,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LinkResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkResolver")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<'a> LinkResolver<'a> {
    /// Resolver sharing the engine's remote, inventory, and broken set.
    #[must_use]
    pub const fn new(
        api: &'a dyn DebridApi,
        fetcher: &'a InventoryFetcher,
        broken: &'a BrokenJobs,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            fetcher,
            broken,
            retry,
        }
    }

    /// Direct download for `file`.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::RecoveryScheduled`] or [`NamespaceError::BrokenLink`]
    /// for dead links, and the remote error for anything else.
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        file: &FileEntry,
    ) -> NamespaceResult<DownloadRecord> {
        if let Some(cached) = self
            .fetcher
            .current()
            .download_for(&file.original_link)
            .filter(|download| !download.download.is_empty())
        {
            debug!(mapping_key = %file.mapping_key, "using cached download");
            return Ok(cached.clone());
        }

        let api = self.api;
        let result = with_retry(self.retry, cancel, "unrestrict.link", || {
            api.unrestrict_link(&file.original_link)
        })
        .await;
        match result {
            Ok(link) => {
                let download = link.into_download(Utc::now());
                self.fetcher.remember_download(download.clone());
                debug!(mapping_key = %file.mapping_key, filename = %download.filename, "link resolved");
                Ok(download)
            }
            Err(err) => Err(self.classify(&file.job_id, err)),
        }
    }

    /// Open `url` for reading.
    ///
    /// # Errors
    ///
    /// Same classification as [`LinkResolver::resolve`].
    pub async fn open(
        &self,
        cancel: &CancellationToken,
        job_id: &str,
        url: &str,
        range: Option<ByteRange>,
    ) -> NamespaceResult<ContentStream> {
        cancellable(cancel, "link.open", self.api.open_link(url, range))
            .await
            .map_err(|err| self.classify(job_id, err))
    }

    fn classify(&self, job_id: &str, err: RemoteError) -> NamespaceError {
        if let RemoteError::Cancelled { operation } = err {
            return NamespaceError::Cancelled { operation };
        }
        if !err.is_broken_link() {
            return err.into();
        }
        if self.broken.mark(job_id) {
            warn!(job_id, status = ?err.status(), "link is broken; job scheduled for recovery");
            self.fetcher.invalidate();
            NamespaceError::RecoveryScheduled {
                job_id: job_id.to_string(),
            }
        } else {
            warn!(job_id, status = ?err.status(), "link is broken and job already awaits recovery");
            NamespaceError::BrokenLink {
                job_id: job_id.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Job;
    use debridfs_test_support::{FakeDebrid, FakeTorrent};
    use futures_util::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;

    const FAST: RetryPolicy = RetryPolicy::new(5, Duration::from_millis(1));

    struct Harness {
        fake: Arc<FakeDebrid>,
        fetcher: InventoryFetcher,
        broken: BrokenJobs,
        torrent: FakeTorrent,
    }

    impl Harness {
        async fn new(cached: bool) -> anyhow::Result<Self> {
            let torrent = FakeTorrent::new("T1", "Film.2019", "abcdef0123456789")
                .file(1, "/Film.2019/film.mkv", 100);
            let mut fake = FakeDebrid::new().with_torrent(torrent.clone().build());
            if cached {
                fake = fake.with_download(&torrent.link(1), "film.mkv", 100);
            }
            let fake = Arc::new(fake);
            let fetcher =
                InventoryFetcher::new(fake.clone(), 100, Duration::from_secs(60), FAST);
            fetcher.refresh(&CancellationToken::new(), None, true).await?;
            Ok(Self {
                fake,
                fetcher,
                broken: BrokenJobs::new(),
                torrent,
            })
        }

        fn resolver(&self) -> LinkResolver<'_> {
            LinkResolver::new(self.fake.as_ref(), &self.fetcher, &self.broken, FAST)
        }

        fn file(&self) -> anyhow::Result<FileEntry> {
            let job: Job = self
                .fetcher
                .current()
                .job("T1")
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("job missing"))?;
            Ok(FileEntry::for_link(&job, &self.torrent.link(1)))
        }
    }

    #[tokio::test]
    async fn cached_download_skips_remote() -> anyhow::Result<()> {
        let harness = Harness::new(true).await?;
        let download = harness
            .resolver()
            .resolve(&CancellationToken::new(), &harness.file()?)
            .await?;
        assert_eq!(download.filename, "film.mkv");
        assert_eq!(harness.fake.call_count("unrestrict.link"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn fresh_resolution_is_cached() -> anyhow::Result<()> {
        let harness = Harness::new(false).await?;
        let cancel = CancellationToken::new();
        let file = harness.file()?;
        let first = harness.resolver().resolve(&cancel, &file).await?;
        let second = harness.resolver().resolve(&cancel, &file).await?;
        assert_eq!(first.download, second.download);
        assert_eq!(harness.fake.call_count("unrestrict.link"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn broken_link_schedules_then_surfaces() -> anyhow::Result<()> {
        let harness = Harness::new(false).await?;
        harness.fake.break_link(&harness.torrent.link(1), 503);
        let cancel = CancellationToken::new();
        let file = harness.file()?;

        let first = harness.resolver().resolve(&cancel, &file).await.err();
        assert!(matches!(
            first,
            Some(NamespaceError::RecoveryScheduled { ref job_id }) if job_id == "T1"
        ));
        assert!(harness.broken.contains("T1"));

        let second = harness.resolver().resolve(&cancel, &file).await.err();
        assert!(matches!(second, Some(NamespaceError::BrokenLink { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn open_streams_content() -> anyhow::Result<()> {
        let harness = Harness::new(true).await?;
        let cancel = CancellationToken::new();
        let download = harness.resolver().resolve(&cancel, &harness.file()?).await?;
        let mut stream = harness
            .resolver()
            .open(&cancel, "T1", &download.download, None)
            .await?;
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend(chunk?);
        }
        assert_eq!(String::from_utf8(body)?, "content of film.mkv");

        harness.fake.break_url(&download.download, 404);
        let err = harness
            .resolver()
            .open(&cancel, "T1", &download.download, None)
            .await
            .err();
        assert!(matches!(err, Some(NamespaceError::RecoveryScheduled { .. })));
        Ok(())
    }
}
