//! Namespace engine: the host-facing surface over the builder, resolver, and mover.
//!
//! # Design
//! - One engine instance owns every piece of shared state; nothing is global.
//! - `rebuild` serializes table rebuilds; `move_gate` serializes structural edits
//!   end-to-end. A structural edit holds `move_gate` and then `rebuild` across its
//!   rule rewrite and table patch, so a rebuild never installs rules read before
//!   the edit. Never take them in the reverse order.
//! - While `moving` is set, freshness checks serve the current tables instead of
//!   rebuilding underneath the edit.
//! - A failed inventory fetch keeps serving the previous snapshot once one exists.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use debridfs_remote::{ByteRange, ContentStream, DebridApi, DownloadRecord, with_retry};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::builder::build;
use crate::config::{InvalidRegexPolicy, NamespaceConfig};
use crate::dircache::{DirectoryCache, LeafResolver, PathDirCache};
use crate::error::{NamespaceError, NamespaceResult};
use crate::inventory::InventoryFetcher;
use crate::model::{Entry, FileEntry, Job};
use crate::mover::Mover;
use crate::object::Object;
use crate::path::{NormalizedPath, split_object_path};
use crate::recovery::{BrokenJobs, Recovery, needs_recovery};
use crate::resolver::LinkResolver;
use crate::rules::{ParsedRules, RuleWarning};
use crate::store::RuleStore;
use crate::tables::{NamespaceSnapshot, NamespaceTables};

/// Outcome of a namespace rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Jobs in the served inventory.
    pub jobs: usize,
    /// Visible files.
    pub files: usize,
    /// Known folders, root included.
    pub folders: usize,
    /// Mapping keys inserted, changed, or removed.
    pub mapping_changes: usize,
    /// Whether the inventory was refetched from the remote.
    pub refetched: bool,
    /// Ids of jobs re-created during the rebuild.
    pub recovered: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetch {
    Skip,
    Auto,
    Force,
}

#[derive(Debug, Default)]
struct RebuildState {
    built: bool,
    rules_mtime: Option<SystemTime>,
    last_rule_check: Option<Instant>,
    last_build: Option<Instant>,
}

struct MoveGuard<'a> {
    moving: &'a AtomicBool,
    state: MutexGuard<'a, RebuildState>,
    _gate: MutexGuard<'a, ()>,
}

impl Drop for MoveGuard<'_> {
    fn drop(&mut self) {
        self.moving.store(false, Ordering::Release);
    }
}

/// Virtual namespace over a flat remote inventory.
pub struct NamespaceEngine {
    config: NamespaceConfig,
    api: Arc<dyn DebridApi>,
    store: RuleStore,
    fetcher: InventoryFetcher,
    tables: NamespaceTables,
    broken: BrokenJobs,
    dircache: Arc<dyn DirectoryCache>,
    rebuild: Mutex<RebuildState>,
    move_gate: Mutex<()>,
    moving: AtomicBool,
}

impl std::fmt::Debug for NamespaceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceEngine")
            .field("config", &self.config)
            .field("fetcher", &self.fetcher)
            .field("moving", &self.moving.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl NamespaceEngine {
    /// Engine with an in-memory directory cache.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::InvalidInput`] when the configuration is invalid.
    pub fn new(config: NamespaceConfig, api: Arc<dyn DebridApi>) -> NamespaceResult<Self> {
        let dircache = Arc::new(PathDirCache::new(config.root.clone()));
        Self::with_dir_cache(config, api, dircache)
    }

    /// Engine using the host's directory cache.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::InvalidInput`] when the configuration is invalid.
    pub fn with_dir_cache(
        config: NamespaceConfig,
        api: Arc<dyn DebridApi>,
        dircache: Arc<dyn DirectoryCache>,
    ) -> NamespaceResult<Self> {
        config.validate()?;
        let fetcher = InventoryFetcher::new(
            Arc::clone(&api),
            config.page_size,
            config.refresh_interval,
            config.retry,
        );
        Ok(Self {
            store: RuleStore::new(config.rule_file.clone()),
            fetcher,
            tables: NamespaceTables::new(),
            broken: BrokenJobs::new(),
            dircache,
            rebuild: Mutex::new(RebuildState::default()),
            move_gate: Mutex::new(()),
            moving: AtomicBool::new(false),
            config,
            api,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &NamespaceConfig {
        &self.config
    }

    /// Ids of jobs awaiting recovery.
    #[must_use]
    pub fn broken_jobs(&self) -> Vec<String> {
        self.broken.ids()
    }

    /// Copy of the mapping and folder tables.
    #[must_use]
    pub fn snapshot(&self) -> NamespaceSnapshot {
        self.tables.snapshot()
    }

    /// Children of the folder `dir` (relative to the root).
    ///
    /// A folder absent from the tables lists as empty when the directory cache
    /// can still resolve it.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::DirNotFound`] when the folder does not exist.
    pub async fn list(&self, cancel: &CancellationToken, dir: &str) -> NamespaceResult<Vec<Entry>> {
        let path = self.dir_path(dir);
        self.ensure_fresh(cancel, &path).await?;
        if let Some(children) = self.tables.children(&path) {
            return Ok(children);
        }
        let id = self.dircache.find_dir(cancel, self, &path, false).await?;
        Ok(self
            .tables
            .children(&NormalizedPath::dir(&id))
            .unwrap_or_default())
    }

    /// File at `remote` (relative to the root).
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NotFound`], or [`NamespaceError::NotAFile`] for a folder.
    pub async fn new_object(&self, cancel: &CancellationToken, remote: &str) -> NamespaceResult<Object> {
        let (dir, leaf) = split_object_path(&self.config.root, remote);
        self.ensure_fresh(cancel, &dir).await?;
        self.object_at(&dir, &leaf)
    }

    /// Create the folder `dir` and any missing parents; returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::RootReserved`] for a folder directly under the root.
    pub async fn mkdir(&self, cancel: &CancellationToken, dir: &str) -> NamespaceResult<String> {
        let path = self.dir_path(dir);
        self.ensure_built(cancel).await?;
        let _guard = self.begin_move().await;
        self.dircache.find_dir(cancel, self, &path, true).await
    }

    /// Move or rename a file to `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NotFound`] when the source vanished, or
    /// [`NamespaceError::InvalidInput`] when the destination name is taken.
    pub async fn move_object(
        &self,
        cancel: &CancellationToken,
        source: &Object,
        remote: &str,
    ) -> NamespaceResult<Object> {
        let (dir, leaf) = split_object_path(&self.config.root, remote);
        if leaf.is_empty() {
            return Err(NamespaceError::InvalidInput {
                field: "destination",
                reason: "destination must name a file",
                value: Some(remote.to_string()),
            });
        }
        self.ensure_built(cancel).await?;
        let _guard = self.begin_move().await;
        let file = self
            .tables
            .file(source.mapping_key())
            .ok_or_else(|| NamespaceError::NotFound {
                path: source.remote().to_string(),
            })?;
        if let Some(existing) = self.tables.child(&dir, &leaf) {
            let same = existing
                .as_file()
                .is_some_and(|other| other.mapping_key == file.mapping_key);
            if !same {
                return Err(NamespaceError::InvalidInput {
                    field: "destination",
                    reason: "an entry with that name already exists",
                    value: Some(dir.file(&leaf)),
                });
            }
        }
        let (folder, placed) = self.mover().move_file(&file, &dir, &leaf).await?;
        Ok(Object::new(&self.config.root, folder, placed))
    }

    /// Move the folder `source` to `destination` (both relative to the root).
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::DirNotFound`], [`NamespaceError::DirExists`], or
    /// [`NamespaceError::InvalidInput`] for the root or a move into itself.
    pub async fn dir_move(
        &self,
        cancel: &CancellationToken,
        source: &str,
        destination: &str,
    ) -> NamespaceResult<()> {
        let from = self.dir_path(source);
        let to = self.dir_path(destination);
        if from.is_root() || to.is_root() {
            return Err(NamespaceError::InvalidInput {
                field: "path",
                reason: "the root cannot be moved or replaced",
                value: None,
            });
        }
        if to.starts_with(&from) {
            return Err(NamespaceError::InvalidInput {
                field: "destination",
                reason: "a folder cannot move into itself",
                value: Some(to.to_string()),
            });
        }
        self.ensure_built(cancel).await?;
        let mut guard = self.begin_move().await;
        if !self.tables.folder_exists(&from) {
            return Err(NamespaceError::DirNotFound {
                path: from.to_string(),
            });
        }
        if self.tables.folder_exists(&to) {
            return Err(NamespaceError::DirExists {
                path: to.to_string(),
            });
        }
        self.mover().move_folder(&from, &to).await?;
        self.dircache.flush_dir(&from);
        self.rebuild_locked(&mut guard.state, cancel, Fetch::Skip).await?;
        Ok(())
    }

    /// Remove the empty folder `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::DirectoryNotEmpty`] or [`NamespaceError::DirNotFound`].
    pub async fn rmdir(&self, cancel: &CancellationToken, dir: &str) -> NamespaceResult<()> {
        let path = self.dir_path(dir);
        if path.is_root() {
            return Err(NamespaceError::InvalidInput {
                field: "path",
                reason: "the root cannot be removed",
                value: None,
            });
        }
        self.ensure_fresh(cancel, &path).await?;
        let _guard = self.begin_move().await;
        match self.tables.children(&path) {
            None => {
                return Err(NamespaceError::DirNotFound {
                    path: path.to_string(),
                });
            }
            Some(children) if !children.is_empty() => {
                return Err(NamespaceError::DirectoryNotEmpty {
                    path: path.to_string(),
                });
            }
            Some(_) => {}
        }
        self.mover().remove_folder(&path).await?;
        self.dircache.flush_dir(&path);
        Ok(())
    }

    /// Trash every file below `dir` and drop the folders declaring it.
    ///
    /// Returns how many files were trashed.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::DirNotFound`], or [`NamespaceError::InvalidInput`]
    /// for the root.
    pub async fn purge(&self, cancel: &CancellationToken, dir: &str) -> NamespaceResult<usize> {
        let path = self.dir_path(dir);
        if path.is_root() {
            return Err(NamespaceError::InvalidInput {
                field: "path",
                reason: "the root cannot be purged",
                value: None,
            });
        }
        self.ensure_fresh(cancel, &path).await?;
        let mut guard = self.begin_move().await;
        if !self.tables.folder_exists(&path) {
            return Err(NamespaceError::DirNotFound {
                path: path.to_string(),
            });
        }
        let files = self.tables.files_under(&path);
        for (folder, file) in &files {
            self.trash_file(cancel, folder, file).await?;
        }
        let mut folders: Vec<NormalizedPath> = self
            .tables
            .snapshot()
            .folders
            .into_keys()
            .filter(|folder| folder.starts_with(&path))
            .collect();
        folders.sort_by_key(|folder| std::cmp::Reverse(folder.depth()));
        let mover = self.mover();
        for folder in &folders {
            mover.remove_folder(folder).await?;
        }
        self.dircache.flush_dir(&path);
        self.rebuild_locked(&mut guard.state, cancel, Fetch::Skip).await?;
        info!(path = %path, files = files.len(), "folder purged");
        Ok(files.len())
    }

    /// Direct download URL for the file at `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::CantShareDirectories`] for a folder.
    pub async fn public_link(&self, cancel: &CancellationToken, remote: &str) -> NamespaceResult<String> {
        let path = self.dir_path(remote);
        self.ensure_built(cancel).await?;
        if path.is_root() || self.tables.folder_exists(&path) {
            return Err(NamespaceError::CantShareDirectories {
                path: path.to_string(),
            });
        }
        let object = self.new_object(cancel, remote).await?;
        let resolved = self.resolve(cancel, &object).await?;
        resolved
            .url()
            .map(str::to_string)
            .ok_or_else(|| NamespaceError::NoDownloadLink {
                path: object.remote().to_string(),
            })
    }

    /// Trash a file; deletes its job once every sibling is trashed too.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::NotFound`] when the file is no longer visible.
    pub async fn remove(&self, cancel: &CancellationToken, object: &Object) -> NamespaceResult<()> {
        self.ensure_built(cancel).await?;
        let mut guard = self.begin_move().await;
        let key = object.mapping_key();
        let not_found = || NamespaceError::NotFound {
            path: object.remote().to_string(),
        };
        let file = self.tables.file(key).ok_or_else(not_found)?;
        let folder = self.tables.placement(key).ok_or_else(not_found)?;
        if self.trash_file(cancel, &folder, &file).await? {
            self.rebuild_locked(&mut guard.state, cancel, Fetch::Skip).await?;
        }
        Ok(())
    }

    /// Resolve the direct link of `object` and record it in the tables.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::RecoveryScheduled`] or [`NamespaceError::BrokenLink`]
    /// for dead links.
    pub async fn resolve(&self, cancel: &CancellationToken, object: &Object) -> NamespaceResult<Object> {
        let download = self.resolver().resolve(cancel, object.entry()).await?;
        let file = self
            .tables
            .apply_download(object.mapping_key(), &download)
            .unwrap_or_else(|| with_download(object.entry(), &download));
        Ok(Object::new(&self.config.root, object.folder().clone(), file))
    }

    /// Stream the content of `object`.
    ///
    /// # Errors
    ///
    /// A broken link marks the job for recovery and returns
    /// [`NamespaceError::RecoveryScheduled`] ([`NamespaceError::BrokenLink`] when it
    /// was already marked).
    pub async fn open(
        &self,
        cancel: &CancellationToken,
        object: &Object,
        range: Option<ByteRange>,
    ) -> NamespaceResult<ContentStream> {
        let resolved = self.resolve(cancel, object).await?;
        let url = resolved
            .url()
            .ok_or_else(|| NamespaceError::NoDownloadLink {
                path: object.remote().to_string(),
            })?;
        let result = self.resolver().open(cancel, object.job_id(), url, range).await;
        if matches!(
            result,
            Err(NamespaceError::RecoveryScheduled { .. } | NamespaceError::BrokenLink { .. })
        ) {
            self.fetcher
                .evict_downloads(&[object.entry().original_link.clone()]);
        }
        result
    }

    /// Forget cached directory ids and rebuild on the next access.
    pub async fn dir_cache_flush(&self) {
        self.dircache.reset_root();
        self.rebuild.lock().await.built = false;
    }

    /// Rebuild now; `force` refetches the inventory regardless of counts.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure when no previous snapshot exists, or a
    /// rule-file error.
    pub async fn refresh(&self, cancel: &CancellationToken, force: bool) -> NamespaceResult<RefreshSummary> {
        let mut guard = self.begin_move().await;
        let fetch = if force { Fetch::Force } else { Fetch::Auto };
        self.rebuild_locked(&mut guard.state, cancel, fetch).await
    }

    /// Parse the rule file leniently and return every dropped line.
    ///
    /// # Errors
    ///
    /// Returns a rule-file IO error.
    pub async fn check_rules(&self) -> NamespaceResult<Vec<RuleWarning>> {
        let text = self.store.load().await?;
        Ok(ParsedRules::parse(&text, InvalidRegexPolicy::Warn)?.warnings)
    }

    fn dir_path(&self, dir: &str) -> NormalizedPath {
        self.config.root.join(dir)
    }

    fn mover(&self) -> Mover<'_> {
        Mover::new(&self.store, &self.tables)
    }

    fn resolver(&self) -> LinkResolver<'_> {
        LinkResolver::new(self.api.as_ref(), &self.fetcher, &self.broken, self.config.retry)
    }

    fn object_at(&self, dir: &NormalizedPath, leaf: &str) -> NamespaceResult<Object> {
        match self.tables.child(dir, leaf) {
            Some(Entry::File(file)) => Ok(Object::new(&self.config.root, dir.clone(), file)),
            Some(Entry::Folder(folder)) => Err(NamespaceError::NotAFile {
                path: folder.path.to_string(),
            }),
            None => Err(NamespaceError::NotFound {
                path: dir.file(leaf),
            }),
        }
    }

    /// Serialize a structural edit; holds `move_gate`, then `rebuild`, until dropped.
    async fn begin_move(&self) -> MoveGuard<'_> {
        let gate = self.move_gate.lock().await;
        self.moving.store(true, Ordering::Release);
        let state = self.rebuild.lock().await;
        MoveGuard {
            moving: &self.moving,
            state,
            _gate: gate,
        }
    }

    /// Trash `file`; returns whether its job was deleted.
    async fn trash_file(
        &self,
        cancel: &CancellationToken,
        folder: &NormalizedPath,
        file: &FileEntry,
    ) -> NamespaceResult<bool> {
        let snapshot = self.fetcher.current();
        let job = snapshot.job(&file.job_id);
        let complete = self.mover().trash(file, folder, job).await?;
        match job {
            Some(job) if complete => {
                self.delete_job(cancel, job).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_job(&self, cancel: &CancellationToken, job: &Job) -> NamespaceResult<()> {
        let api = self.api.as_ref();
        match with_retry(self.config.retry, cancel, "torrents.delete", || {
            api.delete_torrent(&job.id)
        })
        .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(job_id = %job.id, "job already deleted remotely");
            }
            Err(err) => return Err(err.into()),
        }
        self.mover().strip_job(job).await?;
        self.fetcher.remove_job(&job.id);
        self.fetcher.invalidate();
        info!(job_id = %job.id, name = %job.name, "every file trashed; job deleted");
        Ok(())
    }

    async fn ensure_built(&self, cancel: &CancellationToken) -> NamespaceResult<()> {
        if self.moving.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut state = self.rebuild.lock().await;
        if state.built {
            return Ok(());
        }
        self.rebuild_locked(&mut state, cancel, Fetch::Auto).await?;
        Ok(())
    }

    async fn ensure_fresh(&self, cancel: &CancellationToken, path: &NormalizedPath) -> NamespaceResult<()> {
        if self.moving.load(Ordering::Acquire) {
            debug!(path = %path, "move in progress; serving current tables");
            return Ok(());
        }
        let mut state = self.rebuild.lock().await;
        let reason = if !state.built {
            Some("cold start")
        } else if path.is_root() {
            Some("root listing")
        } else if !self.tables.folder_exists(path) {
            Some("unknown folder")
        } else if state
            .last_build
            .is_none_or(|built| built.elapsed() > self.config.refresh_interval)
        {
            Some("refresh interval elapsed")
        } else if state
            .last_rule_check
            .is_none_or(|checked| checked.elapsed() >= self.config.rule_debounce)
        {
            state.last_rule_check = Some(Instant::now());
            let mtime = self.store.modified().await?;
            (mtime != state.rules_mtime).then_some("rule file changed")
        } else {
            None
        };
        let Some(reason) = reason else {
            return Ok(());
        };
        debug!(reason, path = %path, "rebuilding namespace");
        self.rebuild_locked(&mut state, cancel, Fetch::Auto).await?;
        Ok(())
    }

    async fn rebuild_locked(
        &self,
        state: &mut RebuildState,
        cancel: &CancellationToken,
        fetch: Fetch,
    ) -> NamespaceResult<RefreshSummary> {
        let text = self.store.load().await?;
        let rules_mtime = self.store.modified().await?;

        let refetched = match fetch {
            Fetch::Skip => false,
            Fetch::Auto | Fetch::Force => {
                match self
                    .fetcher
                    .refresh(cancel, rules_mtime, fetch == Fetch::Force)
                    .await
                {
                    Ok(outcome) => outcome.refetched,
                    Err(err) if !err.is_cancelled() && self.fetcher.is_loaded() => {
                        warn!(error = %err, "inventory refresh failed; serving previous snapshot");
                        false
                    }
                    Err(err) => return Err(err),
                }
            }
        };
        let recovered = self.recover_broken(cancel).await?;

        let rules = ParsedRules::parse(&text, self.config.invalid_regex)?;
        let snapshot = self.fetcher.current();
        let namespace = build(&rules, &snapshot);
        let files = namespace.placements.len();
        let folders = namespace.folders.len();
        let mapping_changes = self.tables.install(namespace);

        let now = Instant::now();
        state.built = true;
        state.rules_mtime = rules_mtime;
        state.last_rule_check = Some(now);
        state.last_build = Some(now);

        let summary = RefreshSummary {
            jobs: snapshot.jobs().len(),
            files,
            folders,
            mapping_changes,
            refetched,
            recovered,
        };
        debug!(?summary, "namespace rebuilt");
        Ok(summary)
    }

    /// Re-create every dead or broken job in the served snapshot.
    async fn recover_broken(&self, cancel: &CancellationToken) -> NamespaceResult<Vec<String>> {
        let candidates: Vec<Job> = self
            .fetcher
            .current()
            .jobs()
            .iter()
            .filter(|job| needs_recovery(job, &self.broken))
            .cloned()
            .collect();
        let mut recovered = Vec::new();
        let recovery = Recovery::new(
            self.api.as_ref(),
            &self.fetcher,
            &self.broken,
            self.config.retry,
            self.config.recovery_poll,
        );
        for job in candidates {
            let Some(_claim) = self.broken.claim(&job.id) else {
                debug!(job_id = %job.id, "recovery already running");
                continue;
            };
            match recovery.recover(cancel, &job).await {
                Ok(replacement) => {
                    self.broken.clear(&job.id);
                    self.fetcher.replace_job(&job.id, replacement);
                    self.fetcher.invalidate();
                    recovered.push(job.id);
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    warn!(job_id = %job.id, error = %err, "job recovery failed; retrying on next refresh");
                    self.broken.mark(&job.id);
                }
            }
        }
        Ok(recovered)
    }
}

fn with_download(file: &FileEntry, download: &DownloadRecord) -> FileEntry {
    let mut file = file.clone();
    file.apply_download(download);
    file
}

#[async_trait]
impl LeafResolver for NamespaceEngine {
    async fn find_leaf(
        &self,
        cancel: &CancellationToken,
        parent: &NormalizedPath,
        leaf: &str,
    ) -> NamespaceResult<Option<String>> {
        self.ensure_built(cancel).await?;
        let Some(children) = self.tables.children(parent) else {
            return Ok(None);
        };
        let folders = || {
            children.iter().filter_map(|entry| match entry {
                Entry::Folder(folder) => Some(folder),
                Entry::File(_) => None,
            })
        };
        let found = folders()
            .find(|folder| folder.name == leaf)
            .or_else(|| folders().find(|folder| folder.name.eq_ignore_ascii_case(leaf)))
            .map(|folder| folder.path.to_string());
        Ok(found)
    }

    async fn create_dir(
        &self,
        _cancel: &CancellationToken,
        parent: &NormalizedPath,
        leaf: &str,
    ) -> NamespaceResult<String> {
        if parent.is_root() {
            return Err(NamespaceError::RootReserved {
                leaf: leaf.to_string(),
            });
        }
        let path = parent.join(leaf);
        self.store.append_line(path.as_str()).await?;
        self.tables.add_folder(&path);
        info!(path = %path, "folder created");
        Ok(path.to_string())
    }
}
