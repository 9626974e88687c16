//! Directory-ID cache seam used by hosts that address folders by id.
//!
//! # Design
//! - Folder ids are the folder's normalized path, so a cached id never goes
//!   stale when the tables are rebuilt; only removals and moves flush entries.
//! - Cache misses walk the path one segment at a time through a [`LeafResolver`].

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{NamespaceError, NamespaceResult};
use crate::path::NormalizedPath;

/// Lookups a [`DirectoryCache`] performs on a miss.
#[async_trait]
pub trait LeafResolver: Send + Sync {
    /// Id of the folder `leaf` inside `parent`, if it exists.
    async fn find_leaf(
        &self,
        cancel: &CancellationToken,
        parent: &NormalizedPath,
        leaf: &str,
    ) -> NamespaceResult<Option<String>>;

    /// Create folder `leaf` inside `parent` and return its id.
    async fn create_dir(
        &self,
        cancel: &CancellationToken,
        parent: &NormalizedPath,
        leaf: &str,
    ) -> NamespaceResult<String>;
}

/// Path to folder-id cache.
#[async_trait]
pub trait DirectoryCache: Send + Sync {
    /// Id of the root folder.
    fn find_root(&self) -> String;

    /// Id of `path`, resolving and optionally creating missing segments.
    async fn find_dir(
        &self,
        cancel: &CancellationToken,
        resolver: &dyn LeafResolver,
        path: &NormalizedPath,
        create: bool,
    ) -> NamespaceResult<String>;

    /// Cached id of `path` without resolving.
    fn find_path(&self, path: &NormalizedPath) -> Option<String>;

    /// Record the id of `path`.
    fn put(&self, path: &NormalizedPath, id: String);

    /// Forget `path` and everything below it.
    fn flush_dir(&self, path: &NormalizedPath);

    /// Forget everything except the root.
    fn reset_root(&self);
}

/// In-memory [`DirectoryCache`].
#[derive(Debug)]
pub struct PathDirCache {
    root: NormalizedPath,
    ids: RwLock<BTreeMap<NormalizedPath, String>>,
}

impl PathDirCache {
    /// Cache rooted at `root`.
    #[must_use]
    pub fn new(root: NormalizedPath) -> Self {
        let ids = BTreeMap::from([(root.clone(), root.to_string())]);
        Self {
            root,
            ids: RwLock::new(ids),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<NormalizedPath, String>> {
        self.ids.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<NormalizedPath, String>> {
        self.ids.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of cached folders, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether only the root is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

#[async_trait]
impl DirectoryCache for PathDirCache {
    fn find_root(&self) -> String {
        self.root.to_string()
    }

    async fn find_dir(
        &self,
        cancel: &CancellationToken,
        resolver: &dyn LeafResolver,
        path: &NormalizedPath,
        create: bool,
    ) -> NamespaceResult<String> {
        if let Some(id) = self.find_path(path) {
            return Ok(id);
        }
        let mut parent = NormalizedPath::root();
        let mut id = self.find_root();
        for segment in path.segments() {
            let child = parent.join(segment);
            id = match self.find_path(&child) {
                Some(id) => id,
                None => {
                    let found = match resolver.find_leaf(cancel, &parent, segment).await? {
                        Some(found) => found,
                        None if create => resolver.create_dir(cancel, &parent, segment).await?,
                        None => {
                            return Err(NamespaceError::DirNotFound {
                                path: child.to_string(),
                            });
                        }
                    };
                    debug!(path = %child, id = %found, "directory cached");
                    self.put(&child, found.clone());
                    found
                }
            };
            parent = child;
        }
        Ok(id)
    }

    fn find_path(&self, path: &NormalizedPath) -> Option<String> {
        self.read().get(path).cloned()
    }

    fn put(&self, path: &NormalizedPath, id: String) {
        self.write().insert(path.clone(), id);
    }

    fn flush_dir(&self, path: &NormalizedPath) {
        if path.is_root() {
            self.reset_root();
            return;
        }
        self.write().retain(|cached, _| !cached.starts_with(path));
    }

    fn reset_root(&self) {
        let mut ids = self.write();
        ids.retain(|cached, _| *cached == self.root);
        ids.entry(self.root.clone())
            .or_insert_with(|| self.root.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Folders {
        known: Mutex<BTreeSet<String>>,
        lookups: Mutex<usize>,
    }

    #[async_trait]
    impl LeafResolver for Folders {
        async fn find_leaf(
            &self,
            _cancel: &CancellationToken,
            parent: &NormalizedPath,
            leaf: &str,
        ) -> NamespaceResult<Option<String>> {
            *self.lookups.lock().unwrap_or_else(|err| err.into_inner()) += 1;
            let path = parent.join(leaf).to_string();
            let known = self.known.lock().unwrap_or_else(|err| err.into_inner());
            Ok(known.contains(&path).then_some(path))
        }

        async fn create_dir(
            &self,
            _cancel: &CancellationToken,
            parent: &NormalizedPath,
            leaf: &str,
        ) -> NamespaceResult<String> {
            let path = parent.join(leaf).to_string();
            self.known
                .lock()
                .unwrap_or_else(|err| err.into_inner())
                .insert(path.clone());
            Ok(path)
        }
    }

    fn folders(paths: &[&str]) -> Folders {
        let folders = Folders::default();
        folders
            .known
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .extend(paths.iter().map(|path| (*path).to_string()));
        folders
    }

    #[tokio::test]
    async fn resolves_and_caches_each_segment() -> NamespaceResult<()> {
        let cache = PathDirCache::new(NormalizedPath::root());
        let resolver = folders(&["/shows/", "/shows/a/"]);
        let cancel = CancellationToken::new();
        let path = NormalizedPath::dir("/shows/a/");

        let id = cache.find_dir(&cancel, &resolver, &path, false).await?;
        assert_eq!(id, "/shows/a/");
        assert_eq!(cache.len(), 3);
        cache.find_dir(&cancel, &resolver, &path, false).await?;
        assert_eq!(*resolver.lookups.lock().unwrap_or_else(|err| err.into_inner()), 2);
        Ok(())
    }

    #[tokio::test]
    async fn missing_segments_fail_or_get_created() -> NamespaceResult<()> {
        let cache = PathDirCache::new(NormalizedPath::root());
        let resolver = folders(&["/shows/"]);
        let cancel = CancellationToken::new();
        let path = NormalizedPath::dir("/shows/new/");

        let err = cache.find_dir(&cancel, &resolver, &path, false).await.err();
        assert!(matches!(err, Some(NamespaceError::DirNotFound { ref path }) if path == "/shows/new/"));

        let id = cache.find_dir(&cancel, &resolver, &path, true).await?;
        assert_eq!(id, "/shows/new/");
        Ok(())
    }

    #[test]
    fn flush_drops_descendants_only() {
        let cache = PathDirCache::new(NormalizedPath::root());
        for path in ["/shows/", "/shows/a/", "/movies/"] {
            cache.put(&NormalizedPath::dir(path), path.to_string());
        }
        cache.flush_dir(&NormalizedPath::dir("/shows/"));
        assert!(cache.find_path(&NormalizedPath::dir("/shows/a/")).is_none());
        assert!(cache.find_path(&NormalizedPath::dir("/movies/")).is_some());
        cache.reset_root();
        assert!(cache.is_empty());
        assert_eq!(cache.find_path(&NormalizedPath::root()).as_deref(), Some("/"));
    }
}
