//! Durable rule-file storage.
//!
//! # Design
//! - All rule-file IO goes through one `RwLock`; loads share it, rewrites and appends own it.
//! - A rewrite is computed in memory, written to a sibling temp file, then renamed
//!   over the original so a crash never leaves a truncated rule file.
//! - A missing file is recreated from [`DEFAULT_TEMPLATE`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{NamespaceError, NamespaceResult};
use crate::rules::{DEFAULT_TEMPLATE, RuleDocument};

const TEMP_SUFFIX: &str = ".tmp";

/// Guarded access to the rule file.
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl RuleStore {
    /// Store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Rule file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the rule file, creating it from the default template when missing.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::RuleFileIo`] when the file cannot be read or created.
    pub async fn load(&self) -> NamespaceResult<String> {
        {
            let _guard = self.lock.read().await;
            match fs::read_to_string(&self.path).await {
                Ok(text) => return Ok(text),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(NamespaceError::rule_io("rules.load", &self.path, err)),
            }
        }
        let _guard = self.lock.write().await;
        match fs::read_to_string(&self.path).await {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "no rule file found; writing default template");
                if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|err| NamespaceError::rule_io("rules.create_dir", parent, err))?;
                }
                self.replace_contents(DEFAULT_TEMPLATE).await?;
                Ok(DEFAULT_TEMPLATE.to_string())
            }
            Err(err) => Err(NamespaceError::rule_io("rules.load", &self.path, err)),
        }
    }

    /// Modification time of the rule file; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::RuleFileIo`] for failures other than a missing file.
    pub async fn modified(&self) -> NamespaceResult<Option<SystemTime>> {
        match fs::metadata(&self.path).await {
            Ok(meta) => meta
                .modified()
                .map(Some)
                .map_err(|err| NamespaceError::rule_io("rules.stat", &self.path, err)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(NamespaceError::rule_io("rules.stat", &self.path, err)),
        }
    }

    /// Append a single line.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::RuleFileIo`] when the file cannot be opened or written.
    pub async fn append_line(&self, line: &str) -> NamespaceResult<()> {
        let _guard = self.lock.write().await;
        let existing = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(NamespaceError::rule_io("rules.append", &self.path, err)),
        };
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| NamespaceError::rule_io("rules.append", &self.path, err))?;
        let mut payload = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            payload.push('\n');
        }
        payload.push_str(line);
        payload.push('\n');
        file.write_all(payload.as_bytes())
            .await
            .map_err(|err| NamespaceError::rule_io("rules.append", &self.path, err))?;
        file.flush()
            .await
            .map_err(|err| NamespaceError::rule_io("rules.append", &self.path, err))?;
        debug!(path = %self.path.display(), line, "appended rule line");
        Ok(())
    }

    /// Apply `edit` to the current document and persist the result if it changed.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::RuleFileIo`] when reading or replacing the file fails.
    pub async fn rewrite<F, R>(&self, edit: F) -> NamespaceResult<R>
    where
        F: FnOnce(&mut RuleDocument) -> R,
    {
        let _guard = self.lock.write().await;
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => DEFAULT_TEMPLATE.to_string(),
            Err(err) => return Err(NamespaceError::rule_io("rules.rewrite", &self.path, err)),
        };
        let original = RuleDocument::parse(&text);
        let mut document = original.clone();
        let result = edit(&mut document);
        if document != original {
            self.replace_contents(&document.render()).await?;
            debug!(path = %self.path.display(), lines = document.lines().len(), "rewrote rule file");
        }
        Ok(result)
    }

    async fn replace_contents(&self, contents: &str) -> NamespaceResult<()> {
        let mut temp = self.path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);
        let mut file = fs::File::create(&temp)
            .await
            .map_err(|err| NamespaceError::rule_io("rules.write_temp", &temp, err))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|err| NamespaceError::rule_io("rules.write_temp", &temp, err))?;
        file.sync_all()
            .await
            .map_err(|err| NamespaceError::rule_io("rules.write_temp", &temp, err))?;
        drop(file);
        fs::rename(&temp, &self.path)
            .await
            .map_err(|err| NamespaceError::rule_io("rules.replace", &self.path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_creates_default_template() -> Result<()> {
        let dir = TempDir::new()?;
        let store = RuleStore::new(dir.path().join("nested").join("sorting.txt"));
        assert_eq!(store.modified().await?, None);
        let text = store.load().await?;
        assert_eq!(text, DEFAULT_TEMPLATE);
        assert!(store.modified().await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn append_adds_missing_newline() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("sorting.txt");
        fs::write(&path, "/a").await?;
        let store = RuleStore::new(&path);
        store.append_line("/a/b/").await?;
        assert_eq!(store.load().await?, "/a\n/a/b/\n");
        Ok(())
    }

    #[tokio::test]
    async fn rewrite_persists_only_changes() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("sorting.txt");
        fs::write(&path, "# keep\n/A/L1 -> /x/\n").await?;
        let store = RuleStore::new(&path);

        let unchanged = store.rewrite(|doc| doc.lines().len()).await?;
        assert_eq!(unchanged, 2);

        store.rewrite(|doc| doc.set_move("/A/L1", "/movies/A/")).await?;
        assert_eq!(store.load().await?, "# keep\n/A/L1 -> /movies/A/\n");
        assert!(!dir.path().join("sorting.txt.tmp").exists());
        Ok(())
    }
}
