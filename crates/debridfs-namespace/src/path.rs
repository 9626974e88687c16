//! Canonical directory paths.
//!
//! Every path that crosses a module boundary is a [`NormalizedPath`]: a leading
//! slash, a trailing slash, and no empty segments (`/`, `/shows/`, `/shows/a b/`).

use std::fmt;

use serde::Serialize;

/// Directory path in canonical `/a/b/` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    /// The namespace root (`/`).
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Normalize any slash-separated directory path.
    #[must_use]
    pub fn dir(raw: &str) -> Self {
        Self::from_segments(raw.split('/'))
    }

    /// Build a path from its segments; empty segments are dropped.
    #[must_use]
    pub fn from_segments<'a, I>(segments: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut path = String::from("/");
        for segment in segments.into_iter().filter(|segment| !segment.is_empty()) {
            path.push_str(segment);
            path.push('/');
        }
        Self(path)
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the namespace root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Non-empty segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Number of segments below the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Child directory `self + leaf + /`.
    #[must_use]
    pub fn join(&self, leaf: &str) -> Self {
        Self::from_segments(self.segments().chain(leaf.split('/')))
    }

    /// Full path of a file named `leaf` inside this directory.
    #[must_use]
    pub fn file(&self, leaf: &str) -> String {
        format!("{}{leaf}", self.0)
    }

    /// Parent directory; `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let segments: Vec<&str> = self.segments().collect();
        Some(Self::from_segments(
            segments[..segments.len() - 1].iter().copied(),
        ))
    }

    /// Last segment; `None` for the root.
    #[must_use]
    pub fn leaf(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Whether `self` equals `prefix` or lies below it.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(prefix.as_str())
    }

    /// Replace a leading `from` with `to`; `None` when `self` is not below `from`.
    #[must_use]
    pub fn replace_prefix(&self, from: &Self, to: &Self) -> Option<Self> {
        self.0
            .strip_prefix(from.as_str())
            .map(|rest| Self::from_segments(to.segments().chain(rest.split('/'))))
    }

    /// Every proper ancestor from the root down, excluding `self`.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Self> {
        let segments: Vec<&str> = self.segments().collect();
        (0..segments.len())
            .map(|depth| Self::from_segments(segments[..depth].iter().copied()))
            .collect()
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Split a host-relative object path (`a/b/c.mkv`) into its directory and leaf.
#[must_use]
pub fn split_object_path(base: &NormalizedPath, remote: &str) -> (NormalizedPath, String) {
    let trimmed = remote.trim_matches('/');
    match trimmed.rsplit_once('/') {
        Some((dir, leaf)) => (base.join(dir), leaf.to_string()),
        None => (base.clone(), trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_every_spelling() {
        for raw in ["shows", "/shows", "shows/", "/shows/", "//shows//"] {
            assert_eq!(NormalizedPath::dir(raw).as_str(), "/shows/");
        }
        assert_eq!(NormalizedPath::dir("").as_str(), "/");
        assert!(NormalizedPath::dir("/").is_root());
    }

    #[test]
    fn parent_leaf_and_ancestors() {
        let path = NormalizedPath::dir("/shows/some.show/season 1/");
        assert_eq!(path.leaf(), Some("season 1"));
        assert_eq!(
            path.parent().map(|parent| parent.to_string()),
            Some("/shows/some.show/".to_string())
        );
        let ancestors: Vec<String> = path.ancestors().iter().map(ToString::to_string).collect();
        assert_eq!(ancestors, vec!["/", "/shows/", "/shows/some.show/"]);
        assert_eq!(NormalizedPath::root().parent(), None);
    }

    #[test]
    fn prefix_replacement_respects_segment_boundaries() {
        let from = NormalizedPath::dir("/movies/a/");
        let to = NormalizedPath::dir("/archive/b/");
        let inside = NormalizedPath::dir("/movies/a/extras/");
        assert_eq!(
            inside.replace_prefix(&from, &to).map(|path| path.to_string()),
            Some("/archive/b/extras/".to_string())
        );
        let sibling = NormalizedPath::dir("/movies/ab/");
        assert!(!sibling.starts_with(&from));
        assert_eq!(sibling.replace_prefix(&from, &to), None);
    }

    #[test]
    fn splits_object_paths() {
        let base = NormalizedPath::root();
        let (dir, leaf) = split_object_path(&base, "movies/Film/film.mkv");
        assert_eq!(dir.as_str(), "/movies/Film/");
        assert_eq!(leaf, "film.mkv");
        let (dir, leaf) = split_object_path(&NormalizedPath::dir("/movies"), "film.mkv");
        assert_eq!(dir.as_str(), "/movies/");
        assert_eq!(leaf, "film.mkv");
    }
}
