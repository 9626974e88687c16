//! Rule-file grammar, typed rule model, and in-memory rewrites.
//!
//! # Design
//! - One directive per line: comment, blank, move (` -> `), regex (` == `), or bare leaf.
//! - Move is tested before regex and lines split on the first separator.
//! - The text file is a serialization target: edits happen on a [`RuleDocument`]
//!   and are written back wholesale by the store.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::config::InvalidRegexPolicy;
use crate::error::{NamespaceError, NamespaceResult};
use crate::path::NormalizedPath;

/// Suffix marking a mapping value as logically deleted.
pub const TRASH_MARKER: &str = ".trashed";
/// Separator of explicit move lines.
pub const MOVE_SEPARATOR: &str = " -> ";
/// Separator of regex classification lines.
pub const REGEX_SEPARATOR: &str = " == ";
/// Folder for jobs no regex rule matches.
pub const DEFAULT_FOLDER: &str = "/default/";

/// Content written when the rule file does not exist yet.
pub const DEFAULT_TEMPLATE: &str = r"# ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
# ~~~~~~~~~~~~~~ debridfs sorting file ~~~~~~~~~~~~~
# ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

# - comment lines start with '#'
#
# - regex folders: '/folder' + ' == ' + regular expression.
#   Rules are tested in file order against job names; the first match wins.
#   Jobs that match no rule land in '/default'.
#   Example: /movies == (?i)(19|20)([0-9]{2} ?\.?)
#
# - plain folders: '/folder'
#   Example: /documentaries
#
# - moves and renames: '/' + job name + '/' + file id + ' -> ' + destination
#   Missing folders along the destination are created automatically.
#   Example: /some.show.S01/ -> /shows/some.show/season 1/
#   Example: /some.show.S01/ABCDEFGHIJKL -> /shows/some.show/season 1/episode 1.mkv

# ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
# ~~~~~~~~~ top level and regex folders ~~~~~~~~~~~~
# ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

/shows == (?i)(S[0-9]{2}|SEASONS?.[0-9]|COMPLETE|[^457a-z\W\s]-[0-9]+)
/movies == (?i)(19|20)([0-9]{2} ?\.?)
/default

# ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
# ~~~~~~ recorded changes to the structure ~~~~~~~~~
# ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

";

/// Classification of one rule-file line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `# ...`
    Comment,
    /// Empty or whitespace-only line.
    Blank,
    /// `source -> destination`
    Move {
        /// Mapping key or folder path.
        source: &'a str,
        /// Destination folder or full file path.
        destination: &'a str,
    },
    /// `/folder == pattern`
    Regex {
        /// Destination folder.
        folder: &'a str,
        /// Regular expression tested against job names.
        pattern: &'a str,
    },
    /// Any other line: a standalone folder declaration.
    Leaf(&'a str),
}

impl<'a> Directive<'a> {
    /// Classify a single line.
    #[must_use]
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.starts_with('#') {
            Self::Comment
        } else if line.trim().is_empty() {
            Self::Blank
        } else if let Some((source, destination)) = line.split_once(MOVE_SEPARATOR) {
            Self::Move {
                source,
                destination,
            }
        } else if let Some((folder, pattern)) = line.split_once(REGEX_SEPARATOR) {
            Self::Regex { folder, pattern }
        } else {
            Self::Leaf(line)
        }
    }
}

/// Compiled regex classification rule.
#[derive(Debug, Clone)]
pub struct RegexRule {
    /// Folder matching jobs are placed under.
    pub folder: NormalizedPath,
    /// Compiled pattern.
    pub regex: Regex,
    /// 1-based source line.
    pub line: usize,
}

impl RegexRule {
    /// Whether a job name matches this rule.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// A dropped rule-file line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleWarning {
    /// 1-based line number.
    pub line: usize,
    /// Offending pattern.
    pub pattern: String,
    /// Compiler diagnostic.
    pub message: String,
}

/// Typed view of a rule file.
#[derive(Debug, Clone, Default)]
pub struct ParsedRules {
    /// Regex rules in file order.
    pub regex_rules: Vec<RegexRule>,
    /// Explicit mappings (`key`, `value`) in file order; bare leaves map to themselves.
    pub mappings: Vec<(String, String)>,
    /// Lines dropped under [`InvalidRegexPolicy::Warn`].
    pub warnings: Vec<RuleWarning>,
}

impl ParsedRules {
    /// Parse rule-file text.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::InvalidRule`] for a malformed regex under
    /// [`InvalidRegexPolicy::Reject`].
    pub fn parse(text: &str, policy: InvalidRegexPolicy) -> NamespaceResult<Self> {
        let mut parsed = Self::default();
        for (index, line) in text.lines().enumerate() {
            let number = index + 1;
            match Directive::parse(line) {
                Directive::Comment | Directive::Blank => {}
                Directive::Move {
                    source,
                    destination,
                } => parsed
                    .mappings
                    .push((source.to_string(), destination.to_string())),
                Directive::Regex { folder, pattern } => match Regex::new(pattern) {
                    Ok(regex) => parsed.regex_rules.push(RegexRule {
                        folder: NormalizedPath::dir(folder),
                        regex,
                        line: number,
                    }),
                    Err(source) => match policy {
                        InvalidRegexPolicy::Reject => {
                            return Err(NamespaceError::InvalidRule {
                                line: number,
                                pattern: pattern.to_string(),
                                source,
                            });
                        }
                        InvalidRegexPolicy::Warn => {
                            warn!(line = number, pattern, error = %source, "dropping malformed regex rule");
                            parsed.warnings.push(RuleWarning {
                                line: number,
                                pattern: pattern.to_string(),
                                message: source.to_string(),
                            });
                        }
                    },
                },
                Directive::Leaf(leaf) => parsed
                    .mappings
                    .push((leaf.to_string(), NormalizedPath::dir(leaf).to_string())),
            }
        }
        Ok(parsed)
    }

    /// Mapping table; a later line for the same key wins.
    #[must_use]
    pub fn mapping_table(&self) -> BTreeMap<String, String> {
        self.mappings.iter().cloned().collect()
    }

    /// Folder a job named `name` is classified into.
    #[must_use]
    pub fn default_location(&self, name: &str) -> NormalizedPath {
        default_location(&self.regex_rules, name)
    }
}

/// First matching rule's folder, else [`DEFAULT_FOLDER`].
#[must_use]
pub fn default_location(rules: &[RegexRule], name: &str) -> NormalizedPath {
    rules
        .iter()
        .find(|rule| rule.matches(name))
        .map_or_else(|| NormalizedPath::dir(DEFAULT_FOLDER), |rule| rule.folder.clone())
}

/// Rule-file lines held for an in-memory rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDocument {
    lines: Vec<String>,
}

impl RuleDocument {
    /// Split rule-file text into lines.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Current lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Serialize with a trailing newline.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    /// Destination of the last move line for `key`.
    #[must_use]
    pub fn move_destination(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match Directive::parse(line) {
            Directive::Move {
                source,
                destination,
            } if source == key => Some(destination),
            _ => None,
        })
    }

    /// Point `key` at `destination`: the first move line for `key` is rewritten,
    /// later duplicates are dropped, and a line is appended when none exists.
    pub fn set_move(&mut self, key: &str, destination: &str) {
        let replacement = format!("{key}{MOVE_SEPARATOR}{destination}");
        let mut replaced = false;
        self.lines.retain_mut(|line| {
            let is_key = matches!(
                Directive::parse(line),
                Directive::Move { source, .. } if source == key
            );
            if !is_key {
                return true;
            }
            if replaced {
                return false;
            }
            line.clone_from(&replacement);
            replaced = true;
            true
        });
        if !replaced {
            self.lines.push(replacement);
        }
    }

    /// Rewrite every move destination and bare leaf lying under `from` so it lies under `to`.
    ///
    /// Returns the keys whose lines were rewritten.
    pub fn replace_prefix(&mut self, from: &NormalizedPath, to: &NormalizedPath) -> Vec<String> {
        let mut touched = Vec::new();
        for line in &mut self.lines {
            let rewritten = match Directive::parse(line) {
                Directive::Move {
                    source,
                    destination,
                } => destination.strip_prefix(from.as_str()).map(|rest| {
                    touched.push(source.to_string());
                    format!("{source}{MOVE_SEPARATOR}{}{rest}", to.as_str())
                }),
                Directive::Leaf(leaf) => {
                    let folder = NormalizedPath::dir(leaf);
                    folder.replace_prefix(from, to).map(|moved| {
                        touched.push(leaf.to_string());
                        moved.to_string()
                    })
                }
                _ => None,
            };
            if let Some(rewritten) = rewritten {
                *line = rewritten;
            }
        }
        touched
    }

    /// Drop move lines whose source satisfies `predicate`; returns how many were removed.
    pub fn remove_moves<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let before = self.lines.len();
        self.lines.retain(|line| match Directive::parse(line) {
            Directive::Move { source, .. } => !predicate(source),
            _ => true,
        });
        before - self.lines.len()
    }

    /// Drop lines declaring exactly `folder` (bare leaves and self-mapping moves).
    pub fn remove_folder(&mut self, folder: &NormalizedPath) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| match Directive::parse(line) {
            Directive::Leaf(leaf) => NormalizedPath::dir(leaf) != *folder,
            Directive::Move { destination, .. } => {
                !(destination.ends_with('/') && NormalizedPath::dir(destination) == *folder)
            }
            _ => true,
        });
        before - self.lines.len()
    }
}
