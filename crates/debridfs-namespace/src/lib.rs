//! Virtual folder namespace over a flat Real-Debrid inventory.
//!
//! Layout: `rules.rs`/`store.rs` (rule file), `inventory.rs` (remote fetcher),
//! `builder.rs`/`tables.rs` (derived namespace), `resolver.rs`/`recovery.rs`
//! (links and dead jobs), `mover.rs` (rule rewrites), `engine.rs` (host surface).
#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod config;
pub mod dircache;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod model;
pub mod mover;
pub mod object;
pub mod path;
pub mod recovery;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod tables;

pub use builder::{Namespace, build};
pub use config::{
    DEFAULT_PAGE_SIZE, DEFAULT_REFRESH_INTERVAL, DEFAULT_RULE_DEBOUNCE, InvalidRegexPolicy,
    NamespaceConfig,
};
pub use dircache::{DirectoryCache, LeafResolver, PathDirCache};
pub use engine::{NamespaceEngine, RefreshSummary};
pub use error::{NamespaceError, NamespaceResult};
pub use inventory::{InventoryFetcher, InventorySnapshot, RefreshOutcome};
pub use model::{Entry, FileEntry, FolderEntry, Job, MappingEntry};
pub use object::Object;
pub use path::{NormalizedPath, split_object_path};
pub use recovery::{BrokenJobs, PendingReplacement};
pub use rules::{
    DEFAULT_FOLDER, DEFAULT_TEMPLATE, ParsedRules, RegexRule, RuleDocument, RuleWarning,
    TRASH_MARKER,
};
pub use store::RuleStore;
pub use tables::{NamespaceSnapshot, NamespaceTables};
