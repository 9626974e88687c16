//! Remote inventory access for the Real-Debrid REST API.
//!
//! Layout: `model.rs` (wire DTOs), `service.rs` (`DebridApi` seam), `client.rs`
//! (reqwest-backed client and error handler), `retry.rs` (bounded retry with
//! cancellation), `error.rs` (structured error type).
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

pub mod client;
pub mod error;
pub mod model;
pub mod retry;
pub mod service;

pub use client::{ApiRequest, DEFAULT_API_URL, RealDebridClient, RemoteConfig};
pub use error::{ApiProblem, RemoteError, RemoteResult};
pub use model::{
    AddedTorrent, ByteRange, ContentStream, DownloadRecord, Page, TorrentFileRecord, TorrentInfo,
    TorrentRecord, TorrentStatus, UnrestrictedLink, link_leaf, magnet_for_hash,
};
pub use retry::{RetryPolicy, cancellable, pause, with_retry};
pub use service::DebridApi;
