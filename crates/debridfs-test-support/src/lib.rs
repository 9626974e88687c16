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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (inventory builders, temp rule files), mocks.rs (in-memory remote).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{FakeTorrent, RuleFileFixture, link_for, timestamp};
pub use mocks::{FakeCall, FakeDebrid};
