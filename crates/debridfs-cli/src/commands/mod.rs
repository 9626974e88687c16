//! Command handlers grouped by concern.

pub(crate) mod maintenance;
pub(crate) mod namespace;
