//! Trait seams for the external systems that `jig` coordinates:
//!
//! - [`git`]: Low-level Git operations (branches, stash, log, remotes, push)
//! - [`tracker`]: Issue tracker operations (fetch, create, transition)
//! - [`host`]: Code host operations (pull requests, releases)
//!
//! Each trait is implemented by a client in [`crate::clients`] and gets a
//! mockall mock in tests.

pub mod git;
pub mod host;
pub mod tracker;
