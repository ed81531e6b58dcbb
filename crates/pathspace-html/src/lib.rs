// SPDX-License-Identifier: Apache-2.0
//! Forwarding facade that rewrites paths under a remote mount alias and launches an
//! optional background server.
//!
//! This crate deliberately stops at the forwarding boundary: it owns alias
//! normalization, path rewriting, remote health gating, and a pluggable background
//! launcher, but carries no HTTP listener, asset pipeline, or authentication of its
//! own. Embedders supply a real server via [`PathSpaceHtmlServer::with_launcher`].

#![forbid(unsafe_code)]

pub mod facade;
pub mod launcher;
pub mod remote_mount;

pub use facade::PathSpaceHtmlServer;
pub use launcher::{choose_listen_port, default_server_launcher, ReadyCallback, ServerLauncher};
pub use remote_mount::{normalize_remote_alias, prefix_remote_path, prefix_under_alias, RemoteMount, ResolvedRemoteMount};
