// SPDX-License-Identifier: Apache-2.0
//! The pluggable background server launcher.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use pathspace::PathSpace;
use pathspace_core::{Error, Result};
use rand::Rng;

/// Invoked by a [`ServerLauncher`] exactly once, as soon as it knows whether it is
/// listening. A launcher that never calls this leaves [`crate::PathSpaceHtmlServer::start`]
/// to proceed optimistically once its wait deadline passes.
pub type ReadyCallback = Box<dyn FnOnce(Result<()>) + Send>;

/// A background server implementation: given the store to serve, the port it was
/// assigned, a stop flag to observe, and a readiness callback to report through, run
/// until `stop_flag` is set.
///
/// Swappable so tests and embedders can substitute a fake without spinning up a real
/// listener.
pub type ServerLauncher = Arc<dyn Fn(Arc<PathSpace>, u16, Arc<AtomicBool>, ReadyCallback) + Send + Sync>;

/// The default launcher: reports ready immediately and idles until stopped.
///
/// This crate's scope is the forwarding facade around a [`PathSpace`], not an actual
/// HTTP listener; callers embedding a real server supply their own launcher via
/// [`crate::PathSpaceHtmlServer::with_launcher`].
#[must_use]
pub fn default_server_launcher() -> ServerLauncher {
    Arc::new(|_space, _port, stop_flag, ready| {
        ready(Ok(()));
        while !stop_flag.load(std::sync::atomic::Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(20));
        }
    })
}

/// Resolves a configured port to a concrete listen port, choosing a random port in
/// `[20000, 60000]` when `requested` is `0`.
///
/// # Errors
///
/// This never fails in practice (the range is always nonempty); it returns `Result`
/// to mirror the boundary contract every other fallible operation in this workspace
/// uses.
pub fn choose_listen_port(requested: u16) -> Result<u16> {
    if requested > 0 {
        return Ok(requested);
    }
    let port = rand::thread_rng().gen_range(20000..=60000);
    if port == 0 {
        return Err(Error::InvalidError("failed to choose serve-html listen port".to_string()));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honors_explicit_nonzero_port() {
        assert_eq!(choose_listen_port(8080).expect("port"), 8080);
    }

    #[test]
    fn random_port_falls_within_configured_range() {
        for _ in 0..50 {
            let port = choose_listen_port(0).expect("port");
            assert!((20000..=60000).contains(&port));
        }
    }
}
