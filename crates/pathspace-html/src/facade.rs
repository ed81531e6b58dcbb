// SPDX-License-Identifier: Apache-2.0
//! The forwarding facade itself: health-gated remote mount resolution plus an optional
//! background server thread.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pathspace::PathSpace;
use pathspace_core::{Error, In, Out, Result};
use tracing::{info, warn};

use crate::launcher::{choose_listen_port, default_server_launcher, ServerLauncher};
use crate::remote_mount::{normalize_remote_alias, prefix_remote_path, RemoteMount, ResolvedRemoteMount};

const LISTEN_READY_TIMEOUT: Duration = Duration::from_millis(750);
const LISTEN_READY_POLL: Duration = Duration::from_millis(5);

struct RunState {
    running: bool,
    stop_flag: Option<Arc<AtomicBool>>,
    thread: Option<JoinHandle<()>>,
}

impl Default for RunState {
    fn default() -> Self {
        Self { running: false, stop_flag: None, thread: None }
    }
}

/// A thin wrapper around a [`PathSpace`] that optionally rewrites every forwarded path
/// under a remote mount alias and can launch a pluggable background server.
pub struct PathSpaceHtmlServer {
    space: Arc<PathSpace>,
    remote: Option<RemoteMount>,
    launcher: ServerLauncher,
    state: Mutex<RunState>,
}

impl PathSpaceHtmlServer {
    /// Creates a facade over `space`, with an optional remote mount and the default
    /// (no-op beyond readiness) server launcher.
    #[must_use]
    pub fn new(space: Arc<PathSpace>, remote: Option<RemoteMount>) -> Self {
        Self { space, remote, launcher: default_server_launcher(), state: Mutex::new(RunState::default()) }
    }

    /// Overrides the background server launcher, e.g. to substitute a fake in tests.
    #[must_use]
    pub fn with_launcher(mut self, launcher: ServerLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    /// Whether the background server thread is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Resolves the configured remote mount, if any, checking remote health when
    /// `require_healthy` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidError`] if the alias fails validation or the remote
    /// reports `connected == 0`; propagates whatever error the health-check read fails
    /// with otherwise.
    pub fn resolve_remote_mount(&self) -> Result<Option<ResolvedRemoteMount>> {
        let Some(remote) = &self.remote else {
            return Ok(None);
        };

        let (alias_name, alias_path) = normalize_remote_alias(remote)?;

        let mut metrics_root = if remote.metrics_root.is_empty() {
            "/inspector/metrics/remotes".to_string()
        } else {
            remote.metrics_root.clone()
        };
        if !metrics_root.starts_with('/') {
            metrics_root.insert(0, '/');
        }
        while metrics_root.len() > 1 && metrics_root.ends_with('/') {
            metrics_root.pop();
        }

        if remote.require_healthy {
            let connected_path = format!("{metrics_root}/{alias_name}/client/connected");
            let connected = self.space.read::<i32>(&connected_path, Out::new())?;
            if connected == 0 {
                return Err(Error::InvalidError(format!("remote mount not connected: {alias_name}")));
            }
        }

        Ok(Some(ResolvedRemoteMount { alias_name, alias_path, metrics_root }))
    }

    /// Inserts `value` at `path`, rewritten under the remote mount if one is configured.
    ///
    /// # Errors
    ///
    /// Returns whatever error remote mount resolution or the underlying insert reports.
    pub fn forward_insert<T: Any + Clone + Send + Sync>(&self, path: &str, value: T) -> Result<()> {
        let resolved = self.resolve_remote_mount()?;
        let prefixed = prefix_remote_path(path, resolved.as_ref())?;
        let outcome = self.space.insert(&prefixed, value, In::new());
        if let Some((_, err)) = outcome.errors.into_iter().next() {
            return Err(err);
        }
        Ok(())
    }

    /// Reads the value at `path`, rewritten under the remote mount if one is configured.
    ///
    /// # Errors
    ///
    /// Returns whatever error remote mount resolution or the underlying read reports.
    pub fn forward_read<T: Any + Clone + Send + Sync>(&self, path: &str) -> Result<T> {
        let resolved = self.resolve_remote_mount()?;
        let prefixed = prefix_remote_path(path, resolved.as_ref())?;
        self.space.read::<T>(&prefixed, Out::new())
    }

    /// Lists the children of `path`, rewritten under the remote mount if one is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns whatever error remote mount resolution or the underlying listing
    /// reports.
    pub fn forward_list_children(&self, path: &str) -> Result<Vec<String>> {
        let resolved = self.resolve_remote_mount()?;
        let prefixed = prefix_remote_path(path, resolved.as_ref())?;
        self.space.list_children(&prefixed)
    }

    /// Resolves the remote mount (if configured), selects a listen port, and launches
    /// the background server, waiting briefly for it to report readiness.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidError`] if already running, if remote mount resolution
    /// fails, or if the launcher reports an error within the listen-ready window.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.running {
            return Err(Error::InvalidError("PathSpaceHtmlServer already running".to_string()));
        }

        self.resolve_remote_mount()?;
        let port = choose_listen_port(self.remote.as_ref().map_or(0, |remote| remote.port))?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let listen_ready = Arc::new(AtomicBool::new(false));
        let listen_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));

        let space = Arc::clone(&self.space);
        let launcher = Arc::clone(&self.launcher);
        let thread_stop_flag = Arc::clone(&stop_flag);
        let thread_listen_ready = Arc::clone(&listen_ready);
        let thread_listen_error = Arc::clone(&listen_error);
        let reported = Arc::new(AtomicBool::new(false));

        let handle = thread::spawn(move || {
            let ready_reported = Arc::clone(&reported);
            let ready_flag = Arc::clone(&thread_listen_ready);
            let err_slot = Arc::clone(&thread_listen_error);
            let on_listen: crate::launcher::ReadyCallback = Box::new(move |outcome| {
                if ready_reported.swap(true, Ordering::AcqRel) {
                    return;
                }
                if let Err(err) = outcome {
                    *err_slot.lock() = Some(err);
                }
                ready_flag.store(true, Ordering::Release);
            });
            launcher(space, port, thread_stop_flag, on_listen);
        });

        let deadline = Instant::now() + LISTEN_READY_TIMEOUT;
        while !listen_ready.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(LISTEN_READY_POLL);
        }

        if let Some(err) = listen_error.lock().take() {
            warn!(error = %err, "PathSpaceHtmlServer failed to start");
            stop_flag.store(true, Ordering::Release);
            let _ = handle.join();
            return Err(err);
        }

        info!(port, "PathSpaceHtmlServer started");
        state.running = true;
        state.stop_flag = Some(stop_flag);
        state.thread = Some(handle);
        Ok(())
    }

    /// Flips the stop flag, joins the background thread, and clears run state.
    ///
    /// Idempotent: calling `stop` when not running is a no-op.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(stop_flag) = state.stop_flag.take() {
            stop_flag.store(true, Ordering::Release);
        }
        if let Some(handle) = state.thread.take() {
            let _ = handle.join();
        }
        if state.running {
            info!("PathSpaceHtmlServer stopped");
        }
        state.running = false;
    }
}

impl Drop for PathSpaceHtmlServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn forward_insert_and_read_apply_the_alias_prefix() {
        let space = Arc::new(PathSpace::new());
        let remote = RemoteMount { alias: "studio-1".to_string(), require_healthy: false, ..Default::default() };
        let facade = PathSpaceHtmlServer::new(space.clone(), Some(remote));

        facade.forward_insert("/x/y", 42i32).expect("forward insert");
        let value = space.read::<i32>("/remote/studio-1/x/y", Out::new()).expect("direct read");
        assert_eq!(value, 42);

        let forwarded: i32 = facade.forward_read("/x/y").expect("forward read");
        assert_eq!(forwarded, 42);
    }

    #[test]
    fn forward_without_remote_mount_passes_paths_through() {
        let space = Arc::new(PathSpace::new());
        let facade = PathSpaceHtmlServer::new(space.clone(), None);

        facade.forward_insert("/x/y", 7i32).expect("forward insert");
        let value = space.read::<i32>("/x/y", Out::new()).expect("direct read");
        assert_eq!(value, 7);
    }

    #[test]
    fn start_fails_closed_when_remote_requires_health_and_is_unset() {
        let space = Arc::new(PathSpace::new());
        let remote = RemoteMount { alias: "studio-1".to_string(), ..Default::default() };
        let facade = PathSpaceHtmlServer::new(space, Some(remote));

        assert!(facade.start().is_err());
        assert!(!facade.is_running());
    }

    #[test]
    fn start_succeeds_when_remote_reports_connected() {
        let space = Arc::new(PathSpace::new());
        space
            .insert("/inspector/metrics/remotes/studio-1/client/connected", 1i32, In::new())
            .errors
            .is_empty()
            .then_some(())
            .expect("seed connected flag");
        let remote = RemoteMount { alias: "studio-1".to_string(), ..Default::default() };
        let facade = PathSpaceHtmlServer::new(space, Some(remote));

        facade.start().expect("start");
        assert!(facade.is_running());
        facade.stop();
        assert!(!facade.is_running());
    }

    #[test]
    fn start_propagates_launcher_error() {
        let space = Arc::new(PathSpace::new());
        let facade = PathSpaceHtmlServer::new(space, None).with_launcher(Arc::new(|_space, _port, _stop, ready| {
            ready(Err(Error::InvalidError("boom".to_string())));
        }));

        let result = facade.start();
        assert!(result.is_err());
        assert!(!facade.is_running());
    }

    #[test]
    fn stop_is_idempotent_when_never_started() {
        let space = Arc::new(PathSpace::new());
        let facade = PathSpaceHtmlServer::new(space, None);
        facade.stop();
        facade.stop();
    }

    #[test]
    fn launcher_receives_the_chosen_port() {
        let space = Arc::new(PathSpace::new());
        let observed_port = Arc::new(AtomicUsize::new(0));
        let observed_for_launcher = Arc::clone(&observed_port);
        let remote = RemoteMount { require_healthy: false, port: 9090, ..Default::default() };
        let facade = PathSpaceHtmlServer::new(space, Some(remote)).with_launcher(Arc::new(move |_space, port, stop, ready| {
            observed_for_launcher.store(port as usize, Ordering::SeqCst);
            ready(Ok(()));
            while !stop.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(5));
            }
        }));

        facade.start().expect("start");
        facade.stop();
        assert_eq!(observed_port.load(Ordering::SeqCst), 9090);
    }
}
