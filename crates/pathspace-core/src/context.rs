// SPDX-License-Identifier: Apache-2.0
//! Notification bus (C3): waiter registration, wake, and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::Error;
use crate::path::PathIter;

/// A single waiter's wake channel.
///
/// Shared between the waiter (which blocks on [`Mailbox::wait_timeout`]) and
/// the notifier (which flips `signaled` and notifies the condvar). A mailbox
/// may be signaled more than once before its waiter observes it; wakes are
/// idempotent and the waiter always re-checks its own predicate.
#[derive(Debug, Default)]
struct Mailbox {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl Mailbox {
    fn signal(&self) {
        *self.signaled.lock() = true;
        self.condvar.notify_all();
    }

    /// Blocks until signaled or `deadline`, returning `true` if signaled.
    ///
    /// Consumes the signal on return so a subsequent wait starts fresh.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut signaled = self.signaled.lock();
        if *signaled {
            *signaled = false;
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let timeout = deadline - now;
        let result = self.condvar.wait_for(&mut signaled, timeout);
        let was_signaled = *signaled || !result.timed_out();
        *signaled = false;
        was_signaled
    }
}

struct WaiterEntry {
    prefix: Vec<String>,
    mailbox: Arc<Mailbox>,
}

/// A handle to a registered waiter, used to block on it and to deregister it.
pub struct WaiterHandle<'ctx> {
    context: &'ctx Context,
    mailbox: Arc<Mailbox>,
    index: usize,
}

impl WaiterHandle<'_> {
    /// Blocks until this waiter is signaled or `deadline` passes.
    ///
    /// Returns `true` if signaled (the caller should re-check its
    /// predicate; wakes may be spurious), `false` on deadline or shutdown.
    #[must_use]
    pub fn wait_until(&self, deadline: Instant) -> bool {
        if self.context.shutdown.load(Ordering::Acquire) {
            return false;
        }
        self.mailbox.wait_until(deadline)
    }
}

impl Drop for WaiterHandle<'_> {
    fn drop(&mut self) {
        self.context.deregister(self.index);
    }
}

/// The shared notification bus a [`PathSpace`](crate)-like store uses to wake
/// blocked `read`/`take` callers.
#[derive(Default)]
pub struct Context {
    waiters: Mutex<Vec<Option<WaiterEntry>>>,
    shutdown: AtomicBool,
}

impl Context {
    /// Creates an empty, non-shutdown context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter pinned to `prefix`.
    ///
    /// The returned handle's [`WaiterHandle::wait_until`] suspends the
    /// caller until [`Context::notify`]/[`Context::notify_all`] wakes it or
    /// the caller-supplied deadline passes. Dropping the handle deregisters
    /// the waiter.
    pub fn register(&self, prefix: &str) -> WaiterHandle<'_> {
        let mailbox = Arc::new(Mailbox::default());
        let entry = WaiterEntry {
            prefix: PathIter::new(prefix).map(str::to_string).collect(),
            mailbox: Arc::clone(&mailbox),
        };
        let mut waiters = self.waiters.lock();
        let index = waiters.iter().position(Option::is_none).unwrap_or(waiters.len());
        if index == waiters.len() {
            waiters.push(Some(entry));
        } else {
            waiters[index] = Some(entry);
        }
        drop(waiters);
        tracing::debug!(prefix, "waiter registered");
        WaiterHandle { context: self, mailbox, index }
    }

    fn deregister(&self, index: usize) {
        let mut waiters = self.waiters.lock();
        if let Some(slot) = waiters.get_mut(index) {
            *slot = None;
        }
    }

    /// Wakes every waiter whose registered prefix is a prefix-of, or equal
    /// to, `path`.
    pub fn notify(&self, path: &str) {
        let path_components: Vec<&str> = PathIter::new(path).collect();
        let waiters = self.waiters.lock();
        let mut woken = 0usize;
        for entry in waiters.iter().flatten() {
            if is_prefix_of(&entry.prefix, &path_components) {
                entry.mailbox.signal();
                woken += 1;
            }
        }
        drop(waiters);
        tracing::trace!(path, woken, "notify");
    }

    /// Wakes every registered waiter, regardless of prefix.
    pub fn notify_all(&self) {
        let waiters = self.waiters.lock();
        for entry in waiters.iter().flatten() {
            entry.mailbox.signal();
        }
        drop(waiters);
        tracing::debug!("notify_all");
    }

    /// Marks this context shut down and wakes every waiter.
    ///
    /// A waiter that observes shutdown via [`WaiterHandle::wait_until`]
    /// returning `false` should treat it the same as a deadline expiry.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.notify_all();
        tracing::info!("context shutdown");
    }

    /// Returns `true` once [`Context::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

fn is_prefix_of(prefix: &[String], path: &[&str]) -> bool {
    if prefix.len() > path.len() {
        return false;
    }
    prefix.iter().zip(path.iter()).all(|(a, b)| a == b)
}

/// Blocks `waiter` until `predicate` succeeds or `deadline` passes, retrying
/// `predicate` after every wake (spurious or genuine).
///
/// This is the shared loop behind `read`/`take`'s blocking protocol: the
/// fast-path peek/pop has already failed once before this is called.
/// `NoSuchPath` is retried the same as `NoObjectFound` — a node created by a
/// concurrent `insert` after the fast-path check is exactly the case a
/// blocking caller is waiting on.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if `deadline` passes without `predicate`
/// succeeding.
pub fn wait_for<T>(
    waiter: &WaiterHandle<'_>,
    deadline: Instant,
    mut predicate: impl FnMut() -> Result<T, Error>,
) -> Result<T, Error> {
    loop {
        match predicate() {
            Err(Error::NoObjectFound | Error::NoSuchPath(_)) => {}
            other => return other,
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout);
        }
        if !waiter.wait_until(deadline) && Instant::now() >= deadline {
            return Err(Error::Timeout);
        }
    }
}

/// A caller-supplied duration turned into an absolute deadline from now.
#[must_use]
pub fn deadline_from(timeout: Duration) -> Instant {
    Instant::now() + timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn notify_wakes_waiter_at_exact_path() {
        let ctx = Context::new();
        let waiter = ctx.register("/a/b");
        ctx.notify("/a/b");
        assert!(waiter.wait_until(Instant::now() + Duration::from_millis(50)));
    }

    #[test]
    fn notify_wakes_waiter_registered_at_ancestor_prefix() {
        let ctx = Context::new();
        let waiter = ctx.register("/a");
        ctx.notify("/a/b/c");
        assert!(waiter.wait_until(Instant::now() + Duration::from_millis(50)));
    }

    #[test]
    fn notify_does_not_wake_waiter_registered_at_descendant() {
        let ctx = Context::new();
        let waiter = ctx.register("/a/b/c");
        ctx.notify("/a/b");
        assert!(!waiter.wait_until(Instant::now() + Duration::from_millis(20)));
    }

    #[test]
    fn notify_does_not_wake_unrelated_prefix() {
        let ctx = Context::new();
        let waiter = ctx.register("/x");
        ctx.notify("/a/b");
        assert!(!waiter.wait_until(Instant::now() + Duration::from_millis(20)));
    }

    #[test]
    fn deadline_expires_without_signal() {
        let ctx = Context::new();
        let waiter = ctx.register("/a");
        let start = Instant::now();
        assert!(!waiter.wait_until(Instant::now() + Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn shutdown_wakes_all_waiters() {
        let ctx = Arc::new(Context::new());
        let ctx2 = Arc::clone(&ctx);
        let handle = thread::spawn(move || {
            let waiter = ctx2.register("/a");
            waiter.wait_until(Instant::now() + Duration::from_secs(5))
        });
        thread::sleep(Duration::from_millis(20));
        ctx.shutdown();
        assert!(handle.join().unwrap());
        assert!(ctx.is_shutdown());
    }

    #[test]
    fn cross_thread_notify_wakes_blocked_waiter_promptly() {
        let ctx = Arc::new(Context::new());
        let ctx2 = Arc::clone(&ctx);
        let handle = thread::spawn(move || {
            let waiter = ctx2.register("/w");
            waiter.wait_until(Instant::now() + Duration::from_secs(5))
        });
        thread::sleep(Duration::from_millis(10));
        let start = Instant::now();
        ctx.notify("/w");
        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
