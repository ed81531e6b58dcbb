// SPDX-License-Identifier: Apache-2.0
//! The shared event-provider skeleton (§4.6): a local deque, a condition
//! variable for blocked readers, and the mount binding captured at
//! `adopt_context_and_prefix`.

use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use pathspace_core::Context;
use std::sync::Arc;

/// The (context, prefix) pair a provider is bound to once mounted.
struct Binding {
    context: Arc<Context>,
    prefix: String,
}

/// A FIFO event queue shared by every provider in this crate.
///
/// `enqueue` follows the wake policy every provider contract names: signal
/// the local condvar first (for a thread blocked directly on this queue),
/// then `context.notify(prefix)` and `context.notify(prefix + "/events")` so
/// a `PathSpace` waiter pinned to this subtree wakes too.
pub struct EventQueue<T> {
    queue: Mutex<VecDeque<T>>,
    condvar: Condvar,
    binding: OnceLock<Binding>,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self { queue: Mutex::new(VecDeque::new()), condvar: Condvar::new(), binding: OnceLock::new() }
    }
}

impl<T> EventQueue<T> {
    /// Creates an empty, unbound queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds this queue to `context`/`prefix`. Called once, at mount time.
    ///
    /// A second call is a no-op: a provider is mounted exactly once in
    /// practice, and `OnceLock` makes a double-bind harmless rather than a
    /// panic.
    pub fn bind(&self, context: Arc<Context>, prefix: String) {
        let _ = self.binding.set(Binding { context, prefix });
    }

    /// Appends `event` and runs the local-then-shared wake policy.
    pub fn enqueue(&self, event: T) {
        self.queue.lock().push_back(event);
        self.condvar.notify_all();
        if let Some(binding) = self.binding.get() {
            binding.context.notify(&binding.prefix);
            binding.context.notify(&format!("{}/events", binding.prefix));
        }
    }

    /// Removes and returns the head event, if any, without blocking.
    pub fn pop_front(&self) -> Option<T> {
        self.queue.lock().pop_front()
    }

    /// Returns a clone of the head event, if any, without removing it.
    pub fn peek_front(&self) -> Option<T>
    where
        T: Clone,
    {
        self.queue.lock().front().cloned()
    }

    /// Blocks on the local condvar until an event is available or `deadline`
    /// passes, then removes and returns the head if `pop` is set, or clones
    /// it otherwise.
    pub fn wait_for_head(&self, deadline: Instant, pop: bool) -> Option<T>
    where
        T: Clone,
    {
        let mut queue = self.queue.lock();
        loop {
            if !queue.is_empty() {
                return if pop { queue.pop_front() } else { queue.front().cloned() };
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let timeout = deadline - now;
            let result = self.condvar.wait_for(&mut queue, timeout);
            if result.timed_out() && queue.is_empty() {
                return None;
            }
        }
    }

    /// `true` if the queue currently has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Clamps `value` into `[0.0, 1.0]`, used by haptics command validation.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Converts a caller-supplied timeout into an absolute deadline.
#[must_use]
pub fn deadline_from(timeout: Duration) -> Instant {
    Instant::now() + timeout
}
