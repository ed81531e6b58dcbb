// SPDX-License-Identifier: Apache-2.0
//! The public `PathSpace` store (C5): `insert`/`read`/`take`/`list_children`/`clear`.

use std::any::Any;
use std::sync::Arc;

use pathspace_core::context::{deadline_from, wait_for};
use pathspace_core::path::{self, PathIter, ValidationLevel};
use pathspace_core::{Context, Error, In, InsertReturn, LayerValue, Node, Out, OutSlot, Result};

use crate::mount::{MountTable, Resolution};

/// An in-process, hierarchical, content-addressed datastore.
///
/// Values are inserted and retrieved by path; paths may be concrete or glob
/// patterns (insert expands a glob to every path it currently matches).
/// Subtrees may be claimed by a mounted [`pathspace_core::Layer`], which
/// then services every operation under that prefix instead of the base
/// trie.
pub struct PathSpace {
    root: Arc<Node>,
    context: Arc<Context>,
    mounts: MountTable,
}

impl Default for PathSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl PathSpace {
    /// Creates an empty store with no mounted layers.
    #[must_use]
    pub fn new() -> Self {
        Self { root: Arc::new(Node::new()), context: Arc::new(Context::new()), mounts: MountTable::new() }
    }

    /// The shared notification bus, for providers that need to be
    /// constructed before being mounted (most providers bind it via
    /// [`pathspace_core::Layer::adopt_context_and_prefix`] instead, but a
    /// caller may want to inspect shutdown state directly).
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Mounts `layer` exclusively at `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPermissions`] if `prefix` conflicts with an
    /// existing mount (nested or overlapping).
    pub fn mount(&self, prefix: &str, layer: Arc<dyn pathspace_core::Layer>) -> Result<()> {
        path::validate(prefix, ValidationLevel::Basic)?;
        self.mounts.mount(&self.context, prefix, layer)
    }

    /// Unmounts the layer at exactly `prefix`, shutting it down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPath`] if no mount exists at exactly `prefix`.
    pub fn unmount(&self, prefix: &str) -> Result<()> {
        self.mounts.unmount(prefix)
    }

    /// Inserts `value` at `path`.
    ///
    /// If `path` is a glob, it is expanded against the current trie and
    /// `value` is cloned into every matching concrete path; the returned
    /// count and errors are summed/collected across all targets. A glob
    /// matching nothing inserts nothing and reports no error (there was
    /// nothing to insert into).
    pub fn insert<T: Any + Clone + Send + Sync>(&self, path: &str, value: T, options: In) -> InsertReturn {
        if let Err(err) = path::validate(path, options.validation_level) {
            let mut result = InsertReturn::new();
            result.errors.push((path.to_string(), err));
            return result;
        }

        if path::is_glob(path) {
            let components: Vec<String> = PathIter::new(path).map(str::to_string).collect();
            let mut targets = Vec::new();
            expand_glob(&self.root, &components, Vec::new(), &mut targets);
            let mut result = InsertReturn::new();
            for target in targets {
                let target_path = format!("/{}", target.join("/"));
                result.merge(self.insert_concrete(&target_path, value.clone()));
            }
            result
        } else {
            self.insert_concrete(path, value)
        }
    }

    fn insert_concrete<T: Any + Send + Sync>(&self, path: &str, value: T) -> InsertReturn {
        match self.mounts.resolve(path) {
            Ok(Resolution::Layer { layer, tail }) => {
                let result = layer.insert(&tail, LayerValue::new(value));
                if result.nbr_values_inserted > 0 {
                    self.context.notify(path);
                }
                result
            }
            Ok(Resolution::Base) => {
                let node = resolve_or_create(&self.root, path);
                node.enqueue(value);
                self.context.notify(path);
                tracing::trace!(path, "enqueued");
                let mut result = InsertReturn::new();
                result.nbr_values_inserted = 1;
                result
            }
            Err(err) => {
                let mut result = InsertReturn::new();
                result.errors.push((path.to_string(), err));
                result
            }
        }
    }

    /// Non-destructively reads the head value at `path`.
    ///
    /// With `options.do_block`, suspends (up to `options.timeout`) until a
    /// matching value becomes available via the notification bus.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoObjectFound`] (non-blocking empty), [`Error::Timeout`]
    /// (blocking deadline elapsed), or [`Error::TypeMismatch`] (head present
    /// but wrong type).
    pub fn read<T: Any + Clone + Send + Sync>(&self, path: &str, options: Out) -> Result<T> {
        self.access(path, options, false)
    }

    /// As [`PathSpace::read`], but removes the head on success.
    ///
    /// # Errors
    ///
    /// Same as [`PathSpace::read`].
    pub fn take<T: Any + Clone + Send + Sync>(&self, path: &str, options: Out) -> Result<T> {
        self.access(path, options, true)
    }

    fn access<T: Any + Clone + Send + Sync>(&self, path: &str, options: Out, pop: bool) -> Result<T> {
        path::validate(path, options.validation_level)?;

        // A mounted layer owns its blocking protocol entirely (its own
        // condition variable per §4.6); it gets exactly one call with the
        // caller's real options, not the base trie's retry-on-notify loop.
        if let Resolution::Layer { layer, tail } = self.mounts.resolve(path)? {
            let layer_options = Out { do_pop: pop, ..options };
            let mut slot: Option<T> = None;
            let mut out_slot = OutSlot::new(&mut slot);
            if let Some(err) = layer.out(&tail, &layer_options, &mut out_slot) {
                return Err(err);
            }
            return slot.ok_or(Error::NoObjectFound);
        }

        let fast_path = || self.access_base::<T>(path, pop);

        match fast_path() {
            Ok(value) => return Ok(value),
            Err(Error::NoObjectFound | Error::NoSuchPath(_)) if options.do_block => {}
            Err(other) => return Err(other),
        }

        let deadline = deadline_from(options.timeout);
        let waiter = self.context.register(path);
        let span = tracing::debug_span!("blocking_access", path, pop);
        let _entered = span.enter();
        wait_for(&waiter, deadline, fast_path)
    }

    fn access_base<T: Any + Clone + Send + Sync>(&self, path: &str, pop: bool) -> Result<T> {
        let node = resolve(&self.root, path).ok_or_else(|| Error::NoSuchPath(path.to_string()))?;
        if pop {
            node.pop_head::<T>()
        } else {
            node.peek_head::<T>()
        }
    }

    /// Lists the direct children of `path`, in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPath`] if `path` does not resolve to a node.
    pub fn list_children(&self, path: &str) -> Result<Vec<String>> {
        let node = resolve(&self.root, path).ok_or_else(|| Error::NoSuchPath(path.to_string()))?;
        Ok(node.child_names())
    }

    /// Drains every queued value and every child subtree, and shuts down
    /// every mounted layer.
    ///
    /// Concurrent waiters observe the store as empty afterward; they either
    /// time out or will see a later `shutdown`.
    pub fn clear(&self) {
        self.root.clear();
        self.mounts.clear();
        tracing::info!("store cleared");
    }

    /// Shuts down every mounted layer and wakes every waiter, who will then
    /// fail fast instead of waiting out their deadline.
    pub fn shutdown(&self) {
        self.mounts.clear();
        self.context.shutdown();
    }
}

fn resolve(root: &Arc<Node>, path: &str) -> Option<Arc<Node>> {
    let mut current = Arc::clone(root);
    for component in PathIter::new(path) {
        current = current.child(component)?;
    }
    Some(current)
}

fn resolve_or_create(root: &Arc<Node>, path: &str) -> Arc<Node> {
    let mut current = Arc::clone(root);
    for component in PathIter::new(path) {
        current = current.child_or_create(component);
    }
    current
}

fn expand_glob(node: &Arc<Node>, remaining: &[String], prefix: Vec<String>, out: &mut Vec<Vec<String>>) {
    let Some((component, rest)) = remaining.split_first() else {
        out.push(prefix);
        return;
    };
    if path::is_glob(component) {
        for name in node.child_names() {
            if path::match_names(component, &name) {
                if let Some(child) = node.child(&name) {
                    let mut next_prefix = prefix.clone();
                    next_prefix.push(name);
                    expand_glob(&child, rest, next_prefix, out);
                }
            }
        }
    } else if let Some(child) = node.child(component) {
        let mut next_prefix = prefix;
        next_prefix.push(component.clone());
        expand_glob(&child, rest, next_prefix, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn insert_then_read_roundtrips() {
        let space = PathSpace::new();
        space.insert("/a/b", 42_i32, In::new());
        assert_eq!(space.read::<i32>("/a/b", Out::new()).unwrap(), 42);
    }

    #[test]
    fn read_does_not_consume() {
        let space = PathSpace::new();
        space.insert("/a", 1_i32, In::new());
        assert_eq!(space.read::<i32>("/a", Out::new()).unwrap(), 1);
        assert_eq!(space.read::<i32>("/a", Out::new()).unwrap(), 1);
    }

    #[test]
    fn take_consumes_in_fifo_order() {
        let space = PathSpace::new();
        space.insert("/a", 1_i32, In::new());
        space.insert("/a", 2_i32, In::new());
        assert_eq!(space.take::<i32>("/a", Out::new()).unwrap(), 1);
        assert_eq!(space.take::<i32>("/a", Out::new()).unwrap(), 2);
    }

    #[test]
    fn read_on_missing_path_is_no_such_path() {
        let space = PathSpace::new();
        assert!(matches!(space.read::<i32>("/missing", Out::new()), Err(Error::NoSuchPath(_))));
    }

    #[test]
    fn read_on_empty_queue_is_no_object_found() {
        let space = PathSpace::new();
        space.insert("/a", 1_i32, In::new());
        let _ = space.take::<i32>("/a", Out::new());
        assert!(matches!(space.read::<i32>("/a", Out::new()), Err(Error::NoObjectFound)));
    }

    #[test]
    fn glob_insert_fans_out_to_matching_children() {
        let space = PathSpace::new();
        space.insert("/dev/mouse/x", 0_i32, In::new());
        space.insert("/dev/keyboard/x", 0_i32, In::new());
        let result = space.insert("/dev/*/x", 99_i32, In::new());
        assert_eq!(result.nbr_values_inserted, 2);
        assert_eq!(space.take::<i32>("/dev/mouse/x", Out::new()).unwrap(), 99);
    }

    #[test]
    fn glob_insert_matching_nothing_inserts_nothing() {
        let space = PathSpace::new();
        let result = space.insert("/dev/*/x", 99_i32, In::new());
        assert_eq!(result.nbr_values_inserted, 0);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn list_children_is_sorted() {
        let space = PathSpace::new();
        space.insert("/a/z", 1_i32, In::new());
        space.insert("/a/b", 1_i32, In::new());
        assert_eq!(space.list_children("/a").unwrap(), vec!["b".to_string(), "z".to_string()]);
    }

    #[test]
    fn clear_empties_store() {
        let space = PathSpace::new();
        space.insert("/a/b", 1_i32, In::new());
        space.clear();
        assert!(matches!(space.read::<i32>("/a/b", Out::new()), Err(Error::NoSuchPath(_))));
    }

    #[test]
    fn blocking_read_wakes_on_insert_from_other_thread() {
        let space = StdArc::new(PathSpace::new());
        let reader_space = StdArc::clone(&space);
        let handle = thread::spawn(move || {
            reader_space.take::<i32>("/w", Out::new() | pathspace_core::Block(Duration::from_millis(500)))
        });
        thread::sleep(Duration::from_millis(10));
        space.insert("/w", 42_i32, In::new());
        assert_eq!(handle.join().unwrap().unwrap(), 42);
    }

    #[test]
    fn blocking_read_on_missing_path_times_out() {
        let space = PathSpace::new();
        let start = std::time::Instant::now();
        let result =
            space.take::<i32>("/missing", Out::new() | pathspace_core::Block(Duration::from_millis(20)));
        assert!(matches!(result, Err(Error::Timeout)));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(18) && elapsed < Duration::from_millis(200));
    }

    #[test]
    fn per_producer_order_is_preserved() {
        let space = StdArc::new(PathSpace::new());
        let producer_space = StdArc::clone(&space);
        let handle = thread::spawn(move || {
            for i in 0..50 {
                producer_space.insert("/p", i, In::new());
            }
        });
        handle.join().unwrap();
        for i in 0..50 {
            assert_eq!(space.take::<i32>("/p", Out::new()).unwrap(), i);
        }
    }
}
