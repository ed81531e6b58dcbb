// SPDX-License-Identifier: Apache-2.0
//! Trie node and per-node FIFO queue (C2).

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Error;
use crate::value::AnyValue;

/// A single vertex of the path trie.
///
/// Each node owns a FIFO queue of heterogeneous values and a map from child
/// component name to child node. The queue and the child map are guarded by
/// independent locks so a reader walking past this node does not block a
/// concurrent `enqueue`/`peek_head`/`pop_head` at this node, and vice versa.
#[derive(Debug, Default)]
pub struct Node {
    children: Mutex<BTreeMap<String, Arc<Node>>>,
    queue: Mutex<VecDeque<AnyValue>>,
}

impl Node {
    /// Creates an empty node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing child named `component`, creating it first if absent.
    ///
    /// Takes this node's child-map lock only for the duration of the lookup
    /// and, on miss, the single insert; it is not held across recursive
    /// descent.
    pub fn child_or_create(self: &Arc<Self>, component: &str) -> Arc<Node> {
        let mut children = self.children.lock();
        if let Some(existing) = children.get(component) {
            return Arc::clone(existing);
        }
        let child = Arc::new(Node::new());
        children.insert(component.to_string(), Arc::clone(&child));
        child
    }

    /// Returns the existing child named `component`, or `None`.
    #[must_use]
    pub fn child(&self, component: &str) -> Option<Arc<Node>> {
        self.children.lock().get(component).cloned()
    }

    /// Returns the names of all direct children, in sorted order.
    #[must_use]
    pub fn child_names(&self) -> Vec<String> {
        self.children.lock().keys().cloned().collect()
    }

    /// Appends `value` to the tail of this node's queue.
    pub fn enqueue<T: Any + Send + Sync>(&self, value: T) {
        self.queue.lock().push_back(AnyValue::new(value));
    }

    /// Returns `true` if this node's queue currently has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Clones and returns the head entry's `T` without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoObjectFound`] if the queue is empty, or
    /// [`Error::TypeMismatch`] if the head's runtime type is not `T`.
    pub fn peek_head<T: Any + Clone + Send + Sync>(&self) -> Result<T, Error> {
        let queue = self.queue.lock();
        let head = queue.front().ok_or(Error::NoObjectFound)?;
        head.downcast_ref::<T>().cloned().ok_or_else(|| Error::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: head.type_name(),
        })
    }

    /// Removes and returns the head entry's `T` if it matches.
    ///
    /// If the head exists but its type does not match `T`, it is left in
    /// place (a type mismatch is not a consuming operation).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoObjectFound`] if the queue is empty, or
    /// [`Error::TypeMismatch`] if the head's runtime type is not `T`.
    pub fn pop_head<T: Any + Send + Sync>(&self) -> Result<T, Error> {
        let mut queue = self.queue.lock();
        {
            let head = queue.front().ok_or(Error::NoObjectFound)?;
            if !head.is::<T>() {
                return Err(Error::TypeMismatch {
                    expected: std::any::type_name::<T>(),
                    found: head.type_name(),
                });
            }
        }
        // The match above guarantees this downcast succeeds.
        let entry = queue.pop_front().ok_or(Error::NoObjectFound)?;
        entry.downcast::<T>().map_err(|_| Error::UnknownError("head changed under lock".to_string()))
    }

    /// Removes and discards every queued value and every child subtree.
    pub fn clear(&self) {
        self.queue.lock().clear();
        self.children.lock().clear();
    }

    /// Number of entries currently queued at this node.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_then_peek_does_not_consume() {
        let node = Node::new();
        node.enqueue(7_i32);
        assert_eq!(node.peek_head::<i32>().unwrap(), 7);
        assert_eq!(node.peek_head::<i32>().unwrap(), 7);
        assert_eq!(node.len(), 1);
    }

    #[test]
    fn pop_head_consumes_in_fifo_order() {
        let node = Node::new();
        node.enqueue(1_i32);
        node.enqueue(2_i32);
        assert_eq!(node.pop_head::<i32>().unwrap(), 1);
        assert_eq!(node.pop_head::<i32>().unwrap(), 2);
        assert!(matches!(node.pop_head::<i32>(), Err(Error::NoObjectFound)));
    }

    #[test]
    fn type_mismatch_does_not_consume() {
        let node = Node::new();
        node.enqueue(1_i32);
        assert!(matches!(node.pop_head::<String>(), Err(Error::TypeMismatch { .. })));
        assert_eq!(node.pop_head::<i32>().unwrap(), 1);
    }

    #[test]
    fn child_or_create_is_idempotent() {
        let root = Arc::new(Node::new());
        let a1 = root.child_or_create("a");
        let a2 = root.child_or_create("a");
        assert!(Arc::ptr_eq(&a1, &a2));
        assert_eq!(root.child_names(), vec!["a".to_string()]);
    }

    #[test]
    fn clear_removes_queue_and_children() {
        let root = Arc::new(Node::new());
        root.enqueue(1_i32);
        let _ = root.child_or_create("a");
        root.clear();
        assert!(root.is_empty());
        assert!(root.child_names().is_empty());
    }
}
