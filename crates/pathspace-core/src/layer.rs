// SPDX-License-Identifier: Apache-2.0
//! The layer provider contract (C4).
//!
//! A [`Layer`] is anything that can be mounted at a path prefix and take
//! over `insert`/`read`/`take` for everything under it: the base trie
//! itself is not a `Layer`, but the mouse/keyboard/gamepad/discovery/stdout
//! providers in `pathspace-io` are, and so is any custom provider a caller
//! wants to mount. Dispatch is interface-based (a trait object), not a
//! class hierarchy: there is exactly one contract every provider satisfies,
//! no shared base-provider state to inherit.

use std::any::Any;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::options::Out;

/// The result of an `insert` against a node or a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReturn {
    /// Number of values successfully enqueued.
    pub nbr_values_inserted: usize,
    /// Per-target errors, paired with the path that produced them.
    pub errors: Vec<(String, Error)>,
}

impl InsertReturn {
    /// An empty result: nothing inserted, nothing failed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `other`'s counts and errors into `self`.
    pub fn merge(&mut self, other: Self) {
        self.nbr_values_inserted += other.nbr_values_inserted;
        self.errors.extend(other.errors);
    }
}

/// A value accepted by [`Layer::insert`], type-erased at the call boundary.
///
/// Providers downcast via [`LayerValue::downcast_ref`]/[`LayerValue::into_any`]
/// to recover their specific event/command type.
pub struct LayerValue(Box<dyn Any + Send + Sync>);

impl LayerValue {
    /// Wraps a concrete value for a [`Layer::insert`] call.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Borrows the boxed value as `T`, or `None` if it does not match.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Consumes the wrapper, returning the boxed `dyn Any` for a final downcast.
    #[must_use]
    pub fn into_any(self) -> Box<dyn Any + Send + Sync> {
        self.0
    }
}

/// A destination for a [`Layer::out`] call to write its result into.
///
/// Wraps a caller-owned `&mut Option<T>` for some `T` the provider does not
/// know ahead of time; it attempts a downcast of the slot's contents
/// against its own event type and reports a type mismatch if that fails,
/// rather than assuming the caller wanted its type.
pub struct OutSlot<'a>(&'a mut dyn Any);

impl<'a> OutSlot<'a> {
    /// Wraps a `&mut Option<T>` destination; `write::<T>` succeeds only
    /// against the same `T` this was constructed with.
    pub fn new<T: Any>(dest: &'a mut Option<T>) -> Self {
        Self(dest)
    }

    /// Writes `Some(value)` into the slot if its type matches, returning
    /// the mismatched value back via `Err` otherwise.
    pub fn write<T: Any>(&mut self, value: T) -> Result<(), T> {
        match self.0.downcast_mut::<Option<T>>() {
            Some(dest) => {
                *dest = Some(value);
                Ok(())
            }
            None => Err(value),
        }
    }
}

/// The capability set every mountable provider implements.
///
/// Dispatch in [`PathSpace`](crate) is purely interface-based: a provider is
/// a `dyn Layer`, mounted at a prefix, consulted on every operation under
/// that prefix. There is no deep inheritance between provider kinds — the
/// mouse, keyboard, gamepad, pointer-mixer, device-discovery, and stdout
/// providers in `pathspace-io` are unrelated types that each implement this
/// one trait.
pub trait Layer: Send + Sync {
    /// Accepts `value` for the path tail (relative to this layer's mount
    /// point). Returns how many values were inserted and any per-target
    /// errors (most providers insert at most one value per call).
    fn insert(&self, tail: &str, value: LayerValue) -> InsertReturn;

    /// Serves a read/take against the path tail, writing the result (if
    /// any) into `slot`.
    ///
    /// Returns `None` on success, `Some(Error::NoObjectFound)` if nothing is
    /// available (non-blocking path only — blocking is handled by the
    /// caller via [`Layer::adopt_context_and_prefix`]'s registered context),
    /// or another `Error` for unsupported operations/type mismatches.
    fn out(&self, tail: &str, options: &Out, slot: &mut OutSlot<'_>) -> Option<Error>;

    /// Releases any resources (worker threads, OS handles) this layer holds.
    ///
    /// Idempotent: called at most once by the mount table, but providers
    /// must tolerate being called zero times (e.g. process exit).
    fn shutdown(&self);

    /// The provider's inbound wake channel. Usually a no-op: most providers
    /// notify themselves locally on `insert` and rely on the shared
    /// [`Context`] for `notify`. Exists so a provider can react to an
    /// external wake it did not itself originate.
    fn notify(&self, _path: &str) {}

    /// Binds this layer to the shared notification bus and the path prefix
    /// it was mounted at. Called exactly once, at mount time.
    fn adopt_context_and_prefix(&self, context: Arc<Context>, prefix: String);
}
