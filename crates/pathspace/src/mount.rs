// SPDX-License-Identifier: Apache-2.0
//! Layer dispatch (C4): the mount table and prefix resolution.

use std::sync::{Arc, RwLock};

use pathspace_core::{path::PathIter, Context, Error, Layer};

/// A single (subtree-prefix, provider) binding.
///
/// A prefix claim is exclusive: mounting a second provider at, under, or
/// over an already-mounted prefix is rejected (§ GLOSSARY "Layer mount";
/// nesting providers is explicitly disallowed).
struct Mount {
    prefix: Vec<String>,
    layer: Arc<dyn Layer>,
}

/// The set of layer providers mounted on a store, plus the shared
/// notification bus every mounted provider was bound to.
#[derive(Default)]
pub struct MountTable {
    mounts: RwLock<Vec<Mount>>,
}

/// The outcome of resolving a path against the mount table.
pub enum Resolution {
    /// No mounted layer claims this path; the base trie serves it.
    Base,
    /// A layer claims this path; dispatch to it with the given tail.
    Layer {
        /// The provider that owns this subtree.
        layer: Arc<dyn Layer>,
        /// The path remaining after stripping the provider's mount prefix,
        /// always starting with `/` (or exactly `/` for the mount root
        /// itself).
        tail: String,
    },
}

impl MountTable {
    /// Creates an empty mount table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `layer` at `prefix`, binding it to `context`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPermissions`] if `prefix` is already claimed,
    /// nests inside an existing mount, or would itself contain one.
    pub fn mount(&self, context: &Arc<Context>, prefix: &str, layer: Arc<dyn Layer>) -> Result<(), Error> {
        let components: Vec<String> = PathIter::new(prefix).map(str::to_string).collect();
        let mut mounts = self.mounts.write().map_err(|_| poisoned())?;
        for existing in mounts.iter() {
            if is_prefix_of(&existing.prefix, &components) || is_prefix_of(&components, &existing.prefix) {
                return Err(Error::InvalidPermissions(format!(
                    "mount prefix {prefix} conflicts with an existing mount"
                )));
            }
        }
        layer.adopt_context_and_prefix(Arc::clone(context), prefix.to_string());
        mounts.push(Mount { prefix: components, layer });
        tracing::info!(prefix, "layer mounted");
        Ok(())
    }

    /// Removes the mount at exactly `prefix`, shutting its layer down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPath`] if no mount exists at exactly `prefix`.
    pub fn unmount(&self, prefix: &str) -> Result<(), Error> {
        let components: Vec<String> = PathIter::new(prefix).map(str::to_string).collect();
        let mut mounts = self.mounts.write().map_err(|_| poisoned())?;
        let index = mounts
            .iter()
            .position(|m| m.prefix == components)
            .ok_or_else(|| Error::NoSuchPath(prefix.to_string()))?;
        let removed = mounts.remove(index);
        removed.layer.shutdown();
        tracing::info!(prefix, "layer unmounted");
        Ok(())
    }

    /// Resolves `path` against the mount table.
    ///
    /// # Errors
    ///
    /// Returns an error only if the mount table's internal lock is
    /// poisoned by a panicking holder.
    pub fn resolve(&self, path: &str) -> Result<Resolution, Error> {
        let components: Vec<String> = PathIter::new(path).map(str::to_string).collect();
        let mounts = self.mounts.read().map_err(|_| poisoned())?;
        for mount in mounts.iter() {
            if is_prefix_of(&mount.prefix, &components) {
                let tail_components = &components[mount.prefix.len()..];
                let tail = if tail_components.is_empty() {
                    "/".to_string()
                } else {
                    format!("/{}", tail_components.join("/"))
                };
                return Ok(Resolution::Layer { layer: Arc::clone(&mount.layer), tail });
            }
        }
        Ok(Resolution::Base)
    }

    /// Shuts down and removes every mounted layer.
    pub fn clear(&self) {
        let Ok(mut mounts) = self.mounts.write() else { return };
        for mount in mounts.drain(..) {
            mount.layer.shutdown();
        }
    }
}

fn is_prefix_of(prefix: &[String], path: &[String]) -> bool {
    if prefix.len() > path.len() {
        return false;
    }
    prefix.iter().zip(path.iter()).all(|(a, b)| a == b)
}

fn poisoned() -> Error {
    Error::UnknownError("mount table lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathspace_core::{InsertReturn, LayerValue, OutSlot};

    struct NoopLayer;

    impl Layer for NoopLayer {
        fn insert(&self, _tail: &str, _value: LayerValue) -> InsertReturn {
            InsertReturn::new()
        }

        fn out(&self, _tail: &str, _options: &pathspace_core::Out, _slot: &mut OutSlot<'_>) -> Option<Error> {
            None
        }

        fn shutdown(&self) {}

        fn adopt_context_and_prefix(&self, _context: Arc<Context>, _prefix: String) {}
    }

    #[test]
    fn resolve_finds_exact_mount() {
        let table = MountTable::new();
        let ctx = Arc::new(Context::new());
        table.mount(&ctx, "/dev/mouse", Arc::new(NoopLayer)).unwrap();
        match table.resolve("/dev/mouse").unwrap() {
            Resolution::Layer { tail, .. } => assert_eq!(tail, "/"),
            Resolution::Base => panic!("expected layer match"),
        }
    }

    #[test]
    fn resolve_finds_mount_for_descendant_with_tail() {
        let table = MountTable::new();
        let ctx = Arc::new(Context::new());
        table.mount(&ctx, "/dev/mouse", Arc::new(NoopLayer)).unwrap();
        match table.resolve("/dev/mouse/move").unwrap() {
            Resolution::Layer { tail, .. } => assert_eq!(tail, "/move"),
            Resolution::Base => panic!("expected layer match"),
        }
    }

    #[test]
    fn resolve_falls_through_to_base() {
        let table = MountTable::new();
        assert!(matches!(table.resolve("/a/b").unwrap(), Resolution::Base));
    }

    #[test]
    fn mount_rejects_nesting_under_existing() {
        let table = MountTable::new();
        let ctx = Arc::new(Context::new());
        table.mount(&ctx, "/dev", Arc::new(NoopLayer)).unwrap();
        assert!(table.mount(&ctx, "/dev/mouse", Arc::new(NoopLayer)).is_err());
    }

    #[test]
    fn mount_rejects_nesting_over_existing() {
        let table = MountTable::new();
        let ctx = Arc::new(Context::new());
        table.mount(&ctx, "/dev/mouse", Arc::new(NoopLayer)).unwrap();
        assert!(table.mount(&ctx, "/dev", Arc::new(NoopLayer)).is_err());
    }

    #[test]
    fn unmount_removes_binding() {
        let table = MountTable::new();
        let ctx = Arc::new(Context::new());
        table.mount(&ctx, "/dev/mouse", Arc::new(NoopLayer)).unwrap();
        table.unmount("/dev/mouse").unwrap();
        assert!(matches!(table.resolve("/dev/mouse").unwrap(), Resolution::Base));
    }
}
