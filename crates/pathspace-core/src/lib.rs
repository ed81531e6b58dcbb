// SPDX-License-Identifier: Apache-2.0
//! Path model, trie node/queue, notification bus, layer contract, and
//! access options shared by every PathSpace crate.
//!
//! This crate has no I/O and no concrete store: it is the vocabulary
//! `pathspace`, `pathspace-io`, `pathspace-scene`, and `pathspace-html` all
//! build on.

#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod layer;
pub mod node;
pub mod options;
pub mod path;
pub mod value;

pub use context::Context;
pub use error::{Error, Result};
pub use layer::{InsertReturn, Layer, LayerValue, OutSlot};
pub use node::Node;
pub use options::{Block, In, Out, OutFullValidation, OutModifier, OutNoValidation, Pop};
pub use path::{components, is_glob, match_names, match_paths, validate, PathIter, ValidationLevel};
pub use value::AnyValue;
