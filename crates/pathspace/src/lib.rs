// SPDX-License-Identifier: Apache-2.0
//! The PathSpace store: layer dispatch (C4) over the path/node/notification
//! primitives from `pathspace-core`, and the public `PathSpace` API (C5).

#![forbid(unsafe_code)]

pub mod mount;
pub mod space;

pub use mount::{MountTable, Resolution};
pub use space::PathSpace;

pub use pathspace_core::{
    Block, Context, Error, In, InsertReturn, Layer, LayerValue, Out, OutFullValidation,
    OutNoValidation, OutSlot, Pop, Result, ValidationLevel,
};
