// SPDX-License-Identifier: Apache-2.0
//! Scene snapshot builder (C7): revisioned drawable buckets published into a
//! [`pathspace::PathSpace`], with deterministic per-drawable content fingerprinting and
//! retention-policy-driven garbage collection.
//!
//! Published revisions are split into two storage tiers. Twelve binary sub-arrays
//! (`bucket/*.bin`) round-trip through a small CBOR envelope (see [`codec`]) because
//! they are meant to be read back by tooling outside this process. Everything else —
//! the revision index, GC metrics, `current_revision`, per-revision metadata, and
//! `meta.json` — is a native Rust value stored directly, since in-process callers never
//! need it serialized.

#![forbid(unsafe_code)]

pub mod builder;
pub mod codec;
pub mod commands;
pub mod fingerprint;
pub mod types;
pub mod validate;

pub use builder::{format_revision, make_revision_base, SceneSnapshotBuilder};
pub use commands::{
    payload_size_bytes, CircleCommand, DrawCommandKind, LineCommand, RectCommand, StrokeCommand,
    TextGlyphsCommand,
};
pub use fingerprint::compute_drawable_fingerprints;
pub use types::{
    BoundingBox, BoundingSphere, ClipNode, ClipNodeType, ClipPathRef, ClipRect, DrawableAuthoringMapEntry,
    DrawableBucket, FontAssetReference, GlyphVertex, LayerIndices, RetentionPolicy, SnapshotGcMetrics,
    SnapshotMetadata, SnapshotPublishOptions, SnapshotRecord, SnapshotSummary, StrokePoint, Transform,
};
pub use validate::ensure_valid_bucket;
