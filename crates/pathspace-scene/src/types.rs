// SPDX-License-Identifier: Apache-2.0
//! Drawable bucket shape and the per-snapshot bookkeeping types around it.

use std::time::Duration;

/// One frame's worth of drawables, expressed as parallel arrays indexed by
/// drawable position. Every per-drawable array (other than `bounds_boxes`, which may
/// be empty to mean "no boxes authored") must have the same length as `drawable_ids`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawableBucket {
    /// Stable identifier for each drawable, in draw-order-independent authoring order.
    pub drawable_ids: Vec<u64>,
    /// World transform for each drawable.
    pub world_transforms: Vec<Transform>,
    /// Bounding sphere for each drawable.
    pub bounds_spheres: Vec<BoundingSphere>,
    /// Bounding box for each drawable. Empty means "not authored"; otherwise must match
    /// `drawable_ids` length exactly (all-or-nothing).
    pub bounds_boxes: Vec<BoundingBox>,
    /// Whether `bounds_boxes[i]` is meaningful (`0` = ignore, nonzero = valid).
    pub bounds_box_valid: Vec<u8>,
    /// Layer assignment for each drawable.
    pub layers: Vec<u32>,
    /// Depth-sort key for each drawable.
    pub z_values: Vec<f32>,
    /// Material identifier for each drawable.
    pub material_ids: Vec<u32>,
    /// Renderer pipeline flags for each drawable.
    pub pipeline_flags: Vec<u32>,
    /// Visibility flag for each drawable (`0` = hidden).
    pub visibility: Vec<u8>,
    /// First index into `command_kinds`/`command_payload` for each drawable's commands.
    pub command_offsets: Vec<u32>,
    /// Number of commands belonging to each drawable, starting at `command_offsets[i]`.
    pub command_counts: Vec<u32>,
    /// Flat command-kind discriminants, referenced by `command_offsets`/`command_counts`.
    pub command_kinds: Vec<u32>,
    /// Flat command payload bytes, one fixed-size record per entry in `command_kinds`.
    pub command_payload: Vec<u8>,
    /// Stroke polyline points, referenced by `StrokeCommand` ranges.
    pub stroke_points: Vec<StrokePoint>,
    /// Shaped glyph quads, referenced by `TextGlyphsCommand` ranges.
    pub glyph_vertices: Vec<GlyphVertex>,
    /// Head of each drawable's clip chain (`-1` means unclipped). Empty means "no
    /// drawable is clipped".
    pub clip_head_indices: Vec<i32>,
    /// Clip chain nodes, referenced by `clip_head_indices` and each node's `next`.
    pub clip_nodes: Vec<ClipNode>,
    /// Authoring-tool provenance for each drawable. Empty means "not tracked".
    pub authoring_map: Vec<DrawableAuthoringMapEntry>,
    /// Content fingerprint for each drawable. Empty means "not yet computed"; the
    /// builder fills this in at publish time when the length does not match.
    pub drawable_fingerprints: Vec<u64>,
    /// Font assets referenced by one or more drawables in this bucket.
    pub font_assets: Vec<FontAssetReference>,
    /// Per-layer draw index lists, used to build layer-scoped index buffers.
    pub layer_indices: Vec<LayerIndices>,
    /// Draw-order indices for opaque drawables.
    pub opaque_indices: Vec<u32>,
    /// Draw-order indices for alpha-blended drawables, drawn after `opaque_indices`.
    pub alpha_indices: Vec<u32>,
}

/// A 4x4 world transform, stored row-major as a flat 16-element array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The 16 matrix elements.
    pub elements: [f32; 16],
}

/// A bounding sphere: center plus radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere center.
    pub center: [f32; 3],
    /// Sphere radius.
    pub radius: f32,
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

/// Discriminant for a clip chain node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ClipNodeType {
    /// A simple axis-aligned rectangle clip.
    Rect = 0,
    /// A clip shape authored as a command-buffer path.
    Path = 1,
}

impl ClipNodeType {
    /// Recovers a clip node type from its wire discriminant, if known.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Rect),
            1 => Some(Self::Path),
            _ => None,
        }
    }
}

/// Rectangle bounds carried by every clip node (ignored unless `node_type` is `Rect`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipRect {
    /// Minimum X.
    pub min_x: f32,
    /// Minimum Y.
    pub min_y: f32,
    /// Maximum X.
    pub max_x: f32,
    /// Maximum Y.
    pub max_y: f32,
}

/// Command-buffer path reference carried by every clip node (meaningful only when
/// `node_type` is `Path`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipPathRef {
    /// First index into the owning bucket's `command_kinds`.
    pub command_offset: u32,
    /// Number of commands making up the clip path.
    pub command_count: u32,
}

/// A single node in a drawable's clip chain. Chains are walked via `next` until `-1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipNode {
    /// Whether this node clips by rectangle or by path.
    pub node_type: ClipNodeType,
    /// Index of the next node in the chain, or `-1` to terminate.
    pub next: i32,
    /// Rectangle bounds (meaningful when `node_type` is `Rect`).
    pub rect: ClipRect,
    /// Path reference (meaningful when `node_type` is `Path`).
    pub path: ClipPathRef,
}

/// Links a drawable back to the authoring-tool node that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawableAuthoringMapEntry {
    /// The drawable this entry describes. `0` is treated as "unset" during validation.
    pub drawable_id: u64,
    /// Index of this drawable within the authoring node that emitted it (a single
    /// authoring node may fan out to more than one drawable).
    pub drawable_index_within_node: u32,
    /// Authoring-node generation counter, bumped on structural edits.
    pub generation: u32,
    /// Slash-delimited authoring node path. Empty means "not tracked".
    pub authoring_node_id: String,
}

/// A font asset referenced by one or more drawables via matching `drawable_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct FontAssetReference {
    /// The drawable this asset is attached to.
    pub drawable_id: u64,
    /// Root path the asset's glyph atlas was resolved from. Empty means "not tracked".
    pub resource_root: String,
    /// Monotonic revision of the resolved asset.
    pub revision: u32,
    /// Content fingerprint of the resolved asset.
    pub fingerprint: u64,
}

/// A point on a stroke polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokePoint {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

/// A single shaped glyph quad plus its atlas UV rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphVertex {
    /// Quad minimum X.
    pub min_x: f32,
    /// Quad minimum Y.
    pub min_y: f32,
    /// Quad maximum X.
    pub max_x: f32,
    /// Quad maximum Y.
    pub max_y: f32,
    /// Atlas U at the quad minimum corner.
    pub u0: f32,
    /// Atlas V at the quad minimum corner.
    pub v0: f32,
    /// Atlas U at the quad maximum corner.
    pub u1: f32,
    /// Atlas V at the quad maximum corner.
    pub v1: f32,
}

/// Draw-order indices for a single layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerIndices {
    /// The layer these indices belong to.
    pub layer: u32,
    /// Drawable indices, in the order they should be drawn within this layer.
    pub indices: Vec<u32>,
}

/// Caller-supplied, human-facing metadata attached to a published snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotMetadata {
    /// Freeform author identity (user, tool, or service name).
    pub author: String,
    /// Freeform producer tool/version string.
    pub tool_version: String,
    /// Publish timestamp in milliseconds since the Unix epoch.
    pub created_at_ms: i64,
    /// Drawable count. Overwritten by the builder from the published bucket.
    pub drawable_count: u64,
    /// Command count. Overwritten by the builder from the published bucket.
    pub command_count: u64,
    /// Caller-supplied hex fingerprint digests. The builder does not compute these; it
    /// only persists and counts them.
    pub fingerprint_digests: Vec<String>,
}

/// Caller-supplied options for [`crate::SceneSnapshotBuilder::publish`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotPublishOptions {
    /// Explicit revision number to publish as. When `None`, the builder assigns
    /// `current_revision + 1` (or `1` if no revision has been published yet).
    pub revision: Option<u64>,
    /// Metadata to attach to the published revision.
    pub metadata: SnapshotMetadata,
}

/// One entry in a scene's snapshot index: a lightweight summary kept for every
/// retained revision, independent of the (potentially pruned) binary bucket data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// The revision this record describes.
    pub revision: u64,
    /// Publish timestamp in milliseconds since the Unix epoch.
    pub created_at_ms: i64,
    /// Drawable count at publish time.
    pub drawable_count: u64,
    /// Command count at publish time.
    pub command_count: u64,
    /// Number of fingerprint digests attached at publish time.
    pub fingerprint_count: u64,
}

/// Per-scene summary of the last garbage collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotGcMetrics {
    /// Total revisions evicted over the scene's lifetime.
    pub evicted: u64,
    /// Revisions currently retained.
    pub retained: u64,
    /// Sum of `fingerprint_count` across all retained revisions.
    pub total_fingerprint_count: u64,
    /// The most recently published revision at the time metrics were recorded.
    pub last_revision: u64,
}

/// Governs how many past revisions a [`crate::SceneSnapshotBuilder`] keeps on disk.
///
/// A revision is retained if *any* of the following hold: it is the current revision,
/// it is among the `min_revisions` most recent, or it is younger than `min_duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Minimum number of most-recent revisions to always retain.
    pub min_revisions: u32,
    /// Minimum age below which a revision is always retained, regardless of count.
    pub min_duration: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { min_revisions: 1, min_duration: Duration::ZERO }
    }
}

/// Compact per-revision index of what a scene's on-disk bucket covers, used by garbage
/// collection to find layer-scoped index files without decoding the full bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// Drawable count recorded at publish time.
    pub drawable_count: u64,
    /// Command count recorded at publish time.
    pub command_count: u64,
    /// Layer identifiers with a per-layer index file under this revision.
    pub layer_ids: Vec<u32>,
    /// Number of fingerprint digests recorded at publish time.
    pub fingerprint_count: u64,
}
