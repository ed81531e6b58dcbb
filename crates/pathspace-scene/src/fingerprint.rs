// SPDX-License-Identifier: Apache-2.0
//! Per-drawable content fingerprinting.
//!
//! Fingerprints are FNV-1a-64 digests mixed over every field that affects how a
//! drawable renders: transform, bounds, layer/material/visibility state, its command
//! buffer slice, its clip chain, authoring provenance, and any attached font asset. The
//! mixing order is load-bearing — two buckets that render identically must fingerprint
//! identically, and the order below is what callers (diffing tools, caches) rely on.

use crate::commands::{payload_size_bytes, DrawCommandKind, StrokeCommand, TextGlyphsCommand};
use crate::types::DrawableBucket;

// Not the textbook FNV-1a-64 basis — this is the exact constant the original
// renderer's fingerprinting pass was built around, and every persisted digest is
// only comparable against others produced with the same constant.
const FNV_OFFSET_BASIS: u64 = 0x1465_0fb0_739d_0383;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

struct Fnv1a64 {
    value: u64,
}

impl Fnv1a64 {
    const fn new() -> Self {
        Self { value: FNV_OFFSET_BASIS }
    }

    fn mix_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.value ^= u64::from(*byte);
            self.value = self.value.wrapping_mul(FNV_PRIME);
        }
    }

    fn mix_u8(&mut self, v: u8) {
        self.mix_bytes(&v.to_le_bytes());
    }

    fn mix_i32(&mut self, v: i32) {
        self.mix_bytes(&v.to_le_bytes());
    }

    fn mix_u32(&mut self, v: u32) {
        self.mix_bytes(&v.to_le_bytes());
    }

    fn mix_u64(&mut self, v: u64) {
        self.mix_bytes(&v.to_le_bytes());
    }

    fn mix_f32(&mut self, v: f32) {
        self.mix_bytes(&v.to_le_bytes());
    }

    fn mix_string(&mut self, s: &str) {
        self.mix_bytes(s.as_bytes());
        self.value ^= s.len() as u64;
        self.value = self.value.wrapping_mul(FNV_PRIME);
    }
}

struct CommandPayloadLayout {
    offsets: Vec<usize>,
    truncated: bool,
}

fn compute_command_payload_layout(kinds: &[u32], payload: &[u8]) -> CommandPayloadLayout {
    let mut offsets = Vec::with_capacity(kinds.len());
    let mut cursor = 0usize;
    let mut truncated = false;
    for &kind_value in kinds {
        offsets.push(cursor);
        let payload_size = payload_size_bytes(kind_value);
        if cursor + payload_size > payload.len() {
            truncated = true;
            cursor = payload.len();
        } else {
            cursor += payload_size;
        }
    }
    if cursor != payload.len() {
        truncated = true;
    }
    CommandPayloadLayout { offsets, truncated }
}

fn clamp_payload_span(payload: &[u8], offset: usize, size: usize) -> &[u8] {
    if offset >= payload.len() {
        return &[];
    }
    let available = size.min(payload.len() - offset);
    &payload[offset..offset + available]
}

fn mix_clip_chain(hash: &mut Fnv1a64, bucket: &DrawableBucket, head_index: i32) {
    let node_count = bucket.clip_nodes.len();
    let mut index = head_index;
    let mut safety = 0usize;
    while index >= 0 && (index as usize) < node_count && safety < node_count {
        let node = &bucket.clip_nodes[index as usize];
        hash.mix_u32(node.node_type as u32);
        hash.mix_i32(node.next);
        hash.mix_f32(node.rect.min_x);
        hash.mix_f32(node.rect.min_y);
        hash.mix_f32(node.rect.max_x);
        hash.mix_f32(node.rect.max_y);
        hash.mix_u32(node.path.command_offset);
        hash.mix_u32(node.path.command_count);
        index = node.next;
        safety += 1;
    }
    if safety >= node_count && node_count > 0 {
        hash.mix_u32(0xFFFF_FFFF);
    }
}

/// Computes a content fingerprint for every drawable in `bucket`, in `drawable_ids`
/// order. The returned vector always has `bucket.drawable_ids.len()` entries.
#[must_use]
pub fn compute_drawable_fingerprints(bucket: &DrawableBucket) -> Vec<u64> {
    let drawable_count = bucket.drawable_ids.len();
    let mut layout =
        compute_command_payload_layout(&bucket.command_kinds, &bucket.command_payload);
    let mut fingerprints = vec![0u64; drawable_count];

    for i in 0..drawable_count {
        let mut hash = Fnv1a64::new();

        if let Some(transform) = bucket.world_transforms.get(i) {
            for value in transform.elements {
                hash.mix_f32(value);
            }
        }
        if let Some(sphere) = bucket.bounds_spheres.get(i) {
            for value in sphere.center {
                hash.mix_f32(value);
            }
            hash.mix_f32(sphere.radius);
        }
        if bucket.bounds_boxes.len() == drawable_count {
            let bbox = &bucket.bounds_boxes[i];
            for value in bbox.min {
                hash.mix_f32(value);
            }
            for value in bbox.max {
                hash.mix_f32(value);
            }
        }
        if let Some(&valid) = bucket.bounds_box_valid.get(i) {
            hash.mix_u8(valid);
        }
        if let Some(&layer) = bucket.layers.get(i) {
            hash.mix_u32(layer);
        }
        if let Some(&z) = bucket.z_values.get(i) {
            hash.mix_f32(z);
        }
        if let Some(&material_id) = bucket.material_ids.get(i) {
            hash.mix_u32(material_id);
        }
        if let Some(&flags) = bucket.pipeline_flags.get(i) {
            hash.mix_u32(flags);
        }
        if let Some(&visible) = bucket.visibility.get(i) {
            hash.mix_u8(visible);
        }

        if let (Some(&offset), Some(&count)) =
            (bucket.command_offsets.get(i), bucket.command_counts.get(i))
        {
            for c in 0..count {
                let command_index = offset as usize + c as usize;
                let Some(&kind_value) = bucket.command_kinds.get(command_index) else {
                    hash.mix_u32(0xFFFF_FFFF);
                    break;
                };
                hash.mix_u32(kind_value);
                let payload_size = payload_size_bytes(kind_value);
                let payload_offset = if let Some(&offset) = layout.offsets.get(command_index) {
                    offset
                } else {
                    layout.truncated = true;
                    bucket.command_payload.len()
                };
                let span = clamp_payload_span(&bucket.command_payload, payload_offset, payload_size);
                if !span.is_empty() {
                    hash.mix_bytes(span);
                    let kind = DrawCommandKind::from_u32(kind_value);
                    if kind == Some(DrawCommandKind::Stroke) {
                        if let Some(stroke) = StrokeCommand::from_bytes(span) {
                            hash.mix_f32(stroke.thickness);
                            let stroke_offset = stroke.point_offset as usize;
                            let stroke_count = stroke.point_count as usize;
                            if let Some(end) = stroke_offset.checked_add(stroke_count) {
                                if end <= bucket.stroke_points.len() {
                                    for point in &bucket.stroke_points[stroke_offset..end] {
                                        hash.mix_f32(point.x);
                                        hash.mix_f32(point.y);
                                    }
                                } else {
                                    hash.mix_u32(0xDEAD_BEEF);
                                }
                            } else {
                                hash.mix_u32(0xDEAD_BEEF);
                            }
                        }
                    }
                    if kind == Some(DrawCommandKind::TextGlyphs) {
                        if let Some(glyphs) = TextGlyphsCommand::from_bytes(span) {
                            hash.mix_u64(glyphs.atlas_fingerprint);
                            hash.mix_u32(glyphs.flags);
                            let glyph_offset = glyphs.glyph_offset as usize;
                            let glyph_count = glyphs.glyph_count as usize;
                            if let Some(end) = glyph_offset.checked_add(glyph_count) {
                                if end <= bucket.glyph_vertices.len() {
                                    for glyph in &bucket.glyph_vertices[glyph_offset..end] {
                                        hash.mix_f32(glyph.min_x);
                                        hash.mix_f32(glyph.min_y);
                                        hash.mix_f32(glyph.max_x);
                                        hash.mix_f32(glyph.max_y);
                                        hash.mix_f32(glyph.u0);
                                        hash.mix_f32(glyph.v0);
                                        hash.mix_f32(glyph.u1);
                                        hash.mix_f32(glyph.v1);
                                    }
                                } else {
                                    hash.mix_u32(0x0BAD_CAFE);
                                }
                            } else {
                                hash.mix_u32(0x0BAD_CAFE);
                            }
                        }
                    }
                }
                if span.len() < payload_size {
                    hash.mix_u32((payload_size - span.len()) as u32);
                }
            }
        }

        if !bucket.clip_head_indices.is_empty() {
            if let Some(&head) = bucket.clip_head_indices.get(i) {
                hash.mix_i32(head);
                mix_clip_chain(&mut hash, bucket, head);
            }
        }

        if !bucket.authoring_map.is_empty() {
            if let Some(entry) = bucket.authoring_map.get(i) {
                hash.mix_u32(entry.drawable_index_within_node);
                hash.mix_u32(entry.generation);
                if !entry.authoring_node_id.is_empty() {
                    hash.mix_string(&entry.authoring_node_id);
                }
            }
        }

        if !bucket.font_assets.is_empty() {
            if let Some(&drawable_id) = bucket.drawable_ids.get(i) {
                for asset in &bucket.font_assets {
                    if asset.drawable_id == drawable_id {
                        if !asset.resource_root.is_empty() {
                            hash.mix_string(&asset.resource_root);
                        }
                        hash.mix_u32(asset.revision);
                        hash.mix_u64(asset.fingerprint);
                    }
                }
            }
        }

        if layout.truncated {
            hash.mix_u32(0xAAAA_5555);
        }

        fingerprints[i] = hash.value;
    }

    fingerprints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingSphere, Transform};

    fn simple_bucket() -> DrawableBucket {
        DrawableBucket {
            drawable_ids: vec![1, 2],
            world_transforms: vec![
                Transform { elements: [0.0; 16] },
                Transform { elements: [1.0; 16] },
            ],
            bounds_spheres: vec![
                BoundingSphere { center: [0.0; 3], radius: 1.0 },
                BoundingSphere { center: [1.0; 3], radius: 2.0 },
            ],
            bounds_box_valid: vec![0, 0],
            layers: vec![0, 0],
            z_values: vec![0.0, 0.0],
            material_ids: vec![0, 0],
            pipeline_flags: vec![0, 0],
            visibility: vec![1, 1],
            command_offsets: vec![0, 0],
            command_counts: vec![0, 0],
            ..Default::default()
        }
    }

    #[test]
    fn distinct_drawables_fingerprint_differently() {
        let bucket = simple_bucket();
        let fingerprints = compute_drawable_fingerprints(&bucket);
        assert_eq!(fingerprints.len(), 2);
        assert_ne!(fingerprints[0], fingerprints[1]);
    }

    #[test]
    fn identical_buckets_fingerprint_identically() {
        let a = simple_bucket();
        let b = simple_bucket();
        assert_eq!(compute_drawable_fingerprints(&a), compute_drawable_fingerprints(&b));
    }

    #[test]
    fn changing_z_value_changes_fingerprint() {
        let mut changed = simple_bucket();
        changed.z_values[0] = 42.0;
        let base = compute_drawable_fingerprints(&simple_bucket());
        let altered = compute_drawable_fingerprints(&changed);
        assert_ne!(base[0], altered[0]);
        assert_eq!(base[1], altered[1]);
    }

    #[test]
    fn empty_bucket_yields_no_fingerprints() {
        assert!(compute_drawable_fingerprints(&DrawableBucket::default()).is_empty());
    }

    #[test]
    fn out_of_range_stroke_mixes_sentinel_instead_of_panicking() {
        let mut bucket = simple_bucket();
        bucket.command_kinds = vec![DrawCommandKind::Stroke as u32];
        let stroke = StrokeCommand { thickness: 1.0, point_offset: 0, point_count: 5 };
        bucket.command_payload = stroke.to_bytes().to_vec();
        bucket.command_counts = vec![1, 0];
        let fingerprints = compute_drawable_fingerprints(&bucket);
        assert_eq!(fingerprints.len(), 2);
    }
}
